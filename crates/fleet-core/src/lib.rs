use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod config_file;
pub mod control;

pub use config_file::{configured_container_ids, parse_configured_servers};
pub use control::{ControlError, ControlPlane};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ManagedServer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub version: String,
}

impl ManagedServer {
    /// Name shown to the operator: the configured display name when set.
    pub fn shown_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Copies the fields a background poll is allowed to refresh. The id is
    /// left alone so the cache keeps the identifier it was loaded with.
    pub fn absorb_observed(&mut self, fresh: &ManagedServer) {
        self.name = fresh.name.clone();
        self.display_name = fresh.display_name.clone();
        self.status = fresh.status;
        self.cpu = fresh.cpu.clone();
        self.memory = fresh.memory.clone();
        self.uptime = fresh.uptime.clone();
        self.port = fresh.port;
        self.version = fresh.version.clone();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConfiguredServerRef {
    pub id: String,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Created,
    Running,
    Stopped,
    Exited,
    Dead,
    Restarting,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    pub const ALL: [ServerStatus; 8] = [
        ServerStatus::Created,
        ServerStatus::Running,
        ServerStatus::Stopped,
        ServerStatus::Exited,
        ServerStatus::Dead,
        ServerStatus::Restarting,
        ServerStatus::Error,
        ServerStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Created => "created",
            ServerStatus::Running => "running",
            ServerStatus::Stopped => "stopped",
            ServerStatus::Exited => "exited",
            ServerStatus::Dead => "dead",
            ServerStatus::Restarting => "restarting",
            ServerStatus::Error => "error",
            ServerStatus::Unknown => "unknown",
        }
    }

    /// Lenient parse used for backend output; never fails.
    pub fn from_wire(input: &str) -> Self {
        input.parse().unwrap_or(ServerStatus::Unknown)
    }

    pub fn is_halted(&self) -> bool {
        matches!(
            self,
            ServerStatus::Stopped | ServerStatus::Exited | ServerStatus::Dead | ServerStatus::Created
        )
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "created" => Ok(ServerStatus::Created),
            "running" => Ok(ServerStatus::Running),
            "stopped" => Ok(ServerStatus::Stopped),
            "exited" => Ok(ServerStatus::Exited),
            "dead" => Ok(ServerStatus::Dead),
            "restarting" => Ok(ServerStatus::Restarting),
            "error" => Ok(ServerStatus::Error),
            "unknown" => Ok(ServerStatus::Unknown),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerCommand {
    Start,
    Stop,
    Restart,
}

impl ServerCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerCommand::Start => "start",
            ServerCommand::Stop => "stop",
            ServerCommand::Restart => "restart",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServerCommand::Start => "Start",
            ServerCommand::Stop => "Stop",
            ServerCommand::Restart => "Restart",
        }
    }

    pub fn progress_label(self) -> &'static str {
        match self {
            ServerCommand::Start => "Starting...",
            ServerCommand::Stop => "Stopping...",
            ServerCommand::Restart => "Restarting...",
        }
    }

    pub fn success_title(self) -> &'static str {
        match self {
            ServerCommand::Start => "Server Started",
            ServerCommand::Stop => "Server Stopped",
            ServerCommand::Restart => "Server Restarted",
        }
    }

    pub fn failure_title(self) -> String {
        format!("{} Server Failed", self.label())
    }

    pub fn failure_message(self, name: &str, detail: &str) -> String {
        format!("Failed to {} server {name}: {detail}", self.as_str())
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two identifiers name the same entity when either is a prefix of the other.
/// Short (12 char) and full container ids meet here.
pub fn ids_match(a: &str, b: &str) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}

pub fn find_matching<'a>(
    servers: &'a [ManagedServer],
    id: &str,
) -> Option<&'a ManagedServer> {
    servers.iter().find(|server| ids_match(&server.id, id))
}
