use crate::{ConfiguredServerRef, ManagedServer, ServerCommand};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control plane unavailable: {0}")]
    Unavailable(String),
    #[error("{message}")]
    Command { command: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Parse(err.to_string())
    }
}

/// Remote side that owns the managed processes. The console only consumes it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_processes(&self) -> Result<Vec<ManagedServer>, ControlError>;

    async fn list_configured_servers(&self) -> Result<Vec<ConfiguredServerRef>, ControlError>;

    async fn start_process(&self, id: &str) -> Result<(), ControlError>;

    async fn stop_process(&self, id: &str) -> Result<(), ControlError>;

    async fn restart_process(&self, id: &str) -> Result<(), ControlError>;

    async fn get_logs(&self, id: &str, max_lines: usize) -> Result<String, ControlError>;

    async fn run_command(&self, command: ServerCommand, id: &str) -> Result<(), ControlError> {
        match command {
            ServerCommand::Start => self.start_process(id).await,
            ServerCommand::Stop => self.stop_process(id).await,
            ServerCommand::Restart => self.restart_process(id).await,
        }
    }
}
