//! In-memory control plane for engine tests.

use async_trait::async_trait;
use fleet_core::{ConfiguredServerRef, ControlError, ControlPlane, ManagedServer, ServerCommand, ServerStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

pub fn process(id: &str, status: ServerStatus) -> ManagedServer {
    let running = status == ServerStatus::Running;
    ManagedServer {
        id: id.to_string(),
        name: format!("server-{id}"),
        status,
        cpu: if running { "3%" } else { "0%" }.to_string(),
        memory: if running { "45MB" } else { "0MB" }.to_string(),
        uptime: if running { "2h 4m" } else { "0h" }.to_string(),
        port: 8001,
        version: "1.2.0".to_string(),
        ..Default::default()
    }
}

pub fn configured(container_id: &str) -> ConfiguredServerRef {
    ConfiguredServerRef {
        id: format!("cfg-{container_id}"),
        container_id: container_id.to_string(),
        ..Default::default()
    }
}

pub struct FakePlane {
    processes: Mutex<Vec<ManagedServer>>,
    configured: Mutex<Vec<ConfiguredServerRef>>,
    list_calls: AtomicUsize,
    list_error: Mutex<Option<String>>,
    command_error: Mutex<Option<String>>,
    commands: Mutex<Vec<(ServerCommand, String)>>,
    logs: Mutex<String>,
    held: AtomicBool,
    gate: Semaphore,
}

impl Default for FakePlane {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl FakePlane {
    pub fn new(processes: Vec<ManagedServer>, configured: Vec<ConfiguredServerRef>) -> Self {
        Self {
            processes: Mutex::new(processes),
            configured: Mutex::new(configured),
            list_calls: AtomicUsize::new(0),
            list_error: Mutex::new(None),
            command_error: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            logs: Mutex::new(String::new()),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_processes(&self, processes: Vec<ManagedServer>) {
        *self.processes.lock().unwrap() = processes;
    }

    pub fn fail_lists(&self, message: &str) {
        *self.list_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_commands(&self, message: &str) {
        *self.command_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_logs(&self, logs: &str) {
        *self.logs.lock().unwrap() = logs.to_string();
    }

    /// Makes `list_processes` block until `release_lists`.
    pub fn hold_lists(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_lists(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    pub fn commands(&self) -> Vec<(ServerCommand, String)> {
        self.commands.lock().unwrap().clone()
    }

    fn list_failure(&self) -> Option<ControlError> {
        self.list_error
            .lock()
            .unwrap()
            .clone()
            .map(ControlError::Unavailable)
    }

    fn record(&self, command: ServerCommand, id: &str) -> Result<(), ControlError> {
        self.commands
            .lock()
            .unwrap()
            .push((command, id.to_string()));
        match self.command_error.lock().unwrap().clone() {
            Some(message) => Err(ControlError::Command {
                command: command.as_str().to_string(),
                message,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ControlPlane for FakePlane {
    async fn list_processes(&self) -> Result<Vec<ManagedServer>, ControlError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.held.load(Ordering::SeqCst) {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|err| ControlError::Unavailable(err.to_string()))?;
        }
        if let Some(err) = self.list_failure() {
            return Err(err);
        }
        Ok(self.processes.lock().unwrap().clone())
    }

    async fn list_configured_servers(&self) -> Result<Vec<ConfiguredServerRef>, ControlError> {
        if let Some(err) = self.list_failure() {
            return Err(err);
        }
        Ok(self.configured.lock().unwrap().clone())
    }

    async fn start_process(&self, id: &str) -> Result<(), ControlError> {
        self.record(ServerCommand::Start, id)
    }

    async fn stop_process(&self, id: &str) -> Result<(), ControlError> {
        self.record(ServerCommand::Stop, id)
    }

    async fn restart_process(&self, id: &str) -> Result<(), ControlError> {
        self.record(ServerCommand::Restart, id)
    }

    async fn get_logs(&self, _id: &str, max_lines: usize) -> Result<String, ControlError> {
        let logs = self.logs.lock().unwrap().clone();
        let lines: Vec<&str> = logs.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        Ok(lines[start..].join("\n"))
    }
}
