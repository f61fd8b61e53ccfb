//! Control plane backed by the `docker` CLI and the configured-servers file.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use fleet_core::{
    ids_match, parse_configured_servers, ConfiguredServerRef, ControlError, ControlPlane,
    ManagedServer, ServerStatus,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_MANAGED_LABEL: &str = "neobelt.managed-by=true";
const SHORT_ID_LEN: usize = 12;
const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Clone)]
pub struct DockerControlPlane {
    docker_bin: String,
    managed_label: String,
    config_path: PathBuf,
}

impl DockerControlPlane {
    pub fn new(docker_bin: String, managed_label: String, config_path: PathBuf) -> Self {
        Self {
            docker_bin,
            managed_label,
            config_path,
        }
    }

    /// Runs `docker <args>` and returns its captured output, failing when
    /// the binary is missing or exits non-zero.
    async fn run(&self, args: &[&str]) -> Result<Output, ControlError> {
        let output = Command::new(&self.docker_bin)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => {
                    ControlError::Unavailable(format!("{} not found on PATH", self.docker_bin))
                }
                _ => ControlError::Io(err),
            })?;
        if !output.status.success() {
            let command = args.first().copied().unwrap_or("docker");
            return Err(ControlError::Command {
                command: command.to_string(),
                message: command_failure(command, &output),
            });
        }
        Ok(output)
    }

    async fn docker(&self, args: &[&str]) -> Result<String, ControlError> {
        let output = self.run(args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn managed_ids(&self) -> Result<Vec<String>, ControlError> {
        let filter = format!("label={}", self.managed_label);
        let listed = self
            .docker(&["ps", "-a", "--no-trunc", "--filter", filter.as_str(), "--format", "{{.ID}}"])
            .await?;
        Ok(listed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn inspect(&self, ids: &[String]) -> Result<Vec<InspectRecord>, ControlError> {
        let mut args = vec!["inspect"];
        args.extend(ids.iter().map(String::as_str));
        let raw = self.docker(&args).await?;
        parse_inspect(&raw)
    }

    async fn stats(&self, ids: &[&str]) -> Vec<StatsRecord> {
        if ids.is_empty() {
            return Vec::new();
        }
        let mut args = vec!["stats", "--no-stream", "--format", "{{json .}}"];
        args.extend(ids.iter().copied());
        match self.docker(&args).await {
            Ok(raw) => parse_stats(&raw),
            Err(err) => {
                // Missing stats only cost the cpu/memory columns.
                warn!(event = "docker_stats_failed", error = %err);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ControlPlane for DockerControlPlane {
    async fn list_processes(&self) -> Result<Vec<ManagedServer>, ControlError> {
        let ids = self.managed_ids().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (records, configured) = tokio::try_join!(self.inspect(&ids), self.list_configured_servers())?;
        let running: Vec<&str> = records
            .iter()
            .filter(|record| record.state.running)
            .map(|record| record.id.as_str())
            .collect();
        let stats = self.stats(&running).await;
        let now = Utc::now();
        let servers: Vec<ManagedServer> = records
            .iter()
            .map(|record| {
                let stat = stats.iter().find(|stat| ids_match(&stat.id, &record.id));
                let mut server = server_from_inspect(record, stat, now);
                enrich(&mut server, &configured);
                server
            })
            .collect();
        debug!(event = "docker_processes_listed", count = servers.len());
        Ok(servers)
    }

    async fn list_configured_servers(&self) -> Result<Vec<ConfiguredServerRef>, ControlError> {
        match tokio::fs::read_to_string(&self.config_path).await {
            Ok(raw) => parse_configured_servers(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(ControlError::Config(format!(
                "{}: {err}",
                self.config_path.display()
            ))),
        }
    }

    async fn start_process(&self, id: &str) -> Result<(), ControlError> {
        self.docker(&["start", id]).await.map(|_| ())
    }

    async fn stop_process(&self, id: &str) -> Result<(), ControlError> {
        self.docker(&["stop", id]).await.map(|_| ())
    }

    async fn restart_process(&self, id: &str) -> Result<(), ControlError> {
        self.docker(&["restart", id]).await.map(|_| ())
    }

    async fn get_logs(&self, id: &str, max_lines: usize) -> Result<String, ControlError> {
        let tail = max_lines.to_string();
        let output = self
            .run(&["logs", "--tail", tail.as_str(), "--timestamps", id])
            .await?;
        Ok(merge_log_streams(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

fn command_failure(command: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stderr.is_empty() {
        stderr
    } else if !stdout.is_empty() {
        stdout
    } else {
        format!("docker {command} exited with status {}", output.status)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    id: String,
    #[serde(default)]
    name: String,
    state: InspectState,
    #[serde(default)]
    network_settings: NetworkSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    running: bool,
    #[serde(default)]
    started_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    ports: Option<BTreeMap<String, Option<Vec<PortBinding>>>>,
}

#[derive(Debug, Deserialize)]
struct PortBinding {
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

#[derive(Debug, Deserialize)]
struct StatsRecord {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "CPUPerc", default)]
    cpu_perc: String,
    #[serde(rename = "MemUsage", default)]
    mem_usage: String,
}

fn parse_inspect(raw: &str) -> Result<Vec<InspectRecord>, ControlError> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_stats(raw: &str) -> Vec<StatsRecord> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(event = "docker_stats_line_skipped", error = %err);
                None
            }
        })
        .collect()
}

fn server_from_inspect(
    record: &InspectRecord,
    stat: Option<&StatsRecord>,
    now: DateTime<Utc>,
) -> ManagedServer {
    let uptime = if record.state.running {
        DateTime::parse_from_rfc3339(&record.state.started_at)
            .map(|started| format_uptime(now.signed_duration_since(started).num_minutes()))
            .unwrap_or_else(|_| format_uptime(0))
    } else {
        "0h".to_string()
    };
    let (cpu, memory) = match stat {
        Some(stat) if record.state.running => (
            format_cpu(&stat.cpu_perc).unwrap_or_else(|| "0%".to_string()),
            format_memory(&stat.mem_usage).unwrap_or_else(|| "0MB".to_string()),
        ),
        _ => ("0%".to_string(), "0MB".to_string()),
    };
    ManagedServer {
        id: record.id.chars().take(SHORT_ID_LEN).collect(),
        name: record.name.trim_start_matches('/').to_string(),
        display_name: String::new(),
        status: ServerStatus::from_wire(&record.state.status),
        cpu,
        memory,
        uptime,
        port: host_port(&record.network_settings),
        version: String::new(),
    }
}

/// Copies the configured name and version onto a listed process.
fn enrich(server: &mut ManagedServer, configured: &[ConfiguredServerRef]) {
    let matched = configured
        .iter()
        .filter(|entry| !entry.container_id.trim().is_empty())
        .find(|entry| ids_match(entry.container_id.trim(), &server.id));
    match matched {
        Some(entry) => {
            server.display_name = entry.name.clone();
            server.version = if entry.version.trim().is_empty() {
                UNKNOWN_VERSION.to_string()
            } else {
                entry.version.clone()
            };
        }
        None => server.version = UNKNOWN_VERSION.to_string(),
    }
}

/// First bound TCP host port, `0` when nothing is published.
fn host_port(network: &NetworkSettings) -> u16 {
    let Some(ports) = network.ports.as_ref() else {
        return 0;
    };
    ports
        .iter()
        .filter(|(container_port, _)| container_port.contains("tcp"))
        .filter_map(|(_, bindings)| bindings.as_ref()?.first())
        .find_map(|binding| binding.host_port.parse::<u16>().ok())
        .unwrap_or(0)
}

pub fn format_uptime(total_minutes: i64) -> String {
    let total_minutes = total_minutes.max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn format_cpu(raw: &str) -> Option<String> {
    let value: f64 = raw.trim().trim_end_matches('%').trim().parse().ok()?;
    Some(format!("{value:.1}%"))
}

/// `45.3MiB / 1.9GiB` -> `45MB` (usage side only, in MiB).
fn format_memory(raw: &str) -> Option<String> {
    let usage = raw.split('/').next()?.trim();
    let split = usage
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(usage.len());
    let (number, unit) = usage.split_at(split);
    let value: f64 = number.parse().ok()?;
    let bytes = match unit.trim() {
        "" | "B" => value,
        "KiB" => value * 1024.0,
        "kB" | "KB" => value * 1000.0,
        "MiB" => value * 1024.0 * 1024.0,
        "MB" => value * 1000.0 * 1000.0,
        "GiB" => value * 1024.0 * 1024.0 * 1024.0,
        "GB" => value * 1000.0 * 1000.0 * 1000.0,
        "TiB" => value * 1024f64.powi(4),
        "TB" => value * 1000f64.powi(4),
        _ => return None,
    };
    Some(format!("{:.0}MB", bytes / (1024.0 * 1024.0)))
}

/// Interleaves stdout and stderr by their `--timestamps` prefix.
fn merge_log_streams(stdout: &str, stderr: &str) -> String {
    let mut lines: Vec<(Option<DateTime<FixedOffset>>, String)> = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|line| !line.trim().is_empty())
        .map(parse_log_line)
        .collect();
    lines.sort_by_key(|(at, _)| *at);
    lines
        .into_iter()
        .map(|(at, content)| match at {
            Some(at) => format!("[{}] {content}", at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => content,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_log_line(line: &str) -> (Option<DateTime<FixedOffset>>, String) {
    if let Some((stamp, content)) = line.split_once(' ') {
        if let Ok(at) = DateTime::parse_from_rfc3339(stamp) {
            return (Some(at), content.to_string());
        }
    }
    (None, line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INSPECT: &str = r#"[
      {
        "Id": "4f1c2b9a7d3e5f60718293a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4",
        "Name": "/neobelt-files",
        "State": {"Status": "running", "Running": true, "StartedAt": "2026-10-18T08:00:00.123456789Z"},
        "Config": {"Image": "ghcr.io/acme/files:1.2.0", "Labels": {"neobelt.managed-by": "true"}},
        "NetworkSettings": {"Ports": {
          "9000/udp": [{"HostIp": "127.0.0.1", "HostPort": "9100"}],
          "8080/tcp": [{"HostIp": "127.0.0.1", "HostPort": "8001"}]
        }}
      },
      {
        "Id": "99aa88bb77cc66dd55ee44ff33aa22bb11cc00dd99ee88ff77aa66bb55cc44dd",
        "Name": "/neobelt-search",
        "State": {"Status": "exited", "Running": false, "StartedAt": "0001-01-01T00:00:00Z"},
        "NetworkSettings": {"Ports": {"8080/tcp": null}}
      }
    ]"#;

    #[test]
    fn inspect_output_maps_to_servers() {
        let records = parse_inspect(INSPECT).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 10, 30, 0).unwrap();
        let stats = parse_stats(
            r#"{"ID":"4f1c2b9a7d3e","Name":"neobelt-files","CPUPerc":"3.27%","MemUsage":"45.3MiB / 1.944GiB"}"#,
        );

        let running = server_from_inspect(&records[0], stats.first(), now);
        assert_eq!(running.id, "4f1c2b9a7d3e");
        assert_eq!(running.name, "neobelt-files");
        assert_eq!(running.status, ServerStatus::Running);
        assert_eq!(running.uptime, "1d 2h 29m");
        assert_eq!(running.cpu, "3.3%");
        assert_eq!(running.memory, "45MB");
        assert_eq!(running.port, 8001);

        let stopped = server_from_inspect(&records[1], None, now);
        assert_eq!(stopped.status, ServerStatus::Exited);
        assert_eq!(stopped.uptime, "0h");
        assert_eq!(stopped.cpu, "0%");
        assert_eq!(stopped.memory, "0MB");
        assert_eq!(stopped.port, 0);
    }

    #[test]
    fn uptime_formats_by_magnitude() {
        assert_eq!(format_uptime(0), "0m");
        assert_eq!(format_uptime(59), "59m");
        assert_eq!(format_uptime(125), "2h 5m");
        assert_eq!(format_uptime(3 * 24 * 60 + 61), "3d 1h 1m");
        assert_eq!(format_uptime(-5), "0m");
    }

    #[test]
    fn memory_usage_converts_units() {
        assert_eq!(format_memory("256KiB / 2GiB").as_deref(), Some("0MB"));
        assert_eq!(format_memory("1.5GiB / 2GiB").as_deref(), Some("1536MB"));
        assert_eq!(format_memory("garbage"), None);
        assert_eq!(format_cpu("0.00%").as_deref(), Some("0.0%"));
        assert_eq!(format_cpu("--"), None);
    }

    #[test]
    fn enrichment_uses_configured_name_and_version() {
        let configured = vec![ConfiguredServerRef {
            id: "cfg-1".to_string(),
            container_id: "4f1c2b9a7d3e5f60".to_string(),
            name: "Files".to_string(),
            version: "1.2.0".to_string(),
        }];
        let mut server = ManagedServer {
            id: "4f1c2b9a7d3e".to_string(),
            name: "neobelt-files".to_string(),
            ..Default::default()
        };
        enrich(&mut server, &configured);
        assert_eq!(server.shown_name(), "Files");
        assert_eq!(server.version, "1.2.0");

        let mut stray = ManagedServer {
            id: "000000000000".to_string(),
            ..Default::default()
        };
        enrich(&mut stray, &configured);
        assert_eq!(stray.version, "unknown");
        assert!(stray.display_name.is_empty());
    }

    #[test]
    fn log_streams_interleave_by_timestamp() {
        let stdout = "2026-10-19T10:00:02.000000000Z ready\n2026-10-19T10:00:00.000000000Z booting\n";
        let stderr = "2026-10-19T10:00:01.500000000Z warn: slow disk\n";
        assert_eq!(
            merge_log_streams(stdout, stderr),
            "[2026-10-19T10:00:00Z] booting\n[2026-10-19T10:00:01Z] warn: slow disk\n[2026-10-19T10:00:02Z] ready"
        );
    }

    #[tokio::test]
    async fn configured_servers_come_from_the_config_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"configured_servers":[{{"id":"cfg-1","name":"Files","version":"1.2.0","container_id":"4f1c2b9a7d3e"}}]}}"#
        )
        .unwrap();
        let plane = DockerControlPlane::new(
            "docker".to_string(),
            DEFAULT_MANAGED_LABEL.to_string(),
            file.path().to_path_buf(),
        );
        let configured = plane.list_configured_servers().await.unwrap();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].container_id, "4f1c2b9a7d3e");

        let missing = DockerControlPlane::new(
            "docker".to_string(),
            DEFAULT_MANAGED_LABEL.to_string(),
            file.path().with_extension("missing"),
        );
        assert!(missing.list_configured_servers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_docker_binary_is_unavailable() {
        let plane = DockerControlPlane::new(
            "fleet-console-no-such-docker".to_string(),
            DEFAULT_MANAGED_LABEL.to_string(),
            PathBuf::from("/nonexistent/config.json"),
        );
        let err = plane.start_process("abc123").await.unwrap_err();
        assert!(matches!(err, ControlError::Unavailable(_)));
        let err = plane.get_logs("abc123", 50).await.unwrap_err();
        assert!(matches!(err, ControlError::Unavailable(_)));
    }

    #[test]
    fn failure_prefers_stderr() {
        use std::os::unix::process::ExitStatusExt;
        let output = Output {
            status: std::process::ExitStatus::from_raw(256),
            stdout: b"ignored".to_vec(),
            stderr: b"  Error response from daemon: permission denied\n".to_vec(),
        };
        assert_eq!(
            command_failure("stop", &output),
            "Error response from daemon: permission denied"
        );
    }
}
