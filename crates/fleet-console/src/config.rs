use crate::docker::DEFAULT_MANAGED_LABEL;
use crate::page::PageSettings;
use crate::poll::DEFAULT_POLL_INTERVAL;
use crate::scope::DEFAULT_REQUEST_TIMEOUT;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const MIN_POLL_INTERVAL_MS: u64 = 250;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const DEFAULT_LOG_LINES: usize = 50;

#[derive(Parser, Debug)]
#[command(name = "fleet-console", about = "Live console for managed server containers")]
pub struct Args {
    /// Refresh period for the server list.
    #[arg(long, env = "FLEET_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,
    /// Deadline applied to every control-plane call.
    #[arg(long, env = "FLEET_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub request_timeout_secs: u64,
    /// Configured-servers file; defaults to `<config dir>/neobelt/config.json`.
    #[arg(long, env = "FLEET_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(long, env = "FLEET_DOCKER_BIN", default_value = "docker")]
    pub docker_bin: String,
    #[arg(long, default_value = DEFAULT_MANAGED_LABEL)]
    pub managed_label: String,
    /// Lines fetched by the debug action.
    #[arg(long, default_value_t = DEFAULT_LOG_LINES)]
    pub log_lines: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub config_path: PathBuf,
    pub docker_bin: String,
    pub managed_label: String,
    pub log_lines: usize,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        let poll_ms = args
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        let request_timeout = if args.request_timeout_secs == 0 {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            Duration::from_secs(args.request_timeout_secs)
        };
        Self {
            poll_interval: Duration::from_millis(poll_ms),
            request_timeout,
            config_path: args.config.unwrap_or_else(default_config_path),
            docker_bin: resolve_non_empty(args.docker_bin, "docker"),
            managed_label: resolve_non_empty(args.managed_label, DEFAULT_MANAGED_LABEL),
            log_lines: args.log_lines.max(1),
        }
    }

    pub fn page_settings(&self) -> PageSettings {
        PageSettings {
            poll_interval: self.poll_interval,
            request_timeout: self.request_timeout,
            log_lines: self.log_lines,
        }
    }
}

fn resolve_non_empty(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neobelt")
        .join("config.json")
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
