use fleet_core::{
    configured_container_ids, ids_match, ConfiguredServerRef, ControlError, ControlPlane,
    ManagedServer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Drives the loading skeleton while the fetch is outstanding.
    Full,
    /// Background reload after a command or an external config change.
    Silent,
}

impl LoadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::Full => "full",
            LoadMode::Silent => "silent",
        }
    }
}

/// Inner join of backend processes with the configured set. A process is kept
/// when any configured container id matches it by the prefix rule.
pub fn join_configured(
    processes: Vec<ManagedServer>,
    configured: &[ConfiguredServerRef],
) -> Vec<ManagedServer> {
    let wanted = configured_container_ids(configured);
    processes
        .into_iter()
        .filter(|process| wanted.iter().any(|id| ids_match(id, &process.id)))
        .collect()
}

/// Fetches both collections concurrently and joins them.
pub async fn fetch_collection(plane: &dyn ControlPlane) -> Result<Vec<ManagedServer>, ControlError> {
    let (processes, configured) =
        tokio::try_join!(plane.list_processes(), plane.list_configured_servers())?;
    Ok(join_configured(processes, &configured))
}
