use crate::{ConfiguredServerRef, ControlError};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    configured_servers: Vec<ConfiguredServerRef>,
}

/// Parses the application config document and returns its configured-server
/// section. Other sections (app settings, registries, defaults) are ignored.
pub fn parse_configured_servers(content: &str) -> Result<Vec<ConfiguredServerRef>, ControlError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc: ConfigDocument = serde_json::from_str(content)
        .map_err(|err| ControlError::Config(format!("invalid config document: {err}")))?;
    Ok(doc.configured_servers)
}

/// Ids of backend processes referenced by configuration records.
pub fn configured_container_ids(refs: &[ConfiguredServerRef]) -> Vec<&str> {
    let mut ids: Vec<&str> = refs
        .iter()
        .map(|entry| entry.container_id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
