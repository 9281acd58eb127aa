use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted user preferences, replacing the teacher's raw
/// `serde_json::Value` patching with a typed struct on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentAuditConfig {
    #[serde(default)]
    pub preferred_provider: Option<String>,
    #[serde(default)]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub no_upload: bool,
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".agentaudit").join("config.json"))
        .unwrap_or_else(|| PathBuf::from(".agentaudit/config.json"))
}

/// Load the persisted config, defaulting to an empty one if missing or
/// unparseable.
pub fn load() -> AgentAuditConfig {
    std::fs::read_to_string(config_path())
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Persist `config` to disk, creating the parent directory if needed.
pub fn save(config: &AgentAuditConfig) -> Result<(), String> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("failed to create config directory: {e}"))?;
    }
    let serialized = serde_json::to_string_pretty(config).map_err(|e| format!("failed to serialize config: {e}"))?;
    std::fs::write(&path, serialized).map_err(|e| format!("failed to write config: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_preferences() {
        let config = AgentAuditConfig::default();
        assert!(config.preferred_provider.is_none());
        assert!(!config.no_upload);
    }
}
