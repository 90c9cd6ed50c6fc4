//! Typed configuration (C8): layered loading, validation, redaction of
//! sensitive keys before logging (spec §4.8 "Config & redaction (C8)").

pub mod loader;
pub mod schema;

pub use loader::{detect_format, load_layered, substitute_env_vars};
pub use schema::{A2aConfig, AgentEndpointConfig, ConversationConfig, DatabaseConfig, Environment, LlmConfig, OrchestratorConfig};

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to deserialize config: {0}")]
    Serialization(String),
    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Default config document (YAML), the innermost layer of the load order
/// `defaults ← file ← environment ← runtime updates` (spec §4.8).
pub const DEFAULTS_YAML: &str = "environment: development\ndebug: false\n";

/// Loads the orchestrator's typed config from the layered sources and
/// validates it (spec §4.8 "Validation rules").
pub fn load(file_path: Option<&str>) -> Result<OrchestratorConfig, ConfigError> {
    let config: OrchestratorConfig = load_layered(DEFAULTS_YAML, file_path, "ORCHESTRATOR")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_no_file_returns_validated_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.environment, Environment::Development);
    }
}
