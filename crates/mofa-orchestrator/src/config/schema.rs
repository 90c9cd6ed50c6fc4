//! Typed configuration record (spec §6 "Configuration keys", §4.8
//! "Validation rules").

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_retry_attempts() -> u32 {
    3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aConfig {
    #[serde(default = "default_a2a_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_sock_read_timeout_secs")]
    pub sock_read_timeout_secs: u64,
    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_breaker_timeout_secs")]
    pub circuit_breaker_timeout_secs: u64,
    #[serde(default = "default_pool_size")]
    pub connection_pool_size: usize,
    #[serde(default = "default_pool_size_per_host")]
    pub connection_pool_size_per_host: usize,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_timeout_secs: u64,
    #[serde(default = "default_dns_cache_ttl_secs")]
    pub dns_cache_ttl_secs: u64,
}

fn default_a2a_timeout_secs() -> u64 {
    10
}
fn default_sock_read_timeout_secs() -> u64 {
    15
}
fn default_health_check_timeout_secs() -> u64 {
    10
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_timeout_secs() -> u64 {
    60
}
fn default_pool_size() -> usize {
    50
}
fn default_pool_size_per_host() -> usize {
    20
}
fn default_keepalive_secs() -> u64 {
    30
}
fn default_dns_cache_ttl_secs() -> u64 {
    300
}

impl Default for A2aConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_a2a_timeout_secs(),
            sock_read_timeout_secs: default_sock_read_timeout_secs(),
            health_check_timeout_secs: default_health_check_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            circuit_breaker_threshold: default_breaker_threshold(),
            circuit_breaker_timeout_secs: default_breaker_timeout_secs(),
            connection_pool_size: default_pool_size(),
            connection_pool_size_per_host: default_pool_size_per_host(),
            keepalive_timeout_secs: default_keepalive_secs(),
            dns_cache_ttl_secs: default_dns_cache_ttl_secs(),
        }
    }
}

impl A2aConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sock_read_timeout(&self) -> Duration {
        Duration::from_secs(self.sock_read_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_database_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
}

fn default_database_path() -> String {
    "sqlite://orchestrator.db".to_string()
}
fn default_database_timeout_secs() -> u64 {
    5
}
fn default_database_pool_size() -> u32 {
    20
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            timeout_secs: default_database_timeout_secs(),
            pool_size: default_database_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_summary_trigger")]
    pub summary_trigger_messages: u32,
    #[serde(default = "default_max_preserve")]
    pub max_messages_to_preserve: u32,
    #[serde(default = "default_max_tokens_preserve")]
    pub max_tokens_to_preserve: u32,
    #[serde(default = "default_max_event_history")]
    pub max_event_history: u32,
    #[serde(default = "default_memory_update_trigger")]
    pub memory_update_trigger_messages: u32,
}

fn default_summary_trigger() -> u32 {
    5
}
fn default_max_preserve() -> u32 {
    10
}
fn default_max_tokens_preserve() -> u32 {
    3000
}
fn default_max_event_history() -> u32 {
    50
}
fn default_memory_update_trigger() -> u32 {
    5
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            summary_trigger_messages: default_summary_trigger(),
            max_messages_to_preserve: default_max_preserve(),
            max_tokens_to_preserve: default_max_tokens_preserve(),
            max_event_history: default_max_event_history(),
            memory_update_trigger_messages: default_memory_update_trigger(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentEndpointConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
}

fn default_health_check_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub a2a: A2aConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub agents: HashMap<String, AgentEndpointConfig>,
}

impl OrchestratorConfig {
    /// Validates cross-field invariants and required-in-production fields
    /// (spec §4.8 "Validation rules", §6 "Invariant").
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.temperature > 1.0 {
            return Err(ConfigError::Validation("llm.temperature must be <= 1.0".to_string()));
        }
        if self.a2a.connection_pool_size == 0 || self.a2a.connection_pool_size_per_host == 0 {
            return Err(ConfigError::Validation("a2a pool sizes must be positive".to_string()));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::Validation("database.pool_size must be positive".to_string()));
        }
        if self.a2a.timeout_secs == 0 || self.a2a.sock_read_timeout_secs == 0 {
            return Err(ConfigError::Validation("a2a timeouts must be positive".to_string()));
        }

        // The known defect this design corrects (spec §6 "Invariant").
        if self.a2a.sock_read_timeout_secs < self.a2a.timeout_secs {
            return Err(ConfigError::Validation(
                "a2a.sock_read_timeout must be >= a2a.timeout".to_string(),
            ));
        }

        if self.environment == Environment::Production && self.llm.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::Validation(
                "llm.api_key is required when environment = production".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn temperature_above_one_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.llm.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sock_read_timeout_below_timeout_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.a2a.timeout_secs = 20;
        config.a2a.sock_read_timeout_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sock_read_timeout_equal_to_timeout_is_allowed() {
        let mut config = OrchestratorConfig::default();
        config.a2a.timeout_secs = 20;
        config.a2a.sock_read_timeout_secs = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_without_api_key_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.environment = Environment::Production;
        assert!(config.validate().is_err());
    }

    #[test]
    fn production_with_api_key_is_accepted() {
        let mut config = OrchestratorConfig::default();
        config.environment = Environment::Production;
        config.llm.api_key = Some("sk-live-xyz".to_string());
        assert!(config.validate().is_ok());
    }
}
