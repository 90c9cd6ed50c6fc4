//! Layered config loading: defaults ← file ← environment ← runtime
//! updates (spec §4.8 "load order").
//!
//! Grounded on `mofa-kernel::config`'s `detect_format`/`substitute_env_vars`/
//! `load_with_env` functions, narrowed to the single [`OrchestratorConfig`]
//! shape rather than a generic `DeserializeOwned` target.

use super::ConfigError;
use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::OnceLock;

pub fn detect_format(path: &str) -> Result<FileFormat, ConfigError> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("no file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn braced_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

fn bare_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").unwrap())
}

/// Substitutes `${VAR}` and `$VAR` references with their process
/// environment values, leaving unset references untouched.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = braced_pattern()
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string();

    bare_pattern()
        .replace_all(&braced, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

/// Loads a typed config from defaults, an optional file, and environment
/// variables prefixed `env_prefix` with `__` nesting separators (spec §4.8
/// "load order is (defaults ← file ← environment ← runtime updates)").
pub fn load_layered<T>(defaults: &str, file_path: Option<&str>, env_prefix: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = Cfg::builder().add_source(File::from_str(defaults, FileFormat::Yaml));

    if let Some(path) = file_path {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&content);
        builder = builder.add_source(File::from_str(&substituted, format));
    }

    builder = builder.add_source(Environment::with_prefix(env_prefix).separator("__"));

    let built = builder.build().map_err(|e| ConfigError::Parse(e.to_string()))?;
    built.try_deserialize().map_err(|e| ConfigError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_format_recognises_common_extensions() {
        assert_eq!(detect_format("config.yaml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("config.toml").unwrap(), FileFormat::Toml);
        assert_eq!(detect_format("config.json").unwrap(), FileFormat::Json);
        assert!(detect_format("config.txt").is_err());
    }

    #[test]
    fn substitutes_braced_and_bare_env_vars() {
        std::env::set_var("ORCH_TEST_VAR", "value-1");
        assert_eq!(substitute_env_vars("x: ${ORCH_TEST_VAR}"), "x: value-1");
        assert_eq!(substitute_env_vars("x: $ORCH_TEST_VAR"), "x: value-1");
        std::env::remove_var("ORCH_TEST_VAR");
    }

    #[test]
    fn leaves_unset_variables_untouched() {
        assert_eq!(substitute_env_vars("x: ${ORCH_DEFINITELY_UNSET}"), "x: ${ORCH_DEFINITELY_UNSET}");
    }
}
