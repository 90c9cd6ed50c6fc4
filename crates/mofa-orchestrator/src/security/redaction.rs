//! PII detection/redaction and config-key redaction (spec §4.8).
//!
//! Grounded on `mofa-kernel::security::redaction`'s `PiiDetector`/
//! `PiiRedactor`/`RedactionAuditLog` traits.

use super::types::{RedactionMatch, RedactionResult, RedactionStrategy, SensitiveDataCategory};
use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SecurityError {
    #[error("invalid redaction pattern: {0}")]
    Pattern(String),
}

pub type SecurityResult<T> = Result<T, SecurityError>;

#[async_trait]
pub trait PiiDetector: Send + Sync {
    async fn detect(&self, text: &str) -> SecurityResult<Vec<RedactionMatch>>;
}

#[async_trait]
pub trait PiiRedactor: Send + Sync {
    async fn redact(&self, text: &str, strategy: &RedactionStrategy) -> SecurityResult<RedactionResult>;
}

pub trait RedactionAuditLog: Send + Sync {
    fn log_redaction(&self, result: &RedactionResult);
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap())
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\+?\d[\d\-. ]{7,}\d").unwrap())
}

fn ssn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap())
}

/// Regex-backed default detector/redactor for common PII classes.
#[derive(Debug, Default)]
pub struct RegexPiiDetector;

#[async_trait]
impl PiiDetector for RegexPiiDetector {
    async fn detect(&self, text: &str) -> SecurityResult<Vec<RedactionMatch>> {
        let mut matches = Vec::new();
        for (pattern, category) in [
            (ssn_pattern(), SensitiveDataCategory::Ssn),
            (email_pattern(), SensitiveDataCategory::Email),
            (phone_pattern(), SensitiveDataCategory::Phone),
        ] {
            for m in pattern.find_iter(text) {
                matches.push(RedactionMatch {
                    category: category.clone(),
                    start: m.start(),
                    end: m.end(),
                    original: m.as_str().to_string(),
                    replacement: String::new(),
                });
            }
        }
        matches.sort_by_key(|m| m.start);
        matches.dedup_by(|a, b| a.start < b.end);
        Ok(matches)
    }
}

#[derive(Debug, Default)]
pub struct RegexPiiRedactor {
    detector: RegexPiiDetector,
}

fn apply_strategy(original: &str, strategy: &RedactionStrategy) -> String {
    match strategy {
        RedactionStrategy::Mask => "*".repeat(original.len().max(4).min(8)),
        RedactionStrategy::Hash => {
            let mut hasher = Sha256::new();
            hasher.update(original.as_bytes());
            format!("#{}", &hex::encode(hasher.finalize())[..8])
        }
        RedactionStrategy::Remove => String::new(),
        RedactionStrategy::Replace(value) => value.clone(),
    }
}

#[async_trait]
impl PiiRedactor for RegexPiiRedactor {
    async fn redact(&self, text: &str, strategy: &RedactionStrategy) -> SecurityResult<RedactionResult> {
        let mut matches = self.detector.detect(text).await?;
        let mut redacted = String::with_capacity(text.len());
        let mut cursor = 0;

        for m in matches.iter_mut() {
            redacted.push_str(&text[cursor..m.start]);
            let replacement = apply_strategy(&m.original, strategy);
            redacted.push_str(&replacement);
            m.replacement = replacement;
            cursor = m.end;
        }
        redacted.push_str(&text[cursor..]);

        Ok(RedactionResult { original_text: text.to_string(), redacted_text: redacted, matches })
    }
}

/// Configuration key names treated as sensitive regardless of where they
/// appear in the config tree (spec §4.8 "enumerated sensitive-key set").
pub const SENSITIVE_CONFIG_KEYS: &[&str] = &[
    "api_key", "apikey", "secret", "password", "token", "credential", "private_key",
];

pub fn is_sensitive_config_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_CONFIG_KEYS.iter().any(|s| lower.contains(s))
}

/// Redacts a config value destined for a log line if its key matches the
/// sensitive set; otherwise returns it unchanged (spec §4.8 "A redaction
/// filter removes values of an enumerated sensitive-key set before
/// emitting logs").
pub fn redact_config_value(key: &str, value: &str) -> String {
    if is_sensitive_config_key(key) {
        "***REDACTED***".to_string()
    } else {
        value.to_string()
    }
}

fn _takes_detector(_: Box<dyn PiiDetector>) {}
fn _takes_redactor(_: Box<dyn PiiRedactor>) {}
fn _takes_audit_log(_: Box<dyn RedactionAuditLog>) {}
