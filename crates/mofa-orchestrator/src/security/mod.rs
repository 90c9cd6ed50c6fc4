//! PII redaction and sensitive-config-key filtering (spec §4.8).

pub mod redaction;
pub mod types;

pub use redaction::{
    is_sensitive_config_key, redact_config_value, PiiDetector, PiiRedactor, RedactionAuditLog,
    RegexPiiDetector, RegexPiiRedactor, SecurityError, SecurityResult,
};
pub use types::{RedactionMatch, RedactionResult, RedactionStrategy, SensitiveDataCategory};
