//! Redaction value types (spec §4.8 "redaction filter").

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SensitiveDataCategory {
    Email,
    Phone,
    CreditCard,
    Ssn,
    ApiKey,
    /// A configuration key named in the enumerated sensitive-key set
    /// (spec §6 configuration keys; e.g. `llm.api_key`).
    ConfigKey(String),
    Custom(String),
}

impl fmt::Display for SensitiveDataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Phone => write!(f, "phone"),
            Self::CreditCard => write!(f, "credit_card"),
            Self::Ssn => write!(f, "ssn"),
            Self::ApiKey => write!(f, "api_key"),
            Self::ConfigKey(name) => write!(f, "config_key:{name}"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RedactionStrategy {
    Mask,
    Hash,
    Remove,
    Replace(String),
}

impl Default for RedactionStrategy {
    fn default() -> Self {
        Self::Mask
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionMatch {
    pub category: SensitiveDataCategory,
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionResult {
    pub original_text: String,
    pub redacted_text: String,
    pub matches: Vec<RedactionMatch>,
}

impl RedactionResult {
    pub fn has_redactions(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn redaction_count(&self) -> usize {
        self.matches.len()
    }
}
