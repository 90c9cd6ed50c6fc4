//! The six typed entity collections that make up [`UserMemory`]
//! (spec §3 "User Memory": "a record of six typed collections... Each
//! element has an optional external id, a required display field, and a
//! small set of optional scalar attributes including foreign-key
//! references by id/name between collections").

use serde::{Deserialize, Serialize};

/// Common shape every memory entity satisfies, used by the merge
/// algorithm (spec §4.6) to compare candidates without knowing the
/// concrete collection.
pub trait MemoryEntity {
    fn id(&self) -> Option<&str>;
    fn display(&self) -> &str;

    /// Count of non-null optional fields, used to decide which of two
    /// candidates with the same identity is "more complete"
    /// (spec §4.6 rule 1/2).
    fn completeness(&self) -> usize;
}

macro_rules! count_some {
    ($($field:expr),* $(,)?) => {
        0 $(+ if $field.is_some() { 1 } else { 0 })*
    };
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Account {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl MemoryEntity for Account {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn display(&self) -> &str {
        &self.name
    }
    fn completeness(&self) -> usize {
        count_some!(self.id, self.industry, self.website)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Contact {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
}

impl MemoryEntity for Contact {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn display(&self) -> &str {
        &self.name
    }
    fn completeness(&self) -> usize {
        count_some!(
            self.id,
            self.email,
            self.phone,
            self.account_id,
            self.account_name
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Opportunity {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub closed: Option<bool>,
}

impl Opportunity {
    /// "non-closed" per the context-projection cap (spec §4.6).
    pub fn is_open(&self) -> bool {
        self.closed != Some(true)
    }
}

impl MemoryEntity for Opportunity {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn display(&self) -> &str {
        &self.name
    }
    fn completeness(&self) -> usize {
        count_some!(
            self.id,
            self.stage,
            self.amount,
            self.account_id,
            self.account_name,
            self.closed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Case {
    #[serde(default)]
    pub id: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
}

impl MemoryEntity for Case {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn display(&self) -> &str {
        &self.subject
    }
    fn completeness(&self) -> usize {
        count_some!(self.id, self.status, self.account_id, self.account_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Task {
    #[serde(default)]
    pub id: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub related_to: Option<String>,
}

impl MemoryEntity for Task {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn display(&self) -> &str {
        &self.subject
    }
    fn completeness(&self) -> usize {
        count_some!(self.id, self.status, self.due_date, self.related_to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Lead {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl MemoryEntity for Lead {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn display(&self) -> &str {
        &self.name
    }
    fn completeness(&self) -> usize {
        count_some!(self.id, self.company, self.status)
    }
}

/// The deduplicated user-memory record (spec §3 "User Memory").
///
/// Unknown JSON keys are ignored by `serde` field selection alone
/// (forward compatibility, spec §6 "Persisted memory JSON").
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UserMemory {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default)]
    pub cases: Vec<Case>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub leads: Vec<Lead>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_ignored_on_deserialize() {
        let raw = serde_json::json!({
            "accounts": [{"name": "Acme"}],
            "contacts": [],
            "opportunities": [],
            "cases": [],
            "tasks": [],
            "leads": [],
            "future_collection": [{"whatever": true}],
        });
        let memory: UserMemory = serde_json::from_value(raw).unwrap();
        assert_eq!(memory.accounts.len(), 1);
    }

    #[test]
    fn completeness_counts_non_null_optional_fields() {
        let bare = Account { id: None, name: "Acme".into(), industry: None, website: None };
        let full = Account {
            id: Some("001".into()),
            name: "Acme".into(),
            industry: Some("Software".into()),
            website: Some("acme.example".into()),
        };
        assert_eq!(bare.completeness(), 0);
        assert_eq!(full.completeness(), 3);
    }
}
