//! `memory → context_string` projection (spec §4.6 "Context projection").

use super::types::UserMemory;

const MAX_ACCOUNTS: usize = 5;
const MAX_CONTACTS: usize = 5;
const MAX_OPEN_OPPORTUNITIES: usize = 3;

/// Builds the compact, token-budgeted text block inserted into the
/// chatbot system prompt: at most 5 accounts, 5 contacts, and 3 non-closed
/// opportunities.
pub fn context_string(memory: &UserMemory) -> String {
    let mut out = String::new();

    if !memory.accounts.is_empty() {
        out.push_str("Accounts:\n");
        for account in memory.accounts.iter().take(MAX_ACCOUNTS) {
            out.push_str("- ");
            out.push_str(&account.name);
            if let Some(industry) = &account.industry {
                out.push_str(" (");
                out.push_str(industry);
                out.push(')');
            }
            out.push('\n');
        }
    }

    if !memory.contacts.is_empty() {
        out.push_str("Contacts:\n");
        for contact in memory.contacts.iter().take(MAX_CONTACTS) {
            out.push_str("- ");
            out.push_str(&contact.name);
            if let Some(account_name) = &contact.account_name {
                out.push_str(" @ ");
                out.push_str(account_name);
            }
            out.push('\n');
        }
    }

    let open_opportunities: Vec<_> = memory
        .opportunities
        .iter()
        .filter(|o| o.is_open())
        .take(MAX_OPEN_OPPORTUNITIES)
        .collect();
    if !open_opportunities.is_empty() {
        out.push_str("Open opportunities:\n");
        for opportunity in open_opportunities {
            out.push_str("- ");
            out.push_str(&opportunity.name);
            if let Some(stage) = &opportunity.stage {
                out.push_str(" (");
                out.push_str(stage);
                out.push(')');
            }
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{Account, Contact, Opportunity};

    #[test]
    fn empty_memory_yields_empty_context() {
        assert_eq!(context_string(&UserMemory::default()), "");
    }

    #[test]
    fn caps_accounts_at_five() {
        let memory = UserMemory {
            accounts: (0..10)
                .map(|i| Account { name: format!("Acct{i}"), ..Default::default() })
                .collect(),
            ..Default::default()
        };
        let text = context_string(&memory);
        assert_eq!(text.matches("Acct").count(), MAX_ACCOUNTS);
    }

    #[test]
    fn excludes_closed_opportunities() {
        let memory = UserMemory {
            opportunities: vec![
                Opportunity { name: "Open Deal".into(), closed: Some(false), ..Default::default() },
                Opportunity { name: "Closed Deal".into(), closed: Some(true), ..Default::default() },
            ],
            ..Default::default()
        };
        let text = context_string(&memory);
        assert!(text.contains("Open Deal"));
        assert!(!text.contains("Closed Deal"));
    }

    #[test]
    fn caps_open_opportunities_at_three() {
        let memory = UserMemory {
            opportunities: (0..6)
                .map(|i| Opportunity { name: format!("Deal{i}"), closed: Some(false), ..Default::default() })
                .collect(),
            ..Default::default()
        };
        let text = context_string(&memory);
        assert_eq!(text.matches("Deal").count(), MAX_OPEN_OPPORTUNITIES);
    }

    #[test]
    fn contact_shows_account_affiliation() {
        let memory = UserMemory {
            contacts: vec![Contact { name: "John".into(), account_name: Some("Acme".into()), ..Default::default() }],
            ..Default::default()
        };
        let text = context_string(&memory);
        assert!(text.contains("John @ Acme"));
    }
}
