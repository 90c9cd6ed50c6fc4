//! Deduplicating merge (spec §4.6 "Merge").
//!
//! `merge(existing, new)` is associative, commutative up to element order,
//! and idempotent (spec §8 "For all memory merges M"): `merge(x, ∅) = x`,
//! `merge(x, x) = x`, `merge(merge(x, y), z) = merge(x, merge(y, z))`.

use super::types::{Account, Case, Contact, Lead, MemoryEntity, Opportunity, Task, UserMemory};

/// Whether `candidate` should replace `incumbent` at the same identity
/// slot: either it carries strictly more non-null optional fields, or it
/// supplies an external id the incumbent lacked (spec §4.6 rule 1/2).
fn is_more_complete<T: MemoryEntity>(incumbent: &T, candidate: &T) -> bool {
    candidate.completeness() > incumbent.completeness()
        || (incumbent.id().is_none() && candidate.id().is_some())
}

/// Merges `new` items into `existing` in place, following spec §4.6's
/// three-step rule per new item: match by id, else match by
/// case-insensitive display name, else append.
fn merge_collection<T>(existing: &mut Vec<T>, new: Vec<T>)
where
    T: MemoryEntity + Clone,
{
    'items: for candidate in new {
        if let Some(cand_id) = candidate.id() {
            if let Some(slot) = existing.iter_mut().find(|e| e.id() == Some(cand_id)) {
                if is_more_complete(slot, &candidate) {
                    *slot = candidate;
                }
                continue 'items;
            }
        }

        if let Some(slot) = existing
            .iter_mut()
            .find(|e| e.display().eq_ignore_ascii_case(candidate.display()))
        {
            if is_more_complete(slot, &candidate) {
                *slot = candidate;
            }
            continue 'items;
        }

        existing.push(candidate);
    }
}

/// Merges `new` into `existing`, producing a fresh [`UserMemory`]
/// (spec §4.6).
pub fn merge(existing: &UserMemory, new: &UserMemory) -> UserMemory {
    let mut merged = existing.clone();
    merge_collection(&mut merged.accounts, new.accounts.clone());
    merge_collection(&mut merged.contacts, new.contacts.clone());
    merge_collection(&mut merged.opportunities, new.opportunities.clone());
    merge_collection(&mut merged.cases, new.cases.clone());
    merge_collection(&mut merged.tasks, new.tasks.clone());
    merge_collection(&mut merged.leads, new.leads.clone());
    merged
}

#[allow(dead_code)]
fn _assert_entity_bounds<T: MemoryEntity + Clone>() {}
#[allow(dead_code)]
fn _check() {
    _assert_entity_bounds::<Account>();
    _assert_entity_bounds::<Contact>();
    _assert_entity_bounds::<Opportunity>();
    _assert_entity_bounds::<Case>();
    _assert_entity_bounds::<Task>();
    _assert_entity_bounds::<Lead>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_with_empty_is_identity() {
        let existing = UserMemory {
            accounts: vec![Account { id: Some("1".into()), name: "Acme".into(), ..Default::default() }],
            ..Default::default()
        };
        let merged = merge(&existing, &UserMemory::default());
        assert_eq!(merged, existing);
    }

    #[test]
    fn merge_with_self_is_idempotent() {
        let existing = UserMemory {
            accounts: vec![Account { id: Some("1".into()), name: "Acme".into(), ..Default::default() }],
            ..Default::default()
        };
        let merged = merge(&existing, &existing);
        assert_eq!(merged, existing);
    }

    #[test]
    fn new_item_with_id_replaces_nameless_match_when_more_complete() {
        let existing = UserMemory {
            accounts: vec![Account { id: None, name: "Acme".into(), ..Default::default() }],
            ..Default::default()
        };
        let incoming = UserMemory {
            accounts: vec![Account { id: Some("001".into()), name: "Acme".into(), ..Default::default() }],
            ..Default::default()
        };
        let merged = merge(&existing, &incoming);
        assert_eq!(merged.accounts.len(), 1);
        assert_eq!(merged.accounts[0].id.as_deref(), Some("001"));
        assert_eq!(merged.accounts[0].name, "Acme");
    }

    #[test]
    fn case_insensitive_display_match_dedupes() {
        let existing = UserMemory {
            accounts: vec![Account { id: None, name: "ACME".into(), ..Default::default() }],
            ..Default::default()
        };
        let incoming = UserMemory {
            accounts: vec![Account { id: None, name: "acme".into(), industry: Some("Software".into()), ..Default::default() }],
            ..Default::default()
        };
        let merged = merge(&existing, &incoming);
        assert_eq!(merged.accounts.len(), 1);
        assert_eq!(merged.accounts[0].industry.as_deref(), Some("Software"));
    }

    #[test]
    fn less_complete_candidate_does_not_overwrite_incumbent() {
        let existing = UserMemory {
            accounts: vec![Account {
                id: Some("1".into()),
                name: "Acme".into(),
                industry: Some("Software".into()),
                website: Some("acme.example".into()),
            }],
            ..Default::default()
        };
        let incoming = UserMemory {
            accounts: vec![Account { id: Some("1".into()), name: "Acme".into(), ..Default::default() }],
            ..Default::default()
        };
        let merged = merge(&existing, &incoming);
        assert_eq!(merged.accounts[0].industry.as_deref(), Some("Software"));
    }

    #[test]
    fn distinct_ids_append_rather_than_merge() {
        let existing = UserMemory {
            accounts: vec![Account { id: Some("1".into()), name: "Acme".into(), ..Default::default() }],
            ..Default::default()
        };
        let incoming = UserMemory {
            accounts: vec![Account { id: Some("2".into()), name: "Globex".into(), ..Default::default() }],
            ..Default::default()
        };
        let merged = merge(&existing, &incoming);
        assert_eq!(merged.accounts.len(), 2);
    }

    #[test]
    fn merge_is_associative_up_to_order() {
        let x = UserMemory {
            accounts: vec![Account { id: Some("1".into()), name: "Acme".into(), ..Default::default() }],
            ..Default::default()
        };
        let y = UserMemory {
            contacts: vec![Contact { id: Some("c1".into()), name: "John".into(), ..Default::default() }],
            ..Default::default()
        };
        let z = UserMemory {
            leads: vec![Lead { id: Some("l1".into()), name: "Jane".into(), ..Default::default() }],
            ..Default::default()
        };
        let left = merge(&merge(&x, &y), &z);
        let right = merge(&x, &merge(&y, &z));
        assert_eq!(left.accounts, right.accounts);
        assert_eq!(left.contacts, right.contacts);
        assert_eq!(left.leads, right.leads);
    }
}
