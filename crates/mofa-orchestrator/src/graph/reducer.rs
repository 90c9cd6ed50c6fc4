//! Per-key reducers (spec §3, §4.4 "Reducers").
//!
//! Grounded on `mofa-kernel::workflow::reducer`'s `Reducer` trait and
//! `ReducerType` enum; the spec needs a reducer shape the teacher's
//! built-in variants don't cover (id-based dedup + remove sentinels for
//! `messages`), implemented here as a dedicated function rather than a new
//! enum variant, keeping with the teacher's `#[non_exhaustive]`-style
//! extensibility.

use super::state::{ChatMessage, OrchestratorEvent, EVENTS_CAP};

/// Append-with-id-dedup-and-remove-sentinel reducer for `messages`
/// (spec §4.4 "the `messages` reducer").
///
/// - A new message whose id matches an existing one replaces it in place.
/// - A new message tagged `remove` elides the existing message with the
///   same id instead of appending.
/// - Otherwise the message is appended.
///
/// Applying the same update twice is idempotent because the second
/// application again finds the matching id and performs the same
/// replacement/removal (spec §8 "idempotence via id-based dedup").
pub fn reduce_messages(current: &mut Vec<ChatMessage>, updates: Vec<ChatMessage>) {
    for update in updates {
        if update.remove {
            current.retain(|m| m.id != update.id);
            continue;
        }
        if let Some(existing) = current.iter_mut().find(|m| m.id == update.id) {
            *existing = update;
        } else {
            current.push(update);
        }
    }
}

/// Append-and-cap-at-50 reducer for `events` (spec §3, §4.4).
pub fn reduce_events(current: &mut Vec<OrchestratorEvent>, updates: Vec<OrchestratorEvent>) {
    current.extend(updates);
    if current.len() > EVENTS_CAP {
        let excess = current.len() - EVENTS_CAP;
        current.drain(0..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::state::MessageRole;
    use uuid::Uuid;

    #[test]
    fn appends_new_message() {
        let mut messages = Vec::new();
        let msg = ChatMessage::new(MessageRole::User, "hi");
        reduce_messages(&mut messages, vec![msg.clone()]);
        assert_eq!(messages, vec![msg]);
    }

    #[test]
    fn replaces_message_with_same_id() {
        let mut messages = Vec::new();
        let msg = ChatMessage::new(MessageRole::User, "hi");
        reduce_messages(&mut messages, vec![msg.clone()]);

        let mut updated = msg.clone();
        updated.content = "hi there".to_string();
        reduce_messages(&mut messages, vec![updated.clone()]);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi there");
    }

    #[test]
    fn remove_sentinel_elides_message() {
        let mut messages = Vec::new();
        let msg = ChatMessage::new(MessageRole::User, "hi");
        reduce_messages(&mut messages, vec![msg.clone()]);
        reduce_messages(&mut messages, vec![ChatMessage::remove_sentinel(msg.id)]);
        assert!(messages.is_empty());
    }

    #[test]
    fn applying_same_update_twice_is_idempotent() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let msg = ChatMessage::new(MessageRole::User, "hi");
        reduce_messages(&mut a, vec![msg.clone()]);
        reduce_messages(&mut a, vec![msg.clone()]);

        reduce_messages(&mut b, vec![msg]);
        assert_eq!(a, b);
    }

    #[test]
    fn events_capped_at_fifty_dropping_oldest() {
        let mut events = Vec::new();
        let updates: Vec<_> = (0..60)
            .map(|i| OrchestratorEvent {
                kind: "note".into(),
                detail: i.to_string(),
            })
            .collect();
        reduce_events(&mut events, updates);
        assert_eq!(events.len(), EVENTS_CAP);
        assert_eq!(events.first().unwrap().detail, "10");
        assert_eq!(events.last().unwrap().detail, "59");
    }

    #[test]
    fn unique_ids_preserved_after_many_reduces() {
        let mut messages = Vec::new();
        for _ in 0..5 {
            reduce_messages(&mut messages, vec![ChatMessage::new(MessageRole::User, "x")]);
        }
        let ids: std::collections::HashSet<Uuid> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), messages.len());
    }
}
