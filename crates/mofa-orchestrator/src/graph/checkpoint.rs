//! Per-thread checkpointing (spec §3 "All state transitions are
//! checkpointed by C4 keyed on a thread identifier", §4.4 "Interruption &
//! resume").
//!
//! Built directly on the [`Store`](crate::store::Store) trait from C3
//! rather than a dedicated table: checkpoints live under the namespace
//! `("checkpoint", thread_id)`.

use super::state::OrchestratorState;
use crate::store::{Store, StoreResult};
use std::sync::Arc;

const CHECKPOINT_KEY: &str = "latest";

pub struct CheckpointStore {
    store: Arc<dyn Store>,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn namespace(thread_id: &str) -> Vec<String> {
        vec!["checkpoint".to_string(), thread_id.to_string()]
    }

    /// Persists `state` as the latest checkpoint for its thread id.
    /// A caller observing checkpoint N can rely on all prior nodes having
    /// completed (spec §4.3 "Ordering guarantees").
    pub async fn save(&self, state: &OrchestratorState) -> StoreResult<()> {
        let value = serde_json::to_value(state)
            .map_err(|e| crate::store::StoreError::Serialization(e.to_string()))?;
        self.store
            .put(&Self::namespace(&state.thread_id), CHECKPOINT_KEY, value)
            .await
    }

    /// Loads the latest checkpoint for `thread_id`, if one exists.
    pub async fn load(&self, thread_id: &str) -> StoreResult<Option<OrchestratorState>> {
        let raw = self.store.get(&Self::namespace(thread_id), CHECKPOINT_KEY).await?;
        match raw {
            Some(value) => {
                let state = serde_json::from_value(value)
                    .map_err(|e| crate::store::StoreError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::embedded::EmbeddedStore;

    #[tokio::test]
    async fn save_then_load_observes_the_write() {
        let store: Arc<dyn Store> = Arc::new(EmbeddedStore::in_memory().await.unwrap());
        let checkpoints = CheckpointStore::new(store);
        let state = OrchestratorState::new("user-1", "thread-1");

        checkpoints.save(&state).await.unwrap();
        let loaded = checkpoints.load("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded.thread_id, state.thread_id);
    }

    #[tokio::test]
    async fn missing_thread_returns_none() {
        let store: Arc<dyn Store> = Arc::new(EmbeddedStore::in_memory().await.unwrap());
        let checkpoints = CheckpointStore::new(store);
        assert!(checkpoints.load("never-seen").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn distinct_threads_do_not_collide() {
        let store: Arc<dyn Store> = Arc::new(EmbeddedStore::in_memory().await.unwrap());
        let checkpoints = CheckpointStore::new(store);
        let state_a = OrchestratorState::new("user-1", "thread-a");
        let state_b = OrchestratorState::new("user-2", "thread-b");
        checkpoints.save(&state_a).await.unwrap();
        checkpoints.save(&state_b).await.unwrap();

        assert_eq!(checkpoints.load("thread-a").await.unwrap().unwrap().user_id, "user-1");
        assert_eq!(checkpoints.load("thread-b").await.unwrap().unwrap().user_id, "user-2");
    }
}
