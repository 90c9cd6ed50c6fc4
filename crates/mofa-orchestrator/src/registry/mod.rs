//! Specialist agent registry and health probing (spec §4.7 "Agent
//! registry + health (C7)").
//!
//! Grounded on `mofa-gateway::backend::registry::InMemoryCapabilityRegistry`,
//! extended with the periodic `get_agent_card` health probe the spec
//! requires and per-agent status tracking.

use crate::a2a::{A2aClient, AgentCard, TransportError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("agent already registered: {0}")]
    DuplicateAgent(String),
    #[error("no healthy agent available for capability: {0}")]
    NoAgentAvailable(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Healthy,
    Unhealthy,
    CircuitOpen,
}

#[derive(Debug, Clone)]
pub struct RegisteredAgent {
    pub name: String,
    pub endpoint: String,
    pub card: Option<AgentCard>,
    pub status: AgentStatus,
    pub last_probe: Option<DateTime<Utc>>,
}

impl RegisteredAgent {
    fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            card: None,
            status: AgentStatus::Unhealthy,
            last_probe: None,
        }
    }

    fn has_capability(&self, tag: &str) -> bool {
        self.card.as_ref().is_some_and(|c| c.has_capability(tag))
    }
}

/// Probe cadence and per-probe timeout defaults (spec §4.7).
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, RegisteredAgent>>,
    client: Arc<A2aClient>,
    probe_timeout: Duration,
}

impl AgentRegistry {
    pub fn new(client: Arc<A2aClient>) -> Self {
        Self::with_probe_timeout(client, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_probe_timeout(client: Arc<A2aClient>, probe_timeout: Duration) -> Self {
        Self { agents: RwLock::new(HashMap::new()), client, probe_timeout }
    }

    /// Registers a new specialist agent by endpoint; discovery of its card
    /// happens on the next probe (spec §4.7 "calls `get_agent_card` on each
    /// endpoint at startup").
    pub async fn register(&self, name: impl Into<String>, endpoint: impl Into<String>) -> RegistryResult<()> {
        let name = name.into();
        let mut agents = self.agents.write().await;
        if agents.contains_key(&name) {
            return Err(RegistryError::DuplicateAgent(name));
        }
        agents.insert(name.clone(), RegisteredAgent::new(name, endpoint));
        Ok(())
    }

    pub async fn deregister(&self, name: &str) -> RegistryResult<()> {
        self.agents
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::AgentNotFound(name.to_string()))
    }

    pub async fn get(&self, name: &str) -> RegistryResult<RegisteredAgent> {
        self.agents
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::AgentNotFound(name.to_string()))
    }

    pub async fn list(&self) -> Vec<RegisteredAgent> {
        self.agents.read().await.values().cloned().collect()
    }

    /// Probes a single agent's card and updates its status (spec §4.7
    /// "Status transitions: Healthy ↔ Unhealthy on success/failure;
    /// CircuitOpen when the breaker is open").
    pub async fn probe(&self, name: &str) -> RegistryResult<()> {
        let endpoint = {
            let agents = self.agents.read().await;
            agents.get(name).map(|a| a.endpoint.clone()).ok_or_else(|| RegistryError::AgentNotFound(name.to_string()))?
        };

        let result = self.client.get_agent_card(&endpoint, self.probe_timeout).await;
        let mut agents = self.agents.write().await;
        let Some(agent) = agents.get_mut(name) else {
            return Err(RegistryError::AgentNotFound(name.to_string()));
        };
        agent.last_probe = Some(Utc::now());
        match result {
            Ok(card) => {
                agent.card = Some(card);
                agent.status = AgentStatus::Healthy;
                info!(agent = name, "probe succeeded");
            }
            Err(TransportError::CircuitOpen) => {
                agent.status = AgentStatus::CircuitOpen;
            }
            Err(err) => {
                agent.status = AgentStatus::Unhealthy;
                warn!(agent = name, error = %err, "probe failed");
            }
        }
        Ok(())
    }

    /// Probes every registered agent concurrently.
    pub async fn probe_all(&self) {
        let names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        let probes = names.into_iter().map(|name| async move {
            if let Err(err) = self.probe(&name).await {
                warn!(agent = name, error = %err, "probe target vanished mid-sweep");
            }
        });
        futures::future::join_all(probes).await;
    }

    /// Spawns a background task that probes all agents on a fixed
    /// interval (spec §4.7 "A periodic probe (default every 30 s)").
    pub fn spawn_probe_loop(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.probe_all().await;
            }
        })
    }

    /// Returns the first healthy agent exposing `tag`, or
    /// `NoAgentAvailable` (spec §4.7 "A capability query returns the first
    /// healthy agent whose capability set contains the requested tag").
    pub async fn find_by_capability(&self, tag: &str) -> RegistryResult<RegisteredAgent> {
        self.agents
            .read()
            .await
            .values()
            .find(|a| a.status == AgentStatus::Healthy && a.has_capability(tag))
            .cloned()
            .ok_or_else(|| RegistryError::NoAgentAvailable(tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::RetryPolicy;

    fn registry() -> AgentRegistry {
        let client = Arc::new(A2aClient::new(Default::default(), RetryPolicy::default()));
        AgentRegistry::new(client)
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let registry = registry();
        registry.register("crm", "https://crm.example").await.unwrap();
        let agent = registry.get("crm").await.unwrap();
        assert_eq!(agent.endpoint, "https://crm.example");
        assert_eq!(agent.status, AgentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn duplicate_register_is_rejected() {
        let registry = registry();
        registry.register("crm", "https://crm.example").await.unwrap();
        assert!(matches!(registry.register("crm", "https://crm.example").await, Err(RegistryError::DuplicateAgent(_))));
    }

    #[tokio::test]
    async fn missing_capability_yields_no_agent_available() {
        let registry = registry();
        registry.register("crm", "https://crm.example").await.unwrap();
        let err = registry.find_by_capability("crm_lookup").await.unwrap_err();
        assert!(matches!(err, RegistryError::NoAgentAvailable(_)));
    }

    #[tokio::test]
    async fn deregister_removes_agent() {
        let registry = registry();
        registry.register("crm", "https://crm.example").await.unwrap();
        registry.deregister("crm").await.unwrap();
        assert!(matches!(registry.get("crm").await, Err(RegistryError::AgentNotFound(_))));
    }
}
