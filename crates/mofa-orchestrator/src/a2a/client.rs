//! A2A client: `get_agent_card` / `call_agent` over JSON-RPC, guarded by
//! C1 resilience and a connection pool keyed on `(base_url, timeout)`
//! (spec §4.2 "Client").

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use super::types::{AgentCard, Task, TaskResult};
use super::TransportError;
use crate::resilience::{resilient_call, Breaker, BreakerConfig, RetryPolicy};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Pool key: the timeout participates in equality so a health-check
/// session (short timeout) is never reused for a long-running task call
/// (spec §4.2 "the timeout must be part of the key" — the named defect
/// this design fixes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    base_url: String,
    timeout: Duration,
}

struct PoolEntry {
    client: reqwest::Client,
    created_at: Instant,
}

/// Connection pool limits (spec §4.2).
#[derive(Debug, Clone)]
pub struct PoolLimits {
    pub max_connections_total: usize,
    pub max_connections_per_host: usize,
    pub dns_cache_ttl: Duration,
    pub keepalive_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections_total: 50,
            max_connections_per_host: 20,
            dns_cache_ttl: Duration::from_secs(300),
            keepalive_timeout: Duration::from_secs(30),
        }
    }
}

pub struct A2aClient {
    entries: DashMap<PoolKey, Arc<PoolEntry>>,
    breakers: DashMap<String, Arc<Breaker>>,
    limits: PoolLimits,
    retry_policy: RetryPolicy,
}

impl A2aClient {
    pub fn new(limits: PoolLimits, retry_policy: RetryPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            breakers: DashMap::new(),
            limits,
            retry_policy,
        }
    }

    fn breaker_for(&self, endpoint: &str) -> Arc<Breaker> {
        self.breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(Breaker::new(endpoint, BreakerConfig::default())))
            .clone()
    }

    fn client_for(&self, base_url: &str, timeout: Duration) -> reqwest::Client {
        let key = PoolKey { base_url: base_url.to_string(), timeout };
        if let Some(entry) = self.entries.get(&key) {
            return entry.client.clone();
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(self.limits.max_connections_per_host)
            .pool_idle_timeout(self.limits.keepalive_timeout)
            .build()
            .expect("http client configuration is always valid");

        self.entries.insert(
            key,
            Arc::new(PoolEntry { client: client.clone(), created_at: Instant::now() }),
        );
        client
    }

    /// Removes pool entries idle past the keepalive timeout (spec §4.2
    /// "A background sweep every 30 s removes closed sessions").
    pub fn sweep(&self) {
        let limit = self.limits.keepalive_timeout;
        self.entries.retain(|_, entry| entry.created_at.elapsed() < limit * 4);
    }

    async fn post(&self, client: &reqwest::Client, url: &str, body: Value) -> Result<Value, TransportError> {
        let response = client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::Upstream5xx(status.as_u16()));
        }
        if status.is_client_error() {
            return Err(TransportError::Upstream4xx(status.as_u16()));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(TransportError::from_reqwest)?;

        if let Some(error) = rpc_response.error {
            return Err(TransportError::Rpc { code: error.code, message: error.message });
        }
        rpc_response
            .result
            .ok_or_else(|| TransportError::Rpc { code: super::jsonrpc::INTERNAL_ERROR, message: "missing result".into() })
    }

    /// Fetches a remote agent's capability card (spec §4.2 "Agent Card
    /// endpoint").
    pub async fn get_agent_card(&self, base_url: &str, timeout: Duration) -> Result<AgentCard, TransportError> {
        let breaker = self.breaker_for(base_url);
        let client = self.client_for(base_url, timeout);
        let url = base_url.to_string();

        let value = resilient_call(base_url, &breaker, &self.retry_policy, timeout, || {
            let request = JsonRpcRequest::new("get_agent_card", Value::Null, Value::from(Uuid::new_v4().to_string()));
            let body = serde_json::to_value(&request).expect("jsonrpc envelope always serializes");
            self.post(&client, &url, body)
        })
        .await
        .map_err(TransportError::from_resilience)?;

        serde_json::from_value(value).map_err(|e| TransportError::Deserialize(e.to_string()))
    }

    /// Dispatches a task to a specialist agent (spec §4.2 "Client").
    pub async fn call_agent(&self, base_url: &str, task: Task, timeout: Duration) -> Result<TaskResult, TransportError> {
        let breaker = self.breaker_for(base_url);
        let client = self.client_for(base_url, timeout);
        let url = base_url.to_string();

        let value = resilient_call(base_url, &breaker, &self.retry_policy, timeout, || {
            let params = serde_json::to_value(&task).expect("task always serializes");
            let request = JsonRpcRequest::new("process_task", params, Value::from(Uuid::new_v4().to_string()));
            let body = serde_json::to_value(&request).expect("jsonrpc envelope always serializes");
            self.post(&client, &url, body)
        })
        .await
        .map_err(TransportError::from_resilience)?;

        serde_json::from_value(value).map_err(|e| TransportError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_timeouts_produce_distinct_pool_entries() {
        let client = A2aClient::new(PoolLimits::default(), RetryPolicy::default());
        let _short = client.client_for("https://crm.example", Duration::from_secs(1));
        let _long = client.client_for("https://crm.example", Duration::from_secs(30));
        assert_eq!(client.entries.len(), 2);
    }

    #[test]
    fn same_base_url_and_timeout_reuses_entry() {
        let client = A2aClient::new(PoolLimits::default(), RetryPolicy::default());
        let _a = client.client_for("https://crm.example", Duration::from_secs(5));
        let _b = client.client_for("https://crm.example", Duration::from_secs(5));
        assert_eq!(client.entries.len(), 1);
    }
}
