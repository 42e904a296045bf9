//! Tuning backend - the boundary where actions touch the OS.
//!
//! How a recommended action actually changes the operating system
//! (process priorities, service state, driver calls) belongs to a
//! collaborator. The core only sees [`TuningBackend::apply_change`] with
//! a success/failure result. [`LoggingBackend`] is the in-tree
//! production implementation: it records intent and reports success.
//! [`FakeTuningBackend`] scripts failures and counts calls for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use attune_common::{ActionParams, AgentError, WorkloadDomain};

/// Receipt for one applied change.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub domain: WorkloadDomain,
    pub action: String,
    pub detail: String,
}

/// Capability for applying a named tuning action.
#[async_trait]
pub trait TuningBackend: Send + Sync {
    async fn apply_change(
        &self,
        domain: WorkloadDomain,
        action: &str,
        params: &ActionParams,
    ) -> Result<AppliedChange, AgentError>;
}

/// Backend that records intent without touching the system.
pub struct LoggingBackend;

impl LoggingBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TuningBackend for LoggingBackend {
    async fn apply_change(
        &self,
        domain: WorkloadDomain,
        action: &str,
        _params: &ActionParams,
    ) -> Result<AppliedChange, AgentError> {
        info!("[{}] applying {}", domain, action);
        Ok(AppliedChange {
            domain,
            action: action.to_string(),
            detail: format!("{} applied for {}", action, domain),
        })
    }
}

/// Deterministic backend for tests: named actions can be scripted to
/// fail, and every call is counted.
pub struct FakeTuningBackend {
    failing_actions: HashSet<String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeTuningBackend {
    pub fn new() -> Self {
        Self {
            failing_actions: HashSet::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Script an action name to return a backend fault.
    pub fn failing_on(mut self, action: &str) -> Self {
        self.failing_actions.insert(action.to_string());
        self
    }

    pub async fn call_count(&self, action: &str) -> usize {
        self.calls.lock().await.get(action).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.calls.lock().await.values().sum()
    }
}

impl Default for FakeTuningBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TuningBackend for FakeTuningBackend {
    async fn apply_change(
        &self,
        domain: WorkloadDomain,
        action: &str,
        _params: &ActionParams,
    ) -> Result<AppliedChange, AgentError> {
        {
            let mut calls = self.calls.lock().await;
            *calls.entry(action.to_string()).or_insert(0) += 1;
        }
        if self.failing_actions.contains(action) {
            return Err(AgentError::Backend(format!(
                "scripted failure for {}",
                action
            )));
        }
        Ok(AppliedChange {
            domain,
            action: action.to_string(),
            detail: format!("fake:{}", action),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_backend_reports_success() {
        let backend = LoggingBackend::new();
        let change = backend
            .apply_change(WorkloadDomain::Gaming, "disableVSync", &serde_json::Value::Null)
            .await
            .unwrap();
        assert_eq!(change.action, "disableVSync");
    }

    #[tokio::test]
    async fn test_fake_backend_counts_and_fails() {
        let backend = FakeTuningBackend::new().failing_on("badAction");

        assert!(backend
            .apply_change(WorkloadDomain::Gaming, "goodAction", &serde_json::Value::Null)
            .await
            .is_ok());
        assert!(backend
            .apply_change(WorkloadDomain::Gaming, "badAction", &serde_json::Value::Null)
            .await
            .is_err());

        assert_eq!(backend.call_count("goodAction").await, 1);
        assert_eq!(backend.call_count("badAction").await, 1);
        assert_eq!(backend.total_calls().await, 2);
    }
}
