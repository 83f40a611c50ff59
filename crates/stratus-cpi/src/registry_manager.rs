//! Resilient wrapper around the settings registry

use std::sync::Arc;
use stratus_cloud::{CloudError, Result, RetryFailure, RetryPolicy, TaskCheckpoint, retry};
use stratus_registry::{AgentSettings, RegistryClient, RegistryError};

/// Retries registry calls over transport failures (3 tries, 2/4/8s backoff)
pub struct RegistryManager {
    client: Arc<dyn RegistryClient>,
    checkpoint: TaskCheckpoint,
    policy: RetryPolicy,
}

impl RegistryManager {
    pub fn new(client: Arc<dyn RegistryClient>, checkpoint: TaskCheckpoint) -> Self {
        Self {
            client,
            checkpoint,
            policy: RetryPolicy::registry(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub async fn read(&self, vm_id: &str) -> Result<AgentSettings> {
        tracing::debug!("Reading registry settings for vm `{}'...", vm_id);
        self.perform(|| self.client.read_settings(vm_id)).await
    }

    pub async fn update(&self, vm_id: &str, settings: &AgentSettings) -> Result<()> {
        tracing::debug!("Updating registry settings for vm `{}'...", vm_id);
        self.perform(|| self.client.update_settings(vm_id, settings))
            .await
    }

    pub async fn delete(&self, vm_id: &str) -> Result<()> {
        tracing::debug!("Deleting registry settings for vm `{}'...", vm_id);
        self.perform(|| self.client.delete_settings(vm_id)).await
    }

    async fn perform<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = stratus_registry::Result<T>>,
    {
        let outcome = retry(
            &self.policy,
            &self.checkpoint,
            RegistryError::is_transient,
            |_| call(),
        )
        .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(RetryFailure::Cancelled(err)) => Err(err),
            Err(RetryFailure::Fatal(err)) => Err(CloudError::Registry(err.to_string())),
            Err(RetryFailure::Exhausted { attempts, last, .. }) => {
                tracing::debug!("Registry call failed {} times, last error: {}", attempts, last);
                Err(CloudError::Timeout(
                    "Timed out waiting for registry".to_string(),
                ))
            }
        }
    }
}
