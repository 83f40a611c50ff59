//! Resource wait loop (exponential jittered backoff)
//!
//! Blocks until a provider resource or operation reports ready, fails, or the
//! retry budget runs out. Every manager that creates, mutates or deletes a
//! resource funnels through [`ResourceWaiter::wait_for`].

use crate::api::ComputeApi;
use crate::checkpoint::TaskCheckpoint;
use crate::error::{CloudError, Result};
use crate::resource::CloudResource;
use crate::retry::{RetryFailure, RetryPolicy, retry};

#[derive(Debug, Clone, Default)]
pub struct ResourceWaiter {
    checkpoint: TaskCheckpoint,
    policy: RetryPolicy,
}

impl ResourceWaiter {
    pub fn new(checkpoint: TaskCheckpoint) -> Self {
        Self {
            checkpoint,
            policy: RetryPolicy::resource_wait(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn checkpoint(&self) -> &TaskCheckpoint {
        &self.checkpoint
    }

    /// Wait for `resource` to become ready using the default policy and
    /// return its freshly reloaded state.
    pub async fn wait_for<R: CloudResource>(&self, api: &dyn ComputeApi, resource: &R) -> Result<R> {
        self.wait_for_with(api, resource, &self.policy).await
    }

    pub async fn wait_for_with<R: CloudResource>(
        &self,
        api: &dyn ComputeApi,
        resource: &R,
        policy: &RetryPolicy,
    ) -> Result<R> {
        let description = resource.describe();

        let outcome = retry(
            policy,
            &self.checkpoint,
            |err: &CloudError| matches!(err, CloudError::NotReady(_)),
            |_| poll(api, resource, &description),
        )
        .await;

        match outcome {
            Ok(ready) => {
                tracing::debug!("{} is now ready", description);
                Ok(ready)
            }
            Err(RetryFailure::Cancelled(err)) | Err(RetryFailure::Fatal(err)) => Err(err),
            Err(RetryFailure::Exhausted { elapsed, .. }) => Err(CloudError::Timeout(format!(
                "Timed out waiting for {} to be ready, took {:.1}s",
                description,
                elapsed.as_secs_f64()
            ))),
        }
    }
}

async fn poll<R: CloudResource>(api: &dyn ComputeApi, resource: &R, description: &str) -> Result<R> {
    let current = resource
        .reload(api)
        .await
        .map_err(|e| CloudError::ResourceError {
            description: description.to_string(),
            message: e.to_string(),
        })?
        .ok_or_else(|| CloudError::ResourceNotFound(description.to_string()))?;

    if let Some(message) = current.failure() {
        return Err(CloudError::ResourceError {
            description: description.to_string(),
            message,
        });
    }

    if current.is_ready() {
        Ok(current)
    } else {
        tracing::debug!(
            "Waiting for {} to be ready, status is `{}'",
            description,
            current.status()
        );
        Err(CloudError::NotReady(description.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{self, FakeCompute};
    use crate::params::{DiskParams, DiskSource};
    use crate::resource::Status;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn disk_params() -> DiskParams {
        DiskParams {
            name: "disk-1".to_string(),
            zone: "z1".to_string(),
            description: "test".to_string(),
            source: DiskSource::Blank { size_gb: 1 },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_ready() {
        let api = FakeCompute::new().settle_after(3);
        let disk = api.insert_disk(&disk_params()).await.unwrap();
        assert_eq!(disk.status, Status::Creating);

        let ready = ResourceWaiter::default().wait_for(&api, &disk).await.unwrap();
        assert_eq!(ready.status, Status::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let api = FakeCompute::new().settle_after(u32::MAX);
        let disk = api.insert_disk(&disk_params()).await.unwrap();

        let waiter = ResourceWaiter::default()
            .with_policy(RetryPolicy::resource_wait().with_max_attempts(4));
        let err = waiter.wait_for(&api, &disk).await.unwrap_err();

        assert!(matches!(err, CloudError::Timeout(_)));
        assert!(err.to_string().contains("Timed out waiting for disk `disk-1'"));
    }

    #[tokio::test]
    async fn test_wait_fails_when_resource_disappears() {
        let api = FakeCompute::new();
        let ghost = fake::disk("ghost", "z1");

        let err = ResourceWaiter::default().wait_for(&api, &ghost).await.unwrap_err();
        assert!(matches!(err, CloudError::ResourceNotFound(_)));
        assert_eq!(err.to_string(), "disk `ghost' not found");
    }

    #[tokio::test]
    async fn test_wait_wraps_provider_errors() {
        let api = FakeCompute::new();
        let disk = api.insert_disk(&disk_params()).await.unwrap();
        api.fail_next("get_disk", "backend unavailable");

        let err = ResourceWaiter::default().wait_for(&api, &disk).await.unwrap_err();
        match err {
            CloudError::ResourceError {
                description,
                message,
            } => {
                assert_eq!(description, "disk `disk-1'");
                assert!(message.contains("backend unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_fails_on_terminal_status() {
        let api = FakeCompute::new();
        let mut broken = fake::disk("broken", "z1");
        broken.status = Status::Failed;
        api.add_disk(broken.clone());

        let err = ResourceWaiter::default().wait_for(&api, &broken).await.unwrap_err();
        assert!(matches!(err, CloudError::ResourceError { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_runs_before_every_poll() {
        let api = FakeCompute::new().settle_after(2);
        let disk = api.insert_disk(&disk_params()).await.unwrap();

        let checks = Arc::new(AtomicU32::new(0));
        let counter = checks.clone();
        let waiter = ResourceWaiter::new(TaskCheckpoint::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        waiter.wait_for(&api, &disk).await.unwrap();
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_skips_provider_call() {
        let api = FakeCompute::new();
        let disk = api.insert_disk(&disk_params()).await.unwrap();
        let reloads_before = api.call_count("get_disk");

        let waiter = ResourceWaiter::new(TaskCheckpoint::new(|| {
            Err(CloudError::Cancelled("task cancelled".into()))
        }));
        let err = waiter.wait_for(&api, &disk).await.unwrap_err();

        assert!(matches!(err, CloudError::Cancelled(_)));
        assert_eq!(api.call_count("get_disk"), reloads_before);
    }
}
