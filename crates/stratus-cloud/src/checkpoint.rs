//! Task cancellation hook

use crate::error::Result;
use std::sync::Arc;

type CheckFn = dyn Fn() -> Result<()> + Send + Sync;

/// Callback invoked before every wait or retry attempt.
///
/// The orchestrator that invokes the CPI supplies it; returning an error
/// aborts the surrounding loop before the next provider call is made.
#[derive(Clone, Default)]
pub struct TaskCheckpoint {
    check: Option<Arc<CheckFn>>,
}

impl TaskCheckpoint {
    /// A checkpoint that never cancels
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(check: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            check: Some(Arc::new(check)),
        }
    }

    pub fn check(&self) -> Result<()> {
        match &self.check {
            Some(check) => check(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for TaskCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCheckpoint")
            .field("installed", &self.check.is_some())
            .finish()
    }
}
