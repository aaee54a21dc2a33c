// src/exec/backend.rs

//! Pluggable task executor abstraction.
//!
//! Nodes never run their own functions; they hand a [`TaskJob`] to a
//! [`TaskExecutor`]. Production code spawns onto the tokio runtime
//! ([`SpawnExecutor`], [`super::BoundedExecutor`]); tests can provide an
//! executor that records submissions or refuses them.

use tokio::runtime::Handle;
use tracing::trace;

use crate::cancel::CancellationToken;
use crate::errors::ExecutorError;
use crate::types::TaskJob;

/// Runs jobs submitted by task nodes.
///
/// `execute` either accepts the job (and eventually polls it to completion or
/// drops it) or rejects it synchronously. The token is the one the node was
/// scheduled with; an executor may use it to skip jobs that were canceled
/// before they started.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, cancel: CancellationToken, job: TaskJob) -> Result<(), ExecutorError>;
}

/// Spawns every job as its own task on the current (or a given) tokio
/// runtime.
#[derive(Debug, Clone, Default)]
pub struct SpawnExecutor {
    handle: Option<Handle>,
}

impl SpawnExecutor {
    /// Spawn on whatever runtime is current at submission time.
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Always spawn on `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn runtime(&self) -> Result<Handle, ExecutorError> {
        match &self.handle {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| ExecutorError::NoRuntime),
        }
    }
}

impl TaskExecutor for SpawnExecutor {
    fn execute(&self, cancel: CancellationToken, job: TaskJob) -> Result<(), ExecutorError> {
        let runtime = self.runtime()?;
        runtime.spawn(async move {
            if cancel.is_cancelled() {
                trace!("job canceled before it started");
                return;
            }
            job.await;
        });
        Ok(())
    }
}
