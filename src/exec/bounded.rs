// src/exec/bounded.rs

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::errors::ExecutorError;
use crate::exec::backend::TaskExecutor;
use crate::types::TaskJob;

/// Spawns jobs like [`super::SpawnExecutor`] but lets at most
/// `max_concurrency` of them run at the same time.
///
/// Jobs waiting for a slot are dropped if their token is canceled or the
/// executor is closed in the meantime.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl BoundedExecutor {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Reject further submissions and drop jobs still waiting for a slot.
    pub fn close(&self) {
        debug!("closing bounded executor");
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

impl TaskExecutor for BoundedExecutor {
    fn execute(&self, cancel: CancellationToken, job: TaskJob) -> Result<(), ExecutorError> {
        if self.permits.is_closed() {
            return Err(ExecutorError::Closed);
        }
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        let permits = Arc::clone(&self.permits);

        runtime.spawn(async move {
            let permit = tokio::select! {
                permit = permits.acquire_owned() => permit,
                _ = cancel.cancelled() => {
                    trace!("job canceled while waiting for a slot");
                    return;
                }
            };
            let Ok(_permit) = permit else {
                trace!("executor closed while job was waiting for a slot");
                return;
            };
            job.await;
        });
        Ok(())
    }
}
