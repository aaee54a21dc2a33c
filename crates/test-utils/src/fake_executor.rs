use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use taskgraph::CancellationToken;
use taskgraph::errors::ExecutorError;
use taskgraph::exec::{SpawnExecutor, TaskExecutor};
use taskgraph::types::TaskJob;

/// Spawns jobs like `SpawnExecutor` and counts submissions.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    submitted: Arc<AtomicUsize>,
    inner: SpawnExecutor,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for RecordingExecutor {
    fn execute(&self, cancel: CancellationToken, job: TaskJob) -> Result<(), ExecutorError> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(cancel, job)
    }
}

/// Refuses every job.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingExecutor;

impl TaskExecutor for RejectingExecutor {
    fn execute(&self, _cancel: CancellationToken, _job: TaskJob) -> Result<(), ExecutorError> {
        Err(ExecutorError::Closed)
    }
}

/// Accepts jobs but only runs them when told to.
#[derive(Clone, Default)]
pub struct HoldingExecutor {
    jobs: Arc<Mutex<Vec<TaskJob>>>,
}

impl HoldingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Run every held job to completion on the current task, in submission
    /// order.
    pub async fn run_all(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job.await;
        }
    }

    /// Drop every held job without running it.
    pub fn drop_all(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
        drop(jobs);
    }
}

impl TaskExecutor for HoldingExecutor {
    fn execute(&self, _cancel: CancellationToken, job: TaskJob) -> Result<(), ExecutorError> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Runs each job to completion inside `execute`, on the caller's stack.
///
/// Jobs must not wait on anything that is still pending; a job that is not
/// done after its first poll panics the test.
#[derive(Debug, Clone, Default)]
pub struct InlineExecutor {
    executed: Arc<AtomicUsize>,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for InlineExecutor {
    fn execute(&self, _cancel: CancellationToken, mut job: TaskJob) -> Result<(), ExecutorError> {
        let mut cx = Context::from_waker(Waker::noop());
        match job.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                self.executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Poll::Pending => panic!("inline job did not complete on its first poll"),
        }
    }
}
