// src/node/task_node.rs

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::errors::TaskError;
use crate::exec::TaskExecutor;
use crate::key::TaskNodeKey;
use crate::node::function::{CancelableFunction, TaskErrorHandler};
use crate::node::future::{NodeFuture, NodeOutcome};
use crate::types::{BoxFuture, TaskJob};

/// What a node runs and where.
pub struct NodeTaskRef<R> {
    executor: Arc<dyn TaskExecutor>,
    function: CancelableFunction<R>,
}

impl<R> NodeTaskRef<R> {
    pub fn new(executor: Arc<dyn TaskExecutor>, function: CancelableFunction<R>) -> Self {
        Self { executor, function }
    }
}

/// One vertex of a task graph.
///
/// A node is scheduled at most once. Its [`NodeFuture`] settles exactly once:
/// with the function's value, with the function's error, or with whatever
/// [`cancel`](Self::cancel) / [`propagate_failure`](Self::propagate_failure)
/// forced on it first.
pub struct TaskNode<R> {
    key: TaskNodeKey,
    inputs: Vec<TaskNodeKey>,
    task_ref: Mutex<Option<NodeTaskRef<R>>>,
    scheduled: AtomicBool,
    future: Arc<NodeFuture<R>>,
}

impl<R> TaskNode<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new(key: TaskNodeKey, task_ref: NodeTaskRef<R>) -> Self {
        let future = Arc::new(NodeFuture::new(key.clone()));
        Self::with_future(key, Vec::new(), task_ref, future)
    }

    /// Create a node settling `future`, which may already be shared with
    /// the input references of dependents.
    pub fn with_future(
        key: TaskNodeKey,
        inputs: Vec<TaskNodeKey>,
        task_ref: NodeTaskRef<R>,
        future: Arc<NodeFuture<R>>,
    ) -> Self {
        Self {
            key,
            inputs,
            task_ref: Mutex::new(Some(task_ref)),
            scheduled: AtomicBool::new(false),
            future,
        }
    }

    pub fn key(&self) -> &TaskNodeKey {
        &self.key
    }

    /// Keys of the nodes this node declared as inputs.
    pub fn inputs(&self) -> &[TaskNodeKey] {
        &self.inputs
    }

    pub fn future(&self) -> &Arc<NodeFuture<R>> {
        &self.future
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    fn take_task_ref(&self) -> Option<NodeTaskRef<R>> {
        self.task_ref
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Submit the node's function to its executor unless that already
    /// happened.
    ///
    /// Only the first call does anything. If `cancel` is already canceled the
    /// node settles canceled without touching the executor. If the executor
    /// rejects the job, the rejection is reported to `error_handler`, the
    /// node settles failed and the error is returned.
    ///
    /// Errors of the function itself are reported to `error_handler` before
    /// the node settles.
    pub fn ensure_schedule_computed(
        &self,
        cancel: &CancellationToken,
        error_handler: Arc<dyn TaskErrorHandler>,
    ) -> Result<(), TaskError> {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let Some(NodeTaskRef { executor, function }) = self.take_task_ref() else {
            return Ok(());
        };

        if cancel.is_cancelled() {
            debug!(node = %self.key, "node canceled before it was scheduled");
            self.future.cancel();
            return Ok(());
        }

        let submit = Arc::new(Mutex::new(SubmitState::Submitting));
        let mut guard = SettleGuard {
            key: self.key.clone(),
            future: Arc::clone(&self.future),
            cancel: cancel.clone(),
            error_handler: Arc::clone(&error_handler),
            submit: Arc::clone(&submit),
            finished: false,
        };
        let task_cancel = cancel.clone();
        let job: TaskJob = Box::pin(async move {
            let outcome = function.call(task_cancel).await;
            guard.finish(outcome);
        });

        debug!(node = %self.key, "scheduling node");
        let submitted = executor.execute(cancel.clone(), job);

        let mut state = submit.lock().unwrap_or_else(PoisonError::into_inner);
        match submitted {
            Ok(()) => {
                let dropped = *state == SubmitState::DroppedWhileSubmitting;
                *state = SubmitState::Submitted;
                drop(state);
                if dropped {
                    settle_dropped(&self.key, &self.future, cancel, error_handler.as_ref());
                }
                Ok(())
            }
            Err(rejected) => {
                *state = SubmitState::Submitted;
                drop(state);
                let err = TaskError::Rejected(rejected);
                warn!(node = %self.key, error = %err, "executor rejected node");
                error_handler.on_error(&self.key, &err);
                self.future.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Settle canceled without running the function. The error handler is
    /// not notified.
    pub fn cancel(&self) {
        self.take_task_ref();
        if self.future.cancel() {
            debug!(node = %self.key, "node canceled");
        }
    }

    /// Like [`cancel`](Self::cancel), but only if the node was never
    /// scheduled. Returns whether it settled the node.
    pub fn cancel_unscheduled(&self) -> bool {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.take_task_ref();
        self.future.cancel()
    }

    /// Settle failed with `error` without running the function. The error
    /// handler is not notified.
    pub fn propagate_failure(&self, error: TaskError) {
        self.take_task_ref();
        if self.future.fail(error) {
            debug!(node = %self.key, "failure propagated to node");
        }
    }

    pub fn has_result(&self) -> bool {
        self.future.has_result()
    }

    /// The node's value; fails while pending and after cancellation or
    /// failure.
    pub fn result(&self) -> Result<R, TaskError> {
        self.future.result()
    }

    pub async fn wait(&self) -> Result<R, TaskError> {
        self.future.wait().await
    }
}

impl<R> fmt::Debug for TaskNode<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("key", &self.key)
            .field("scheduled", &self.is_scheduled())
            .field("outcome", &self.future.outcome())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitState {
    Submitting,
    DroppedWhileSubmitting,
    Submitted,
}

/// Lives inside the submitted job. If the job is dropped before the function
/// returns (executor skipped it, the runtime shut down, the function
/// panicked), the node is settled here so it never stays pending.
struct SettleGuard<R: Clone> {
    key: TaskNodeKey,
    future: Arc<NodeFuture<R>>,
    cancel: CancellationToken,
    error_handler: Arc<dyn TaskErrorHandler>,
    submit: Arc<Mutex<SubmitState>>,
    finished: bool,
}

impl<R: Clone> SettleGuard<R> {
    fn finish(&mut self, outcome: Result<R, TaskError>) {
        self.finished = true;
        match outcome {
            Ok(value) => {
                if self.future.complete(value) {
                    debug!(node = %self.key, "node completed");
                }
            }
            Err(err) => {
                self.error_handler.on_error(&self.key, &err);
                self.future.fail(err);
            }
        }
    }
}

impl<R: Clone> Drop for SettleGuard<R> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        {
            let mut state = self.submit.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == SubmitState::Submitting {
                // Either a rejection or an early drop; the submitter decides.
                *state = SubmitState::DroppedWhileSubmitting;
                return;
            }
        }
        settle_dropped(
            &self.key,
            &self.future,
            &self.cancel,
            self.error_handler.as_ref(),
        );
    }
}

fn settle_dropped<R: Clone>(
    key: &TaskNodeKey,
    future: &NodeFuture<R>,
    cancel: &CancellationToken,
    error_handler: &dyn TaskErrorHandler,
) {
    if future.is_done() {
        return;
    }
    if cancel.is_cancelled() {
        future.cancel();
        return;
    }
    let err = TaskError::Abandoned(key.clone());
    warn!(node = %key, "node task was dropped before completing");
    error_handler.on_error(key, &err);
    future.fail(err);
}

/// Type-erased view of a [`TaskNode`], used where nodes of different output
/// types are handled together.
pub trait AnyTaskNode: Send + Sync {
    fn key(&self) -> &TaskNodeKey;

    fn inputs(&self) -> &[TaskNodeKey];

    fn ensure_schedule_computed(
        &self,
        cancel: &CancellationToken,
        error_handler: Arc<dyn TaskErrorHandler>,
    ) -> Result<(), TaskError>;

    fn cancel(&self);

    fn cancel_unscheduled(&self) -> bool;

    fn propagate_failure(&self, error: TaskError);

    fn has_result(&self) -> bool;

    fn outcome(&self) -> NodeOutcome;

    /// Error the node settled with, if it settled without a value.
    fn error(&self) -> Option<TaskError>;

    fn on_settled(&self, listener: Box<dyn FnOnce() + Send>);

    fn wait_settled(&self) -> BoxFuture<'_, ()>;

    fn as_any(&self) -> &dyn Any;
}

impl<R> AnyTaskNode for TaskNode<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn key(&self) -> &TaskNodeKey {
        &self.key
    }

    fn inputs(&self) -> &[TaskNodeKey] {
        &self.inputs
    }

    fn ensure_schedule_computed(
        &self,
        cancel: &CancellationToken,
        error_handler: Arc<dyn TaskErrorHandler>,
    ) -> Result<(), TaskError> {
        TaskNode::ensure_schedule_computed(self, cancel, error_handler)
    }

    fn cancel(&self) {
        TaskNode::cancel(self)
    }

    fn cancel_unscheduled(&self) -> bool {
        TaskNode::cancel_unscheduled(self)
    }

    fn propagate_failure(&self, error: TaskError) {
        TaskNode::propagate_failure(self, error)
    }

    fn has_result(&self) -> bool {
        self.future.has_result()
    }

    fn outcome(&self) -> NodeOutcome {
        self.future.outcome()
    }

    fn error(&self) -> Option<TaskError> {
        self.future.error()
    }

    fn on_settled(&self, listener: Box<dyn FnOnce() + Send>) {
        self.future.on_settled(listener)
    }

    fn wait_settled(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.future.wait().await;
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for dyn AnyTaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyTaskNode")
            .field("key", self.key())
            .field("outcome", &self.outcome())
            .finish()
    }
}
