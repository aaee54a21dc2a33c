// src/node/function.rs

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error};

use crate::cancel::CancellationToken;
use crate::errors::TaskError;
use crate::key::TaskNodeKey;
use crate::types::BoxFuture;

type BoxedFunction<R> =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<R, TaskError>> + Send>;

/// The computation of a node: called at most once with the token the node
/// was scheduled with. Returning `Err(TaskError::Canceled)` signals
/// cancellation.
pub struct CancelableFunction<R> {
    function: BoxedFunction<R>,
}

impl<R: Send + 'static> CancelableFunction<R> {
    pub fn new<F, Fut>(function: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        Self {
            function: Box::new(move |cancel| Box::pin(function(cancel))),
        }
    }

    /// A function that immediately returns `value`.
    pub fn ready(value: R) -> Self {
        Self::new(move |_| async move { Ok(value) })
    }

    pub fn call(self, cancel: CancellationToken) -> BoxFuture<'static, Result<R, TaskError>> {
        (self.function)(cancel)
    }
}

impl<R> fmt::Debug for CancelableFunction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelableFunction")
    }
}

/// Notified when a node fails on its own (not when a failure is forced on it).
pub trait TaskErrorHandler: Send + Sync {
    fn on_error(&self, key: &TaskNodeKey, error: &TaskError);
}

impl<F> TaskErrorHandler for F
where
    F: Fn(&TaskNodeKey, &TaskError) + Send + Sync,
{
    fn on_error(&self, key: &TaskNodeKey, error: &TaskError) {
        self(key, error)
    }
}

/// Default handler: failures are logged at error, cancellations at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorHandler;

impl TaskErrorHandler for LoggingErrorHandler {
    fn on_error(&self, key: &TaskNodeKey, err: &TaskError) {
        if err.is_canceled() {
            debug!(node = %key, "node canceled");
        } else {
            error!(node = %key, error = %err, "node failed");
        }
    }
}

pub fn logging_error_handler() -> Arc<dyn TaskErrorHandler> {
    Arc::new(LoggingErrorHandler)
}
