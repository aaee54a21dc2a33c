// src/cancel.rs

//! Cancellation helpers on top of `tokio_util`'s [`CancellationToken`].

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

pub use tokio_util::sync::CancellationToken;

use crate::errors::ExecutorError;

/// A token nobody else holds, so it never fires unless the caller cancels it
/// explicitly.
pub fn uncancelable() -> CancellationToken {
    CancellationToken::new()
}

/// A token that is already canceled.
pub fn canceled() -> CancellationToken {
    let token = CancellationToken::new();
    token.cancel();
    token
}

/// Registration returned by [`on_cancel`].
#[derive(Debug)]
pub struct CancelListener {
    handle: Option<JoinHandle<()>>,
}

impl CancelListener {
    /// Drop the registration; the listener will not run if it has not yet.
    pub fn unregister(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Run `listener` once `token` is canceled.
///
/// If the token is already canceled the listener runs immediately on the
/// calling thread. Otherwise it waits on the current tokio runtime.
pub fn on_cancel<F>(token: &CancellationToken, listener: F) -> Result<CancelListener, ExecutorError>
where
    F: FnOnce() + Send + 'static,
{
    if token.is_cancelled() {
        listener();
        return Ok(CancelListener { handle: None });
    }

    let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
    let token = token.clone();
    let handle = runtime.spawn(async move {
        token.cancelled().await;
        trace!("cancellation listener firing");
        listener();
    });
    Ok(CancelListener {
        handle: Some(handle),
    })
}
