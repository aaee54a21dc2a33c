// src/node/future.rs

//! Exactly-once settled result holder of a task node.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::errors::TaskError;
use crate::key::TaskNodeKey;

type SettleListener = Box<dyn FnOnce() + Send>;

enum NodeState<R> {
    Pending,
    Value(R),
    Canceled,
    Failed(TaskError),
}

/// Terminal state of a [`NodeFuture`], without the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Pending,
    Completed,
    Canceled,
    Failed,
}

struct Inner<R> {
    state: NodeState<R>,
    listeners: Vec<SettleListener>,
}

/// Holds the outcome of one node.
///
/// The first call to [`complete`](Self::complete), [`cancel`](Self::cancel) or
/// [`fail`](Self::fail) wins; later ones return `false` and change nothing.
pub struct NodeFuture<R> {
    key: TaskNodeKey,
    inner: Mutex<Inner<R>>,
    settled: Notify,
}

impl<R: Clone> NodeFuture<R> {
    pub fn new(key: TaskNodeKey) -> Self {
        Self {
            key,
            inner: Mutex::new(Inner {
                state: NodeState::Pending,
                listeners: Vec::new(),
            }),
            settled: Notify::new(),
        }
    }

    pub fn key(&self) -> &TaskNodeKey {
        &self.key
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, state: NodeState<R>) -> bool {
        let listeners = {
            let mut inner = self.lock();
            if !matches!(inner.state, NodeState::Pending) {
                return false;
            }
            inner.state = state;
            std::mem::take(&mut inner.listeners)
        };

        self.settled.notify_waiters();
        for listener in listeners {
            listener();
        }
        true
    }

    pub fn complete(&self, value: R) -> bool {
        self.settle(NodeState::Value(value))
    }

    pub fn cancel(&self) -> bool {
        self.settle(NodeState::Canceled)
    }

    /// Settle failed; a [`TaskError::Canceled`] settles canceled instead.
    pub fn fail(&self, error: TaskError) -> bool {
        if error.is_canceled() {
            self.cancel()
        } else {
            self.settle(NodeState::Failed(error))
        }
    }

    pub fn outcome(&self) -> NodeOutcome {
        match self.lock().state {
            NodeState::Pending => NodeOutcome::Pending,
            NodeState::Value(_) => NodeOutcome::Completed,
            NodeState::Canceled => NodeOutcome::Canceled,
            NodeState::Failed(_) => NodeOutcome::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome() != NodeOutcome::Pending
    }

    pub fn has_result(&self) -> bool {
        self.outcome() == NodeOutcome::Completed
    }

    /// The error this future settled with, if it settled without a value.
    pub fn error(&self) -> Option<TaskError> {
        match &self.lock().state {
            NodeState::Canceled => Some(TaskError::Canceled),
            NodeState::Failed(err) => Some(err.clone()),
            NodeState::Pending | NodeState::Value(_) => None,
        }
    }

    /// The settled result, or [`TaskError::NotReady`] while pending.
    pub fn result(&self) -> Result<R, TaskError> {
        match &self.lock().state {
            NodeState::Pending => Err(TaskError::NotReady(self.key.clone())),
            NodeState::Value(value) => Ok(value.clone()),
            NodeState::Canceled => Err(TaskError::Canceled),
            NodeState::Failed(err) => Err(err.clone()),
        }
    }

    /// Wait until the future settles and return its result.
    pub async fn wait(&self) -> Result<R, TaskError> {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.result() {
                Err(TaskError::NotReady(_)) => notified.await,
                settled => return settled,
            }
        }
    }

    /// Run `listener` once this future settles; immediately if it already
    /// has.
    pub fn on_settled(&self, listener: impl FnOnce() + Send + 'static) {
        {
            let mut inner = self.lock();
            if matches!(inner.state, NodeState::Pending) {
                inner.listeners.push(Box::new(listener));
                return;
            }
        }
        listener();
    }
}

impl<R: Clone> fmt::Debug for NodeFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFuture")
            .field("key", &self.key)
            .field("outcome", &self.outcome())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TaskFactoryKey;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn future() -> NodeFuture<u32> {
        NodeFuture::new(TaskFactoryKey::of::<u32, ()>().node_key("n"))
    }

    #[test]
    fn first_settlement_wins() {
        let f = future();
        assert!(f.complete(1));
        assert!(!f.cancel());
        assert!(!f.fail(TaskError::failed(anyhow::anyhow!("late"))));
        assert!(!f.complete(2));
        assert_eq!(f.result().unwrap(), 1);
    }

    #[test]
    fn pending_result_names_the_key() {
        let f = future();
        match f.result() {
            Err(TaskError::NotReady(key)) => assert_eq!(&key, f.key()),
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[test]
    fn canceled_error_settles_canceled() {
        let f = future();
        f.fail(TaskError::Canceled);
        assert_eq!(f.outcome(), NodeOutcome::Canceled);
        assert!(matches!(f.result(), Err(TaskError::Canceled)));
    }

    #[test]
    fn listeners_run_once_on_settle_and_immediately_afterwards() {
        let f = future();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        f.on_settled(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        f.cancel();
        f.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let c = Arc::clone(&calls);
        f.on_settled(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn wait_returns_after_settlement_from_another_task() {
        let f = Arc::new(future());
        let waiter = {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.wait().await })
        };

        tokio::task::yield_now().await;
        f.complete(7);
        assert_eq!(waiter.await.unwrap().unwrap(), 7);
    }
}
