// src/strategy/mod.rs

//! Restriction strategies decide *when* an already built node may start.
//!
//! The graph executor hands every node to the strategy as a
//! [`RestrictableNode`]: the node's key plus a release callback. A node is
//! never scheduled before its callback ran. The strategy is told about
//! finished nodes through
//! [`TaskExecutionRestrictionStrategy::set_node_computed`], which may be
//! called concurrently with release callbacks.

pub mod eager;
pub mod weak_leafs;

use std::fmt;

use crate::graph::DependencyDag;
use crate::key::TaskNodeKey;

pub use eager::EagerTaskExecutionRestrictionStrategy;
pub use weak_leafs::WeakLeafsOfEndNodeRestrictingStrategy;

/// A node key with the one-shot permission to schedule that node.
pub struct RestrictableNode {
    key: TaskNodeKey,
    release: Box<dyn FnOnce() + Send>,
}

impl RestrictableNode {
    pub fn new(key: TaskNodeKey, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            key,
            release: Box::new(release),
        }
    }

    pub fn key(&self) -> &TaskNodeKey {
        &self.key
    }

    pub fn release(self) {
        (self.release)()
    }

    pub fn into_parts(self) -> (TaskNodeKey, Box<dyn FnOnce() + Send>) {
        (self.key, self.release)
    }
}

impl fmt::Debug for RestrictableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestrictableNode")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

pub trait TaskExecutionRestrictionStrategy: Send + Sync {
    /// `key` settled (with a value, canceled or failed).
    fn set_node_computed(&self, key: &TaskNodeKey);
}

/// Builds one strategy per graph execution.
pub trait TaskExecutionRestrictionStrategyFactory: Send + Sync {
    fn build_strategy(
        &self,
        graph: &DependencyDag<TaskNodeKey>,
        nodes: Vec<RestrictableNode>,
    ) -> Box<dyn TaskExecutionRestrictionStrategy>;
}
