// src/strategy/eager.rs

use tracing::trace;

use crate::graph::DependencyDag;
use crate::key::TaskNodeKey;
use crate::strategy::{
    RestrictableNode, TaskExecutionRestrictionStrategy, TaskExecutionRestrictionStrategyFactory,
};

/// Releases every node as soon as the strategy is built.
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerTaskExecutionRestrictionStrategy;

impl TaskExecutionRestrictionStrategyFactory for EagerTaskExecutionRestrictionStrategy {
    fn build_strategy(
        &self,
        _graph: &DependencyDag<TaskNodeKey>,
        nodes: Vec<RestrictableNode>,
    ) -> Box<dyn TaskExecutionRestrictionStrategy> {
        trace!(nodes = nodes.len(), "releasing all nodes");
        nodes.into_iter().for_each(RestrictableNode::release);
        Box::new(EagerTaskExecutionRestrictionStrategy)
    }
}

impl TaskExecutionRestrictionStrategy for EagerTaskExecutionRestrictionStrategy {
    fn set_node_computed(&self, _key: &TaskNodeKey) {}
}
