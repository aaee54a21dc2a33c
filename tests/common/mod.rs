#![allow(dead_code)]

use taskgraph::builder::{CollectingTaskGraphBuilder, TaskFactoryConfig, TaskGraphBuilder};
use taskgraph::cancel;
use taskgraph::engine::{RestrictableTaskGraphExecutor, RestrictableTaskGraphExecutorFactory};
use taskgraph::errors::Result;
use taskgraph::TaskNodeKey;

pub type TestResult = anyhow::Result<()>;

/// Discover the graph reachable from `roots` with an eager executor factory.
pub async fn build_eager(
    configs: Vec<TaskFactoryConfig>,
    roots: &[TaskNodeKey],
) -> Result<RestrictableTaskGraphExecutor> {
    build_with(configs, roots, RestrictableTaskGraphExecutorFactory::eager()).await
}

pub async fn build_with(
    configs: Vec<TaskFactoryConfig>,
    roots: &[TaskNodeKey],
    executor_factory: RestrictableTaskGraphExecutorFactory,
) -> Result<RestrictableTaskGraphExecutor> {
    let mut builder = CollectingTaskGraphBuilder::new(configs, executor_factory);
    for root in roots {
        builder.add_node(root.clone());
    }
    builder.build_graph(cancel::uncancelable()).await
}

pub fn keys(keys: &indexmap::IndexSet<TaskNodeKey>) -> Vec<TaskNodeKey> {
    keys.iter().cloned().collect()
}
