// src/config/model.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::engine::{RestrictableTaskGraphExecutorFactory, TaskGraphExecutorProperties};
use crate::exec::{BoundedExecutor, SpawnExecutor, TaskExecutor};
use crate::strategy::{
    EagerTaskExecutionRestrictionStrategy, TaskExecutionRestrictionStrategyFactory,
    WeakLeafsOfEndNodeRestrictingStrategy,
};

/// A task graph as read from a TOML file.
///
/// ```toml
/// [executor]
/// stop_on_failure = true
/// max_concurrency = 4
///
/// [task.build]
/// cmd = "cargo build"
///
/// [task.test]
/// cmd = "cargo test"
/// after = ["build"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    /// Keys are the task names.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

impl GraphFile {
    /// Tasks no other task lists in `after`.
    pub fn end_tasks(&self) -> Vec<String> {
        self.task
            .keys()
            .filter(|name| !self.task.values().any(|task| task.after.contains(name)))
            .cloned()
            .collect()
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    #[serde(default)]
    pub stop_on_failure: bool,

    #[serde(default)]
    pub deliver_result_on_failure: bool,

    /// Bound of the weak-leafs strategy; `0` runs every task as soon as its
    /// dependencies are done.
    #[serde(default)]
    pub max_retained_leaf_nodes: usize,

    /// Upper limit of concurrently running commands; `0` means unbounded.
    #[serde(default)]
    pub max_concurrency: usize,
}

impl ExecutorSection {
    pub fn apply(&self, properties: &mut TaskGraphExecutorProperties) {
        properties
            .set_stop_on_failure(self.stop_on_failure)
            .set_deliver_result_on_failure(self.deliver_result_on_failure);
    }

    pub fn strategy_factory(&self) -> Arc<dyn TaskExecutionRestrictionStrategyFactory> {
        match self.max_retained_leaf_nodes {
            0 => Arc::new(EagerTaskExecutionRestrictionStrategy),
            max => Arc::new(WeakLeafsOfEndNodeRestrictingStrategy::new(max)),
        }
    }

    pub fn task_executor(&self) -> Arc<dyn TaskExecutor> {
        match self.max_concurrency {
            0 => Arc::new(SpawnExecutor::new()),
            max => Arc::new(BoundedExecutor::new(max)),
        }
    }

    pub fn executor_factory(&self) -> RestrictableTaskGraphExecutorFactory {
        let mut factory = RestrictableTaskGraphExecutorFactory::new(self.strategy_factory());
        self.apply(factory.properties());
        factory
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Tasks that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}
