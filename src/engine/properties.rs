// src/engine/properties.rs

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::key::TaskNodeKey;
use crate::node::{TaskErrorHandler, logging_error_handler};

/// Knobs of one graph execution.
#[derive(Clone)]
pub struct TaskGraphExecutorProperties {
    stop_on_failure: bool,
    deliver_result_on_failure: bool,
    result_node_keys: IndexSet<TaskNodeKey>,
    compute_error_handler: Arc<dyn TaskErrorHandler>,
}

impl TaskGraphExecutorProperties {
    /// Cancel the remaining nodes after the first failure.
    pub fn stop_on_failure(&self) -> bool {
        self.stop_on_failure
    }

    pub fn set_stop_on_failure(&mut self, value: bool) -> &mut Self {
        self.stop_on_failure = value;
        self
    }

    /// Return a result even if nodes failed or were canceled, instead of an
    /// error.
    pub fn deliver_result_on_failure(&self) -> bool {
        self.deliver_result_on_failure
    }

    pub fn set_deliver_result_on_failure(&mut self, value: bool) -> &mut Self {
        self.deliver_result_on_failure = value;
        self
    }

    /// Nodes whose values the execution result exposes.
    pub fn result_node_keys(&self) -> &IndexSet<TaskNodeKey> {
        &self.result_node_keys
    }

    pub fn add_result_node_key(&mut self, key: TaskNodeKey) -> &mut Self {
        self.result_node_keys.insert(key);
        self
    }

    pub fn add_result_node_keys(&mut self, keys: impl IntoIterator<Item = TaskNodeKey>) -> &mut Self {
        self.result_node_keys.extend(keys);
        self
    }

    /// Told about every node function that failed during the run.
    pub fn compute_error_handler(&self) -> &Arc<dyn TaskErrorHandler> {
        &self.compute_error_handler
    }

    pub fn set_compute_error_handler(&mut self, handler: Arc<dyn TaskErrorHandler>) -> &mut Self {
        self.compute_error_handler = handler;
        self
    }
}

impl Default for TaskGraphExecutorProperties {
    fn default() -> Self {
        Self {
            stop_on_failure: false,
            deliver_result_on_failure: false,
            result_node_keys: IndexSet::new(),
            compute_error_handler: logging_error_handler(),
        }
    }
}

impl fmt::Debug for TaskGraphExecutorProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraphExecutorProperties")
            .field("stop_on_failure", &self.stop_on_failure)
            .field("deliver_result_on_failure", &self.deliver_result_on_failure)
            .field("result_node_keys", &self.result_node_keys)
            .finish_non_exhaustive()
    }
}
