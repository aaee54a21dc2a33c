// src/engine/result.rs

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{Result, TaskError, TaskGraphError};
use crate::key::TaskNodeKey;
use crate::node::{AnyTaskNode, TaskNode};

/// How a graph execution ended. A failure anywhere outranks cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResultType {
    Success,
    Errored,
    Canceled,
}

/// Outcome of [`crate::engine::TaskGraphExecutor::execute`].
#[derive(Debug)]
pub struct TaskGraphExecutionResult {
    result_type: ExecutionResultType,
    failed: Vec<TaskNodeKey>,
    requested: HashMap<TaskNodeKey, Arc<dyn AnyTaskNode>>,
}

impl TaskGraphExecutionResult {
    pub(crate) fn new(
        result_type: ExecutionResultType,
        failed: Vec<TaskNodeKey>,
        requested: HashMap<TaskNodeKey, Arc<dyn AnyTaskNode>>,
    ) -> Self {
        Self {
            result_type,
            failed,
            requested,
        }
    }

    pub fn result_type(&self) -> ExecutionResultType {
        self.result_type
    }

    pub fn is_success(&self) -> bool {
        self.result_type == ExecutionResultType::Success
    }

    /// Nodes whose own function failed, in the order they failed.
    pub fn failed_nodes(&self) -> &[TaskNodeKey] {
        &self.failed
    }

    /// Value of `key`, which must have been listed in
    /// [`result_node_keys`](crate::engine::TaskGraphExecutorProperties::result_node_keys).
    pub fn result<R>(&self, key: &TaskNodeKey) -> Result<R>
    where
        R: Clone + Send + Sync + 'static,
    {
        let node = self
            .requested
            .get(key)
            .ok_or_else(|| TaskGraphError::ResultNotRequested(key.clone()))?;

        let node = node.as_any().downcast_ref::<TaskNode<R>>().ok_or_else(|| {
            TaskError::TypeMismatch {
                key: key.clone(),
                expected: type_name::<R>(),
                actual: key.factory_key().output_type().name(),
            }
        })?;

        Ok(node.result()?)
    }
}
