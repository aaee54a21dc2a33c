// src/errors.rs

//! Crate-wide error types.
//!
//! - [`TaskError`] is what a single node (or anything acting on behalf of a
//!   node) fails with. It is `Clone` so a settled node can hand the same error
//!   to every dependent that consumes it.
//! - [`TaskGraphError`] is what building or executing a whole graph fails
//!   with.
//! - [`ConfigError`] covers the TOML front end.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::key::{TaskFactoryKey, TaskNodeKey};

#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    #[error("no tokio runtime is available to run the task")]
    NoRuntime,

    #[error("executor has been shut down")]
    Closed,
}

#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("operation was canceled")]
    Canceled,

    #[error("result of {0} was requested before the node settled")]
    NotReady(TaskNodeKey),

    #[error("{key} produces `{actual}`, but an input of type `{expected}` was requested")]
    TypeMismatch {
        key: TaskNodeKey,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("factory argument of {key} is not of type `{expected}`")]
    ArgumentMismatch {
        key: TaskNodeKey,
        expected: &'static str,
    },

    #[error("executor rejected the task: {0}")]
    Rejected(#[from] ExecutorError),

    #[error("task of {0} was dropped by its executor before completing")]
    Abandoned(TaskNodeKey),

    #[error("{0:#}")]
    Failed(Arc<anyhow::Error>),
}

impl TaskError {
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        TaskError::Failed(Arc::new(err.into()))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Failed(Arc::new(err))
    }
}

/// Returned by cycle checks; `cycle` lists the keys on the detected cycle in
/// traversal order, with the first key repeated at the end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("the graph is cyclic: {}", render_path(.cycle))]
pub struct CycleError<N: fmt::Debug> {
    pub cycle: Vec<N>,
}

fn render_path<N: fmt::Debug>(path: &[N]) -> String {
    path.iter()
        .map(|node| format!("{node:?}"))
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Error, Debug)]
pub enum TaskGraphError {
    #[error(transparent)]
    Cycle(#[from] CycleError<TaskNodeKey>),

    #[error("no factory is registered for {factory} (required by {key})")]
    UnknownFactory {
        key: TaskNodeKey,
        factory: TaskFactoryKey,
    },

    #[error("setting up the factory for {key} failed: {source}")]
    FactorySetup { key: TaskNodeKey, source: TaskError },

    #[error("creating node {key} failed: {source}")]
    NodeCreation { key: TaskNodeKey, source: TaskError },

    #[error("building the task graph was canceled")]
    BuildCanceled,

    #[error("executing the task graph was canceled")]
    ExecutionCanceled,

    #[error("executing the task graph failed; failed nodes: {failed:?}")]
    ExecutionFailed { failed: Vec<TaskNodeKey> },

    #[error("{0} was not requested as a result node")]
    ResultNotRequested(TaskNodeKey),

    #[error(transparent)]
    Task(#[from] TaskError),
}

pub type Result<T> = std::result::Result<T, TaskGraphError>;

/// Errors raised while loading a graph file for the command-line front end.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}
