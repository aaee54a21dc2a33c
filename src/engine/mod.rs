// src/engine/mod.rs

//! Graph execution.
//!
//! - [`executor`] runs a built graph under a restriction strategy and
//!   cascades failures to dependents.
//! - [`properties`] holds the per-execution knobs.
//! - [`result`] is what an execution hands back.

pub mod executor;
pub mod properties;
pub mod result;

pub use executor::{
    RestrictableTaskGraphExecutor, RestrictableTaskGraphExecutorFactory, TaskGraphExecutor,
};
pub use properties::TaskGraphExecutorProperties;
pub use result::{ExecutionResultType, TaskGraphExecutionResult};
