// src/node/mod.rs

//! Task nodes and their lifecycle.
//!
//! - [`future`] holds the exactly-once settled result of a node.
//! - [`function`] defines what a node runs and who hears about its errors.
//! - [`task_node`] ties both to an executor with a schedule-once guard.

pub mod function;
pub mod future;
pub mod task_node;

pub use function::{CancelableFunction, LoggingErrorHandler, TaskErrorHandler, logging_error_handler};
pub use future::{NodeFuture, NodeOutcome};
pub use task_node::{AnyTaskNode, NodeTaskRef, TaskNode};
