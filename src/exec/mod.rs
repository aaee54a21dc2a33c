// src/exec/mod.rs

//! Where node functions run.
//!
//! - [`backend`] provides the [`TaskExecutor`] trait and [`SpawnExecutor`],
//!   which tests can replace with a fake implementation.
//! - [`bounded`] limits how many jobs run at the same time.
//! - [`command`] runs shell commands as graph nodes for the command-line
//!   front end.

pub mod backend;
pub mod bounded;
pub mod command;

pub use backend::{SpawnExecutor, TaskExecutor};
pub use bounded::BoundedExecutor;
pub use command::{CommandOutput, CommandTaskFactory, command_factory_key, command_node_key, run_command};
