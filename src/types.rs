// src/types.rs

//! Small shared type aliases.

use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future; the shape every async trait method in the crate
/// returns.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of work handed to a [`crate::exec::TaskExecutor`].
pub type TaskJob = BoxFuture<'static, ()>;
