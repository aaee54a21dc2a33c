// src/graph/mod.rs

//! Graph primitives: a generic immutable [`DirectedGraph`] and the
//! [`DependencyDag`] wrapper the task graph is built on.

pub mod dag;
pub mod directed;

pub use dag::DependencyDag;
pub use directed::{ChildrenBuilder, DirectedGraph, DirectedGraphBuilder, GraphKey};
