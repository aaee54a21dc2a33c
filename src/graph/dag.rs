// src/graph/dag.rs

use std::fmt;

use crate::errors::CycleError;
use crate::graph::directed::{DirectedGraph, GraphKey};

/// A [`DirectedGraph`] whose edge `parent -> child` means "parent needs the
/// result of child".
#[derive(Clone)]
pub struct DependencyDag<N> {
    dependency_graph: DirectedGraph<N>,
}

impl<N: GraphKey> fmt::Debug for DependencyDag<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyDag")
            .field("dependency_graph", &self.dependency_graph)
            .finish()
    }
}

impl<N: GraphKey> DependencyDag<N> {
    /// Wrap `dependency_graph`, rejecting it if it has a cycle.
    pub fn new(dependency_graph: DirectedGraph<N>) -> Result<Self, CycleError<N>> {
        dependency_graph.check_not_cyclic()?;
        Ok(Self { dependency_graph })
    }

    /// Wrap `dependency_graph` without checking for cycles. The caller has to
    /// ensure it is acyclic.
    pub fn new_unchecked(dependency_graph: DirectedGraph<N>) -> Self {
        Self { dependency_graph }
    }

    pub fn dependency_graph(&self) -> &DirectedGraph<N> {
        &self.dependency_graph
    }

    /// Dependency -> dependents. Computed on every call.
    pub fn reverse_graph(&self) -> DirectedGraph<N> {
        self.dependency_graph.reverse_graph()
    }

    pub fn check_not_cyclic(&self) -> Result<(), CycleError<N>> {
        self.dependency_graph.check_not_cyclic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_cyclic_graph() {
        let mut builder = DirectedGraph::builder();
        builder.add_child("a", "b").add_child("b", "a");

        let err = DependencyDag::new(builder.build()).unwrap_err();
        assert!(err.cycle.contains(&"a"));
        assert!(err.cycle.contains(&"b"));
    }

    #[test]
    fn reverse_graph_lists_dependents() {
        let mut builder = DirectedGraph::builder();
        builder.add_children("app", ["lib", "util"]).add_child("lib", "util");
        let dag = DependencyDag::new(builder.build()).unwrap();

        let dependents: Vec<_> = dag.reverse_graph().children(&"util").iter().copied().collect();
        assert_eq!(dependents, vec!["app", "lib"]);
        assert!(dag.dependency_graph().has_children(&"app"));
    }
}
