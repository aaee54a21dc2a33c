// src/graph/directed.rs

//! Immutable directed graph over opaque keys.
//!
//! A graph maps each parent to the ordered set of its children. Keys without
//! children are not stored at all; asking for their children yields an empty
//! set. Child sets keep insertion order and suppress duplicates.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use crate::errors::CycleError;

/// Bounds every node key has to satisfy.
pub trait GraphKey: Eq + Hash + Clone + fmt::Debug {}

impl<T: Eq + Hash + Clone + fmt::Debug> GraphKey for T {}

#[derive(Clone)]
pub struct DirectedGraph<N> {
    children: IndexMap<N, IndexSet<N>>,
    no_children: IndexSet<N>,
}

impl<N: GraphKey> DirectedGraph<N> {
    pub fn builder() -> DirectedGraphBuilder<N> {
        DirectedGraphBuilder::new()
    }

    pub fn empty() -> Self {
        Self::from_raw(IndexMap::new())
    }

    fn from_raw(mut children: IndexMap<N, IndexSet<N>>) -> Self {
        children.retain(|_, set| !set.is_empty());
        Self {
            children,
            no_children: IndexSet::new(),
        }
    }

    pub fn has_children(&self, node: &N) -> bool {
        self.children.contains_key(node)
    }

    /// Children of `node`; empty for leafs and unknown keys.
    pub fn children(&self, node: &N) -> &IndexSet<N> {
        self.children.get(node).unwrap_or(&self.no_children)
    }

    /// Parent to children mapping. Only parents with at least one child are
    /// present.
    pub fn raw_graph(&self) -> &IndexMap<N, IndexSet<N>> {
        &self.children
    }

    /// Every key mentioned by the graph, parents first in insertion order.
    pub fn nodes(&self) -> IndexSet<N> {
        let mut nodes = IndexSet::with_capacity(self.children.len());
        for (parent, children) in &self.children {
            nodes.insert(parent.clone());
            nodes.extend(children.iter().cloned());
        }
        nodes
    }

    pub fn edge_count(&self) -> usize {
        self.children.values().map(IndexSet::len).sum()
    }

    /// Fails with the keys of the first cycle found.
    pub fn check_not_cyclic(&self) -> Result<(), CycleError<N>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            OnStack,
            Done,
        }

        let mut marks: HashMap<&N, Mark> = HashMap::with_capacity(self.children.len());
        // (node, index of the next child to visit)
        let mut stack: Vec<(&N, usize)> = Vec::new();

        for start in self.children.keys() {
            if marks.contains_key(start) {
                continue;
            }

            marks.insert(start, Mark::OnStack);
            stack.push((start, 0));

            while let Some((node, next)) = stack.last_mut() {
                let node: &N = *node;
                let children = self.children(node);

                let Some(child) = children.get_index(*next) else {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    continue;
                };
                *next += 1;

                match marks.get(child) {
                    Some(Mark::Done) => {}
                    Some(Mark::OnStack) => {
                        let from = stack
                            .iter()
                            .position(|(on_stack, _)| *on_stack == child)
                            .unwrap_or(0);
                        let mut cycle: Vec<N> =
                            stack[from..].iter().map(|(n, _)| (*n).clone()).collect();
                        cycle.push(child.clone());
                        return Err(CycleError { cycle });
                    }
                    None => {
                        marks.insert(child, Mark::OnStack);
                        stack.push((child, 0));
                    }
                }
            }
        }

        Ok(())
    }

    /// The given nodes without children in this graph, in the given order.
    pub fn end_nodes<'a, I>(&self, nodes: I) -> Vec<N>
    where
        I: IntoIterator<Item = &'a N>,
        N: 'a,
    {
        let mut end_nodes = Vec::new();
        self.for_end_nodes(nodes, |node| end_nodes.push(node.clone()));
        end_nodes
    }

    pub fn for_end_nodes<'a, I, F>(&self, nodes: I, mut action: F)
    where
        I: IntoIterator<Item = &'a N>,
        N: 'a,
        F: FnMut(&'a N),
    {
        for node in nodes {
            if !self.has_children(node) {
                action(node);
            }
        }
    }

    /// The same graph with every edge pointing the other way.
    pub fn reverse_graph(&self) -> Self {
        let mut reversed: IndexMap<N, IndexSet<N>> = IndexMap::new();
        for (parent, children) in &self.children {
            for child in children {
                reversed
                    .entry(child.clone())
                    .or_default()
                    .insert(parent.clone());
            }
        }
        Self::from_raw(reversed)
    }

    /// For each leaf reachable from `roots`, the requested roots it is
    /// reachable from, in the order the roots were given.
    pub fn all_leaf_to_root_nodes<'a, I>(&self, roots: I) -> IndexMap<N, IndexSet<N>>
    where
        I: IntoIterator<Item = &'a N>,
        N: 'a,
    {
        self.all_leaf_to_root_nodes_with(roots, IndexSet::new)
    }

    /// Like [`all_leaf_to_root_nodes`](Self::all_leaf_to_root_nodes), with every
    /// per-leaf set created by `new_set`.
    pub fn all_leaf_to_root_nodes_with<'a, I, S, F>(
        &self,
        roots: I,
        mut new_set: F,
    ) -> IndexMap<N, S>
    where
        I: IntoIterator<Item = &'a N>,
        N: 'a,
        S: Extend<N>,
        F: FnMut() -> S,
    {
        let mut result: IndexMap<N, S> = IndexMap::new();
        let mut seen_roots: IndexSet<&N> = IndexSet::new();

        for root in roots {
            if !seen_roots.insert(root) {
                continue;
            }

            let mut visited: IndexSet<&N> = IndexSet::new();
            let mut pending: Vec<&N> = vec![root];
            while let Some(node) = pending.pop() {
                if !visited.insert(node) {
                    continue;
                }

                let children = self.children(node);
                if children.is_empty() {
                    result
                        .entry(node.clone())
                        .or_insert_with(&mut new_set)
                        .extend(std::iter::once(root.clone()));
                } else {
                    pending.extend(children.iter().rev());
                }
            }
        }

        result
    }
}

impl<N: GraphKey> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<N: GraphKey> PartialEq for DirectedGraph<N> {
    fn eq(&self, other: &Self) -> bool {
        self.children == other.children
    }
}

impl<N: GraphKey> Eq for DirectedGraph<N> {}

impl<N: GraphKey> fmt::Debug for DirectedGraph<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.children.iter()).finish()
    }
}

/// Accumulates edges for a [`DirectedGraph`].
#[derive(Debug, Clone)]
pub struct DirectedGraphBuilder<N> {
    children: IndexMap<N, IndexSet<N>>,
}

impl<N: GraphKey> DirectedGraphBuilder<N> {
    pub fn new() -> Self {
        Self {
            children: IndexMap::new(),
        }
    }

    /// Declare `node` and return a builder for its children. Declaring the
    /// same node again keeps its existing children.
    pub fn add_node(&mut self, node: N) -> ChildrenBuilder<'_, N> {
        let existing = self.children.entry(node.clone()).or_default().len();
        ChildrenBuilder {
            graph: self,
            parent: node,
            children: existing,
        }
    }

    pub fn add_child(&mut self, parent: N, child: N) -> &mut Self {
        self.children.entry(parent).or_default().insert(child);
        self
    }

    pub fn add_children<I>(&mut self, parent: N, children: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
    {
        self.children.entry(parent).or_default().extend(children);
        self
    }

    pub fn build(self) -> DirectedGraph<N> {
        DirectedGraph::from_raw(self.children)
    }
}

impl<N: GraphKey> Default for DirectedGraphBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-branch view returned by [`DirectedGraphBuilder::add_node`].
pub struct ChildrenBuilder<'a, N: GraphKey> {
    graph: &'a mut DirectedGraphBuilder<N>,
    parent: N,
    children: usize,
}

impl<N: GraphKey> ChildrenBuilder<'_, N> {
    /// Add `child` under this branch's parent and descend into it.
    pub fn add_child(&mut self, child: N) -> ChildrenBuilder<'_, N> {
        self.add_leaf(child.clone());
        self.graph.add_node(child)
    }

    /// Add `child` under this branch's parent without descending.
    pub fn add_leaf(&mut self, child: N) -> &mut Self {
        if let Some(set) = self.graph.children.get_mut(&self.parent) {
            if set.insert(child) {
                self.children += 1;
            }
        }
        self
    }

    pub fn add_leafs<I>(&mut self, children: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
    {
        for child in children {
            self.add_leaf(child);
        }
        self
    }

    pub fn child_count(&self) -> usize {
        self.children
    }
}
