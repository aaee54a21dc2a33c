// src/strategy/weak_leafs.rs

//! Bounded strategy: limits how many leaf nodes (nodes without dependencies)
//! are released ahead of the end nodes (nodes nobody depends on) that need
//! them.
//!
//! Nodes with dependencies are released immediately; they cannot start
//! before their leafs finished anyway. Leafs are released end node by end
//! node, while fewer than `max_retained_leaf_nodes` released leafs are still
//! waiting for an unfinished end node. At least one end node is always in
//! flight, so the graph cannot stall on a small bound.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::graph::{DependencyDag, DirectedGraph};
use crate::key::TaskNodeKey;
use crate::strategy::{
    RestrictableNode, TaskExecutionRestrictionStrategy, TaskExecutionRestrictionStrategyFactory,
};

type Release = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy)]
pub struct WeakLeafsOfEndNodeRestrictingStrategy {
    max_retained_leaf_nodes: usize,
}

impl WeakLeafsOfEndNodeRestrictingStrategy {
    /// `max_retained_leaf_nodes` is clamped to at least 1.
    pub fn new(max_retained_leaf_nodes: usize) -> Self {
        Self {
            max_retained_leaf_nodes: max_retained_leaf_nodes.max(1),
        }
    }

    pub fn max_retained_leaf_nodes(&self) -> usize {
        self.max_retained_leaf_nodes
    }
}

impl TaskExecutionRestrictionStrategyFactory for WeakLeafsOfEndNodeRestrictingStrategy {
    fn build_strategy(
        &self,
        graph: &DependencyDag<TaskNodeKey>,
        nodes: Vec<RestrictableNode>,
    ) -> Box<dyn TaskExecutionRestrictionStrategy> {
        let dependency_graph = graph.dependency_graph();
        let forward_graph = graph.reverse_graph();

        let mut leaf_nodes: HashMap<TaskNodeKey, Release> = HashMap::new();
        let mut leaf_order: IndexSet<TaskNodeKey> = IndexSet::new();
        let mut keys: Vec<TaskNodeKey> = Vec::with_capacity(nodes.len());

        for node in nodes {
            let (key, release) = node.into_parts();
            keys.push(key.clone());
            if dependency_graph.has_children(&key) {
                release();
            } else {
                leaf_order.insert(key.clone());
                leaf_nodes.insert(key, release);
            }
        }

        // Nodes nothing depends on, including ones missing from `nodes`.
        let mut end_nodes: IndexSet<TaskNodeKey> =
            forward_graph.end_nodes(&keys).into_iter().collect();
        forward_graph.for_end_nodes(dependency_graph.raw_graph().keys(), |key| {
            end_nodes.insert(key.clone());
        });

        let sorted_leafs = sort_leafs(dependency_graph, &end_nodes, &leaf_order);
        let end_nodes_to_leafs = forward_graph.all_leaf_to_root_nodes(sorted_leafs.iter());
        let leafs_to_end_nodes = dependency_graph.all_leaf_to_root_nodes(end_nodes.iter());

        debug!(
            leafs = leaf_nodes.len(),
            end_nodes = end_nodes.len(),
            max_retained_leaf_nodes = self.max_retained_leaf_nodes,
            "building weak-leafs restriction strategy"
        );

        let end_node_queue = end_nodes_to_leafs.keys().cloned().collect();
        let mut state = StrategyState {
            max_retained_leaf_nodes: self.max_retained_leaf_nodes,
            leaf_nodes,
            end_nodes_to_leafs,
            leafs_to_end_nodes,
            end_node_queue,
            computed_end_nodes: HashSet::new(),
            released_not_computed_end_nodes: HashSet::new(),
            retaining_not_computed_end_nodes: IndexSet::new(),
            scheduled_leaf_nodes: HashMap::new(),
        };

        let mut releases = Vec::new();
        state.schedule(&mut releases);
        releases.into_iter().for_each(|release| release());

        Box::new(WeakLeafsStrategy {
            state: Mutex::new(state),
        })
    }
}

/// Leafs in the order a depth-first walk from the end nodes reaches them.
fn sort_leafs(
    dependency_graph: &DirectedGraph<TaskNodeKey>,
    end_nodes: &IndexSet<TaskNodeKey>,
    leafs: &IndexSet<TaskNodeKey>,
) -> Vec<TaskNodeKey> {
    let mut sorted = IndexSet::with_capacity(leafs.len());
    let mut visited: HashSet<&TaskNodeKey> = HashSet::new();
    for end_node in end_nodes {
        let mut pending = vec![end_node];
        while let Some(node) = pending.pop() {
            if !visited.insert(node) {
                continue;
            }
            if leafs.contains(node) {
                sorted.insert(node.clone());
            }
            pending.extend(dependency_graph.children(node).iter().rev());
        }
    }
    // Leafs not reachable from any end node keep their original order.
    sorted.extend(leafs.iter().cloned());
    sorted.into_iter().collect()
}

struct StrategyState {
    max_retained_leaf_nodes: usize,
    leaf_nodes: HashMap<TaskNodeKey, Release>,
    end_nodes_to_leafs: IndexMap<TaskNodeKey, IndexSet<TaskNodeKey>>,
    leafs_to_end_nodes: IndexMap<TaskNodeKey, IndexSet<TaskNodeKey>>,
    end_node_queue: IndexSet<TaskNodeKey>,
    computed_end_nodes: HashSet<TaskNodeKey>,
    released_not_computed_end_nodes: HashSet<TaskNodeKey>,
    retaining_not_computed_end_nodes: IndexSet<TaskNodeKey>,
    /// Released leaf -> unfinished end nodes still needing it.
    scheduled_leaf_nodes: HashMap<TaskNodeKey, HashSet<TaskNodeKey>>,
}

impl StrategyState {
    fn poll_next_end_node(&mut self) -> Option<TaskNodeKey> {
        if let Some(candidate) = self.retaining_not_computed_end_nodes.shift_remove_index(0) {
            self.end_node_queue.shift_remove(&candidate);
            return Some(candidate);
        }
        self.end_node_queue.shift_remove_index(0)
    }

    fn schedule_one(&mut self, releases: &mut Vec<Release>) {
        let Some(end_node) = self.poll_next_end_node() else {
            return;
        };

        if !self.computed_end_nodes.contains(&end_node) {
            self.released_not_computed_end_nodes.insert(end_node.clone());
        }

        let leafs = self
            .end_nodes_to_leafs
            .get(&end_node)
            .cloned()
            .unwrap_or_default();
        trace!(end_node = %end_node, leafs = leafs.len(), "releasing leafs of end node");
        for leaf in &leafs {
            self.add_scheduled_leaf(leaf);
        }
        for leaf in &leafs {
            if let Some(release) = self.leaf_nodes.remove(leaf) {
                releases.push(release);
            }
        }
    }

    fn add_scheduled_leaf(&mut self, leaf: &TaskNodeKey) {
        let mut retaining = self.scheduled_leaf_nodes.remove(leaf).unwrap_or_default();

        if let Some(end_nodes) = self.leafs_to_end_nodes.get(leaf) {
            for end_node in end_nodes {
                if self.computed_end_nodes.contains(end_node) {
                    continue;
                }
                if !self.released_not_computed_end_nodes.contains(end_node) {
                    self.retaining_not_computed_end_nodes.insert(end_node.clone());
                }
                retaining.insert(end_node.clone());
            }
        }

        if !retaining.is_empty() {
            self.scheduled_leaf_nodes.insert(leaf.clone(), retaining);
        }
    }

    fn remove_leaf_nodes(&mut self, end_node: &TaskNodeKey, leafs: &IndexSet<TaskNodeKey>) {
        for leaf in leafs {
            let Some(retaining) = self.scheduled_leaf_nodes.get_mut(leaf) else {
                continue;
            };
            retaining.remove(end_node);
            if retaining.is_empty() {
                self.scheduled_leaf_nodes.remove(leaf);
            }
        }
    }

    fn schedule(&mut self, releases: &mut Vec<Release>) {
        if self.released_not_computed_end_nodes.is_empty() {
            self.schedule_one(releases);
        }

        while !self.end_node_queue.is_empty()
            && self.scheduled_leaf_nodes.len() < self.max_retained_leaf_nodes
        {
            self.schedule_one(releases);
        }
    }

    fn set_node_computed(&mut self, key: &TaskNodeKey, releases: &mut Vec<Release>) {
        let Some(leafs) = self.end_nodes_to_leafs.get(key).cloned() else {
            return;
        };

        self.computed_end_nodes.insert(key.clone());
        self.released_not_computed_end_nodes.remove(key);
        self.retaining_not_computed_end_nodes.shift_remove(key);

        self.remove_leaf_nodes(key, &leafs);
        self.schedule(releases);
    }
}

struct WeakLeafsStrategy {
    state: Mutex<StrategyState>,
}

impl TaskExecutionRestrictionStrategy for WeakLeafsStrategy {
    fn set_node_computed(&self, key: &TaskNodeKey) {
        let mut releases = Vec::new();
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_node_computed(key, &mut releases);

        releases.into_iter().for_each(|release| release());
    }
}
