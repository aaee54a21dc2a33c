// tests/graph_properties.rs

use std::collections::BTreeSet;

use proptest::prelude::*;
use taskgraph::graph::{DependencyDag, DirectedGraph};

// Acyclic by construction: node i may only point at nodes 0..i.
fn dag_edges_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    (2..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec((1..num_nodes, any::<usize>()), 0..num_nodes * 2).prop_map(
            |raw| {
                raw.into_iter()
                    .map(|(parent, child)| (parent, child % parent))
                    .collect()
            },
        )
    })
}

fn build(edges: &[(usize, usize)]) -> DirectedGraph<usize> {
    let mut builder = DirectedGraph::builder();
    for (parent, child) in edges {
        builder.add_child(*parent, *child);
    }
    builder.build()
}

proptest! {
    #[test]
    fn reversing_twice_gives_the_same_graph(edges in dag_edges_strategy(12)) {
        let graph = build(&edges);
        let twice = graph.reverse_graph().reverse_graph();

        prop_assert_eq!(twice.raw_graph(), graph.raw_graph());
        prop_assert_eq!(graph.reverse_graph().edge_count(), graph.edge_count());
    }

    #[test]
    fn forward_only_graphs_are_acyclic(edges in dag_edges_strategy(12)) {
        let graph = build(&edges);
        prop_assert!(graph.check_not_cyclic().is_ok());
        prop_assert!(DependencyDag::new(graph).is_ok());
    }

    #[test]
    fn a_back_edge_closes_a_cycle(edges in dag_edges_strategy(12)) {
        prop_assume!(!edges.is_empty());
        let (parent, child) = edges[0];

        let mut with_back_edge = edges.clone();
        with_back_edge.push((child, parent));
        let err = build(&with_back_edge).check_not_cyclic().unwrap_err();

        // The reported path is closed and follows existing edges.
        prop_assert!(err.cycle.len() >= 3);
        prop_assert_eq!(err.cycle.first(), err.cycle.last());
        let graph = build(&with_back_edge);
        for pair in err.cycle.windows(2) {
            prop_assert!(graph.children(&pair[0]).contains(&pair[1]));
        }
    }
}

#[test]
fn tree_leafs_map_to_their_root() {
    let mut builder = DirectedGraph::builder();
    {
        let mut a = builder.add_node("a");
        a.add_child("a.a").add_leafs(["a.a.a", "a.a.b"]);
        a.add_child("a.b").add_leafs(["a.b.a", "a.b.b"]);
    }
    let graph = builder.build();

    let leafs = graph.all_leaf_to_root_nodes([&"a"]);
    let keys: BTreeSet<_> = leafs.keys().copied().collect();
    assert_eq!(keys, BTreeSet::from(["a.a.a", "a.a.b", "a.b.a", "a.b.b"]));
    for roots in leafs.values() {
        assert_eq!(roots.iter().copied().collect::<Vec<_>>(), vec!["a"]);
    }
}

#[test]
fn shared_leaf_lists_roots_in_request_order() {
    let mut builder = DirectedGraph::builder();
    builder.add_node("a").add_child("a.a").add_leaf("x.a");
    builder.add_node("b").add_leafs(["x.a", "b.b"]);
    let graph = builder.build();

    let leafs = graph.all_leaf_to_root_nodes([&"a", &"b"]);

    assert_eq!(leafs[&"x.a"].iter().copied().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(leafs[&"b.b"].iter().copied().collect::<Vec<_>>(), vec!["b"]);
}

#[test]
fn disjoint_components_and_empty_graph_are_acyclic() {
    DirectedGraph::<u8>::empty().check_not_cyclic().unwrap();

    let graph = build(&[(1, 0), (3, 2), (4, 2)]);
    graph.check_not_cyclic().unwrap();
    assert_eq!(graph.nodes().len(), 5);
}

#[test]
fn two_node_cycle_names_both_members() {
    let graph = build(&[(0, 1), (1, 0)]);
    let err = DependencyDag::new(graph).unwrap_err();
    let msg = err.to_string();

    assert!(msg.contains("cyclic"), "{msg}");
    assert!(msg.contains('0') && msg.contains('1'), "{msg}");
}
