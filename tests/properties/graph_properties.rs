use std::collections::BTreeSet;

use proptest::prelude::*;

use skillctl::CtlError;
use skillctl::core::{DependencyEdge, DependencyGraph, EdgeKind};

fn node(i: usize) -> String {
    format!("n{i:02}")
}

/// Random DAG: edges only point from higher to lower index.
fn dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..24).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..n * 2).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| if a > b { (a, b) } else { (b, a) })
                .collect::<Vec<_>>()
        });
        (Just(n), edges)
    })
}

fn build(n: usize, edges: &[(usize, usize)]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for i in 0..n {
        graph.add_node(node(i));
    }
    for &(source, target) in edges {
        graph.add_edge(DependencyEdge::required(node(source), node(target), EdgeKind::Requires));
    }
    graph
}

proptest! {
    #[test]
    fn order_is_deterministic_under_shuffle((n, edges) in dag(), seed in any::<u64>()) {
        let first = build(n, &edges).resolve().unwrap();

        let mut shuffled = edges.clone();
        // cheap deterministic permutation from the seed
        let len = shuffled.len().max(1);
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();
        let mut graph = DependencyGraph::new();
        for i in (0..n).rev() {
            graph.add_node(node(i));
        }
        for &(source, target) in &shuffled {
            graph.add_edge(DependencyEdge::required(node(source), node(target), EdgeKind::Requires));
        }
        let second = graph.resolve().unwrap();
        prop_assert_eq!(first.order, second.order);
        prop_assert_eq!(first.levels, second.levels);
    }

    #[test]
    fn order_respects_every_required_edge((n, edges) in dag()) {
        let resolution = build(n, &edges).resolve().unwrap();
        prop_assert_eq!(resolution.order.len(), n);
        let pos = |id: &str| resolution.order.iter().position(|o| o == id).unwrap();
        for &(source, target) in &edges {
            prop_assert!(pos(&node(target)) < pos(&node(source)));
            let ls = resolution.level_of(&node(source)).unwrap();
            let lt = resolution.level_of(&node(target)).unwrap();
            prop_assert!(lt < ls);
        }
    }

    #[test]
    fn reported_cycle_nodes_are_exactly_removable((n, edges) in dag(), back in (0usize..24, 0usize..24)) {
        let (a, b) = (back.0 % n, back.1 % n);
        let mut with_back = edges.clone();
        // a back edge from low to high may close a cycle
        with_back.push((a.min(b), a.max(b)));
        let graph = build(n, &with_back);
        match graph.resolve() {
            Ok(_) => {}
            Err(CtlError::GraphCycle { nodes }) => {
                prop_assert!(!nodes.is_empty());
                let cut: BTreeSet<String> = nodes.into_iter().collect();
                let mut rest = DependencyGraph::new();
                for i in 0..n {
                    if !cut.contains(&node(i)) {
                        rest.add_node(node(i));
                    }
                }
                for &(source, target) in &with_back {
                    if !cut.contains(&node(source)) && !cut.contains(&node(target)) {
                        rest.add_edge(DependencyEdge::required(node(source), node(target), EdgeKind::Requires));
                    }
                }
                prop_assert!(rest.resolve().is_ok());
            }
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
    }
}
