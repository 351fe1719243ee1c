//! Package-level ordering through the public graph API.

use skillctl::CtlError;
use skillctl::core::{DependencyEdge, DependencyGraph, EdgeKind, requirement_graph};

fn reqs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn requirement_graph_orders_dependencies_first() {
    let app = reqs(&["db", "http"]);
    let http = reqs(&["tls"]);
    let none: Vec<String> = Vec::new();
    let graph = requirement_graph(vec![
        ("app", app.as_slice()),
        ("db", none.as_slice()),
        ("http", http.as_slice()),
        ("tls", none.as_slice()),
    ]);
    let resolution = graph.resolve().unwrap();
    assert_eq!(resolution.order, vec!["db", "tls", "http", "app"]);
    assert_eq!(
        resolution.levels,
        vec![vec!["db", "tls"], vec!["http"], vec!["app"]]
    );
}

#[test]
fn requirements_outside_the_set_do_not_block() {
    let app = reqs(&["missing"]);
    let graph = requirement_graph(vec![("app", app.as_slice())]);
    let resolution = graph.resolve().unwrap();
    assert_eq!(resolution.order, vec!["app"]);
    assert_eq!(resolution.see_also.len(), 1);
    assert_eq!(resolution.see_also[0].target, "missing");
}

#[test]
fn cycle_reports_only_cycle_members() {
    let mut graph = DependencyGraph::new();
    for id in ["a", "b", "c", "d"] {
        graph.add_node(id);
    }
    graph.add_edge(DependencyEdge::required("a", "b", EdgeKind::Requires));
    graph.add_edge(DependencyEdge::required("b", "c", EdgeKind::Requires));
    graph.add_edge(DependencyEdge::required("c", "a", EdgeKind::Requires));
    // d depends on the cycle but is not part of it
    graph.add_edge(DependencyEdge::required("d", "a", EdgeKind::Requires));

    match graph.resolve() {
        Err(CtlError::GraphCycle { nodes }) => assert_eq!(nodes, vec!["a", "b", "c"]),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn informational_cycles_are_fine() {
    let mut graph = DependencyGraph::new();
    graph.add_node("x");
    graph.add_node("y");
    graph.add_edge(DependencyEdge::informational("x", "y", EdgeKind::References));
    graph.add_edge(DependencyEdge::informational("y", "x", EdgeKind::References));
    let resolution = graph.resolve().unwrap();
    assert_eq!(resolution.order, vec!["x", "y"]);
    assert_eq!(resolution.see_also.len(), 2);
}
