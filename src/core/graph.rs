//! Dependency graph over package components.
//!
//! Ordering uses Kahn's algorithm restricted to required edges, with ties
//! broken by lexicographic id so the same input always yields the same
//! order. Non-required edges never influence ordering or cycle detection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CtlError, Result};

/// Relationship carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    References,
    Requires,
    Validates,
    Generates,
    Includes,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::References => "references",
            Self::Requires => "requires",
            Self::Validates => "validates",
            Self::Generates => "generates",
            Self::Includes => "includes",
        };
        f.write_str(label)
    }
}

/// `source` depends on `target`; the target is ordered first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub required: bool,
}

impl DependencyEdge {
    pub fn required(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            required: true,
        }
    }

    pub fn informational(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: EdgeKind,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            required: false,
        }
    }
}

/// Role of a file inside a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentRole {
    Manifest,
    Reference,
    Script,
    Template,
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manifest => "manifest",
            Self::Reference => "reference",
            Self::Script => "script",
            Self::Template => "template",
        };
        f.write_str(name)
    }
}

/// A single file treated as a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub package_id: String,
    pub role: ComponentRole,
}

/// Successful ordering of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Total order respecting every required edge.
    pub order: Vec<String>,
    /// Nodes grouped by depth; a group may be processed concurrently.
    pub levels: Vec<Vec<String>>,
    /// Informational edges, for cross-linking only.
    pub see_also: Vec<DependencyEdge>,
}

impl Resolution {
    /// Depth of `id` in the level grouping.
    #[must_use]
    pub fn level_of(&self, id: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|group| group.iter().any(|node| node == id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_components(components: &[Component], edges: Vec<DependencyEdge>) -> Self {
        let mut graph = Self::new();
        for component in components {
            graph.add_node(component.id.clone());
        }
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    pub fn add_node(&mut self, id: impl Into<String>) {
        self.nodes.insert(id.into());
    }

    /// Edges are not checked here; `resolve` rejects required edges whose
    /// endpoints are not nodes.
    pub fn add_edge(&mut self, edge: DependencyEdge) {
        self.edges.push(edge);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Produce the total order and parallel levels, or name the cycle.
    pub fn resolve(&self) -> Result<Resolution> {
        let mut deps: BTreeMap<&str, BTreeSet<&str>> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), BTreeSet::new()))
            .collect();
        let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut see_also = Vec::new();

        for edge in &self.edges {
            if !edge.required {
                see_also.push(edge.clone());
                continue;
            }
            for endpoint in [&edge.source, &edge.target] {
                if !self.nodes.contains(endpoint) {
                    return Err(CtlError::DanglingEdge {
                        source_id: edge.source.clone(),
                        target: edge.target.clone(),
                    });
                }
            }
            if let Some(set) = deps.get_mut(edge.source.as_str()) {
                set.insert(edge.target.as_str());
            }
            dependents
                .entry(edge.target.as_str())
                .or_default()
                .insert(edge.source.as_str());
        }

        let mut in_degree: BTreeMap<&str, usize> =
            deps.iter().map(|(node, d)| (*node, d.len())).collect();
        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut level: BTreeMap<&str, usize> = BTreeMap::new();

        while let Some(node) = ready.pop_first() {
            let depth = deps[node]
                .iter()
                .filter_map(|dep| level.get(dep))
                .max()
                .map_or(0, |max| max + 1);
            level.insert(node, depth);
            order.push(node.to_string());

            if let Some(children) = dependents.get(node) {
                for &child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(child);
                        }
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let remaining: BTreeSet<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(node, _)| *node)
                .collect();
            return Err(CtlError::GraphCycle {
                nodes: cycle_nodes(&remaining, &deps),
            });
        }

        let depth = level.values().max().map_or(0, |max| max + 1);
        let mut levels = vec![Vec::new(); depth];
        for (node, lvl) in level {
            levels[lvl].push(node.to_string());
        }

        Ok(Resolution {
            order,
            levels,
            see_also,
        })
    }
}

/// Nodes that sit on a cycle: members of strongly connected components of
/// size > 1, or nodes with a self edge. Nodes that merely depend on a cycle
/// are left out.
fn cycle_nodes<'g>(
    remaining: &BTreeSet<&'g str>,
    deps: &BTreeMap<&'g str, BTreeSet<&'g str>>,
) -> Vec<String> {
    let mut tarjan = Tarjan {
        deps,
        remaining,
        index: 0,
        indices: BTreeMap::new(),
        lowlink: BTreeMap::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        out: BTreeSet::new(),
    };
    for &node in remaining {
        if !tarjan.indices.contains_key(node) {
            tarjan.visit(node);
        }
    }
    tarjan.out.into_iter().map(str::to_string).collect()
}

struct Tarjan<'a, 'g> {
    deps: &'a BTreeMap<&'g str, BTreeSet<&'g str>>,
    remaining: &'a BTreeSet<&'g str>,
    index: usize,
    indices: BTreeMap<&'g str, usize>,
    lowlink: BTreeMap<&'g str, usize>,
    stack: Vec<&'g str>,
    on_stack: BTreeSet<&'g str>,
    out: BTreeSet<&'g str>,
}

impl<'g> Tarjan<'_, 'g> {
    fn visit(&mut self, node: &'g str) {
        self.indices.insert(node, self.index);
        self.lowlink.insert(node, self.index);
        self.index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let successors: Vec<&'g str> = self.deps[node]
            .iter()
            .copied()
            .filter(|dep| self.remaining.contains(dep))
            .collect();
        for next in successors {
            if !self.indices.contains_key(next) {
                self.visit(next);
                let low = self.lowlink[node].min(self.lowlink[next]);
                self.lowlink.insert(node, low);
            } else if self.on_stack.contains(next) {
                let low = self.lowlink[node].min(self.indices[next]);
                self.lowlink.insert(node, low);
            }
        }

        if self.lowlink[node] == self.indices[node] {
            let mut component = Vec::new();
            while let Some(top) = self.stack.pop() {
                self.on_stack.remove(top);
                component.push(top);
                if top == node {
                    break;
                }
            }
            let self_loop = self.deps[node].contains(node);
            if component.len() > 1 || self_loop {
                self.out.extend(component);
            }
        }
    }
}
