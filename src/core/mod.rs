//! Core package model and pure catalog logic

pub mod components;
pub mod frontmatter;
pub mod graph;
pub mod package;
pub mod similarity;
pub mod tokens;
pub mod validation;

pub use components::{PackageGraph, package_graph, requirement_graph, role_for};
pub use graph::{
    Component, ComponentRole, DependencyEdge, DependencyGraph, EdgeKind, Resolution,
};
pub use package::{MANIFEST_FILE, Origin, Package, Provenance};
pub use similarity::{SimilarityMatch, SimilarityRecommendation, SimilarityScanner};
pub use tokens::{TokenCounts, estimate_tokens, measure_package};
pub use validation::{KnownPackages, Validator, Violation, has_fatal, is_valid_id};
