//! Derive graph nodes and edges from package contents.

use std::collections::BTreeSet;
use std::path::{Component as PathPart, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::graph::{Component, ComponentRole, DependencyEdge, DependencyGraph, EdgeKind};
use super::package::{MANIFEST_FILE, Package};
use crate::error::Result;
use crate::utils::fs::package_files;

/// Markdown link target: `[text](target)` or `[text](target#anchor)`.
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\]\(\s*<?([^)\s#>]+)>?(?:#[^)]*)?\s*\)").expect("valid link regex")
});

/// Role of a file, from its location inside the package.
#[must_use]
pub fn role_for(relative: &Path) -> ComponentRole {
    if relative == Path::new(MANIFEST_FILE) {
        return ComponentRole::Manifest;
    }
    match relative.components().next() {
        Some(PathPart::Normal(first)) if first == "scripts" => ComponentRole::Script,
        Some(PathPart::Normal(first)) if first == "templates" || first == "assets" => {
            ComponentRole::Template
        }
        _ => ComponentRole::Reference,
    }
}

/// Components and edges of one package.
#[derive(Debug, Clone)]
pub struct PackageGraph {
    pub components: Vec<Component>,
    pub graph: DependencyGraph,
}

/// Build the file-level graph of a package.
///
/// Links from the manifest become required `includes` edges: the linked
/// file must exist before the manifest that pulls it in. Links between
/// other documents are informational `references`.
pub fn package_graph(package: &Package) -> Result<PackageGraph> {
    let files = package_files(&package.path)?;
    let known: BTreeSet<PathBuf> = files.iter().cloned().collect();

    let components: Vec<Component> = files
        .iter()
        .map(|rel| Component {
            id: component_id(&package.id, rel),
            package_id: package.id.clone(),
            role: role_for(rel),
        })
        .collect();

    let mut edges = Vec::new();
    for rel in &files {
        if !is_markdown(rel) {
            continue;
        }
        let Ok(text) = std::fs::read_to_string(package.path.join(rel)) else {
            continue;
        };
        let source = component_id(&package.id, rel);
        let from_manifest = role_for(rel) == ComponentRole::Manifest;
        let base = rel.parent().unwrap_or_else(|| Path::new(""));

        for target in link_targets(&text) {
            let Some(resolved) = normalize(&base.join(target)) else {
                debug!(package = %package.id, link = target, "link escapes package");
                continue;
            };
            if &resolved == rel || !known.contains(&resolved) {
                continue;
            }
            let target_id = component_id(&package.id, &resolved);
            let edge = if from_manifest {
                DependencyEdge::required(source.clone(), target_id, EdgeKind::Includes)
            } else {
                DependencyEdge::informational(source.clone(), target_id, EdgeKind::References)
            };
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
    }

    let graph = DependencyGraph::from_components(&components, edges);
    Ok(PackageGraph { components, graph })
}

/// Package-level graph from `(id, requires)` pairs.
///
/// Requirements on ids outside the set are kept as informational edges so
/// that a filtered bulk install can still be ordered.
pub fn requirement_graph<'a, I>(packages: I) -> DependencyGraph
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let packages: Vec<(&str, &[String])> = packages.into_iter().collect();
    let ids: BTreeSet<&str> = packages.iter().map(|(id, _)| *id).collect();

    let mut graph = DependencyGraph::new();
    for id in &ids {
        graph.add_node(*id);
    }
    for (id, requires) in &packages {
        for required in *requires {
            if ids.contains(required.as_str()) {
                graph.add_edge(DependencyEdge::required(*id, required.clone(), EdgeKind::Requires));
            } else {
                warn!(package = *id, requires = %required, "requirement not in package set");
                graph.add_edge(DependencyEdge::informational(
                    *id,
                    required.clone(),
                    EdgeKind::Requires,
                ));
            }
        }
    }
    graph
}

fn component_id(package_id: &str, relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{package_id}/{}", parts.join("/"))
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn link_targets(text: &str) -> Vec<&str> {
    LINK_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|target| !target.contains("://") && !target.starts_with("mailto:"))
        .filter(|target| !target.starts_with('/'))
        .collect()
}

/// Lexically resolve `.` and `..`; `None` if the path leaves the package.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for part in path.components() {
        match part {
            PathPart::CurDir => {}
            PathPart::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            PathPart::Normal(name) => out.push(name),
            PathPart::RootDir | PathPart::Prefix(_) => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::Provenance;
    use crate::test_utils::fixtures::UnitTestFixture;
    use crate::test_utils::logging::capture_logs;

    fn load(fixture: &UnitTestFixture, name: &str) -> Package {
        Package::load(&fixture.data_path.join("skills").join(name), Provenance::local()).unwrap()
    }

    #[test]
    fn roles_follow_layout() {
        assert_eq!(role_for(Path::new("SKILL.md")), ComponentRole::Manifest);
        assert_eq!(role_for(Path::new("scripts/run.sh")), ComponentRole::Script);
        assert_eq!(role_for(Path::new("templates/a.md")), ComponentRole::Template);
        assert_eq!(role_for(Path::new("assets/logo.svg")), ComponentRole::Template);
        assert_eq!(role_for(Path::new("references/x.md")), ComponentRole::Reference);
    }

    #[test]
    fn manifest_links_are_required_includes() {
        let fixture = UnitTestFixture::new();
        let _ = fixture.create_skill(
            "helm",
            "---\nname: helm\ndescription: d\n---\nSee [guide](references/guide.md) and [run](./scripts/run.sh)\n[web](https://helm.sh)\n",
        );
        let _ = fixture.create_file(
            "skills/helm/references/guide.md",
            "Back to [manifest](../SKILL.md), see [faq](faq.md#top)\n",
        );
        let _ = fixture.create_file("skills/helm/references/faq.md", "faq\n");
        let _ = fixture.create_file("skills/helm/scripts/run.sh", "echo hi\n");

        let pg = package_graph(&load(&fixture, "helm")).unwrap();
        assert_eq!(pg.components.len(), 4);

        let res = pg.graph.resolve().unwrap();
        let pos = |id: &str| res.order.iter().position(|n| n == id).unwrap();
        assert!(pos("helm/references/guide.md") < pos("helm/SKILL.md"));
        assert!(pos("helm/scripts/run.sh") < pos("helm/SKILL.md"));
        assert_eq!(res.level_of("helm/SKILL.md"), Some(1));
        // guide -> SKILL.md and guide -> faq are informational
        assert_eq!(res.see_also.len(), 2);
        assert!(res.see_also.iter().all(|e| e.kind == EdgeKind::References));
    }

    #[test]
    fn links_outside_package_are_ignored() {
        let fixture = UnitTestFixture::new();
        let _ = fixture.create_skill(
            "a",
            "---\nname: a\ndescription: d\n---\n[x](../../etc/passwd) [y](missing.md)\n",
        );
        let pg = package_graph(&load(&fixture, "a")).unwrap();
        let resolution = pg.graph.resolve().unwrap();
        assert!(resolution.see_also.is_empty());
        assert_eq!(resolution.levels.len(), 1);
    }

    #[test]
    fn requirement_graph_orders_dependencies_first() {
        let a_req = vec!["b".to_string()];
        let b_req = vec!["c".to_string(), "outside".to_string()];
        let none: Vec<String> = Vec::new();
        let graph = requirement_graph([
            ("a", a_req.as_slice()),
            ("b", b_req.as_slice()),
            ("c", none.as_slice()),
        ]);
        let res = graph.resolve().unwrap();
        assert_eq!(res.order, vec!["c", "b", "a"]);
        assert_eq!(res.see_also.len(), 1);
    }

    #[test]
    fn missing_requirement_is_logged() {
        let requires = vec!["ghost".to_string()];
        let (graph, logs) =
            capture_logs(|| requirement_graph(vec![("app", requires.as_slice())]));
        assert!(graph.resolve().is_ok());
        assert!(logs.contains(tracing::Level::WARN, "requirement not in package set"));
        let entry = &logs.entries()[0];
        assert_eq!(entry.field("package"), Some("app"));
        assert_eq!(entry.field("requires"), Some("ghost"));
    }
}
