//! Validator behavior on loaded packages.

use std::path::{Path, PathBuf};

use skillctl::core::{KnownPackages, Package, Provenance, Validator, Violation, has_fatal};
use tempfile::tempdir;

struct Registered(PathBuf);

impl KnownPackages for Registered {
    fn registered_path(&self, id: &str) -> Option<&Path> {
        (id == "dup").then_some(self.0.as_path())
    }
}

fn load(dir: &Path, manifest: &str) -> Package {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("SKILL.md"), manifest).unwrap();
    Package::load(dir, Provenance::local()).unwrap()
}

#[test]
fn duplicate_id_at_other_path_is_fatal() {
    let tmp = tempdir().unwrap();
    let package = load(&tmp.path().join("dup"), "---\nname: dup\ndescription: d\n---\n");
    let known = Registered(PathBuf::from("/somewhere/else/dup"));

    let violations = Validator::default().validate(&package, &known);
    assert!(matches!(violations.as_slice(), [Violation::DuplicateId { .. }]));
    assert!(has_fatal(&violations));

    let same = Registered(package.path.clone());
    assert!(Validator::default().validate(&package, &same).is_empty());
}

#[test]
fn total_budget_counts_reference_files() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("heavy");
    std::fs::create_dir_all(dir.join("refs")).unwrap();
    std::fs::write(dir.join("refs/big.md"), "z".repeat(60_004)).unwrap();
    let package = load(&dir, "---\nname: heavy\ndescription: d\n---\n");

    let violations = Validator::default().validate(&package, &());
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].code(), "total_budget_warning");
    assert!(!has_fatal(&violations));
}

#[test]
fn allowed_tools_inline_string_is_split() {
    let tmp = tempdir().unwrap();
    let package = load(
        &tmp.path().join("tools"),
        "---\nname: tools\ndescription: d\nallowed-tools: Read, Grep Bash\n---\n",
    );
    let names: Vec<&str> = package.allowed_capabilities.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["Bash", "Grep", "Read"]);
}
