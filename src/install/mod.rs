//! Installing registered packages into user or project targets.
//!
//! Content is copied into a staging directory inside the target root and
//! renamed into place, so `target/<id>/` is either absent, the previous
//! install, or the complete new copy.

pub mod marker;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::components::requirement_graph;
use crate::core::package::{MANIFEST_FILE, Package};
use crate::core::validation::{Validator, Violation, has_fatal, is_valid_id};
use crate::error::{CtlError, Result};
use crate::storage::registry::{RegistryEntry, RegistryIndex, RegistryStore};
use crate::utils::cancel::CancelToken;
use crate::utils::fs::{copy_package, ensure_dir, hash_dir, remove_dir_atomic, swap_dir};

pub use marker::{InstallMarker, MARKER_FILE};

/// Which install root to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    User,
    Project,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Project => write!(f, "project"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Replace an existing install.
    pub force: bool,
    /// Skip packages whose tier is above this value.
    pub tier_ceiling: Option<u8>,
    /// Only install packages in this category.
    pub category: Option<String>,
}

impl InstallOptions {
    /// Why `entry` is excluded by the filters, if it is.
    #[must_use]
    pub fn skip_reason(&self, entry: &RegistryEntry) -> Option<String> {
        if let Some(ceiling) = self.tier_ceiling {
            if entry.tier > ceiling {
                return Some(format!("tier {} is above ceiling {ceiling}", entry.tier));
            }
        }
        if let Some(category) = &self.category {
            if !entry.category.eq_ignore_ascii_case(category) {
                return Some(format!(
                    "category {} does not match {category}",
                    entry.category
                ));
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    Installed {
        id: String,
        path: PathBuf,
        files: usize,
        replaced: bool,
    },
    Skipped {
        id: String,
        reason: String,
    },
}

impl InstallOutcome {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Installed { id, .. } | Self::Skipped { id, .. } => id,
        }
    }
}

/// Result of `install --all`.
#[derive(Debug, Default)]
pub struct BulkInstallReport {
    /// Install order of the selected packages, dependencies first.
    pub order: Vec<String>,
    pub outcomes: Vec<InstallOutcome>,
    pub failed: Vec<(String, CtlError)>,
    /// Set when the run stopped early on Ctrl-C.
    pub cancelled: bool,
}

impl BulkInstallReport {
    #[must_use]
    pub fn installed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, InstallOutcome::Installed { .. }))
            .count()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.installed()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Copies validated packages out of the registry into install targets.
#[derive(Debug, Clone)]
pub struct Installer {
    store: RegistryStore,
    validator: Validator,
    user_dir: PathBuf,
    project_dir: PathBuf,
    cancel: CancelToken,
}

impl Installer {
    #[must_use]
    pub fn new(store: RegistryStore, config: &Config, cancel: CancelToken) -> Self {
        Self {
            store,
            validator: Validator::from_config(&config.budget),
            user_dir: config.user_target(),
            project_dir: config.project_target(),
            cancel,
        }
    }

    /// Override the directory used for `kind`.
    #[must_use]
    pub fn with_target(mut self, kind: TargetKind, dir: impl Into<PathBuf>) -> Self {
        match kind {
            TargetKind::User => self.user_dir = dir.into(),
            TargetKind::Project => self.project_dir = dir.into(),
        }
        self
    }

    #[must_use]
    pub fn target_dir(&self, kind: TargetKind) -> &Path {
        match kind {
            TargetKind::User => &self.user_dir,
            TargetKind::Project => &self.project_dir,
        }
    }

    /// Install one registered package.
    pub fn install(
        &self,
        id: &str,
        kind: TargetKind,
        options: &InstallOptions,
    ) -> Result<InstallOutcome> {
        let index = self.store.load()?;
        self.install_entry(&index, id, kind, options)
            .map_err(|err| err.for_package(id))
    }

    /// Install every package passing the filters, dependencies first.
    ///
    /// Each install is independent: a failure is recorded and the run moves
    /// on. Packages caught in a dependency cycle, and anything requiring
    /// them, are recorded as failed and the rest is installed.
    pub fn install_all(&self, kind: TargetKind, options: &InstallOptions) -> Result<BulkInstallReport> {
        let index = self.store.load()?;
        let mut report = BulkInstallReport::default();

        let mut selected = Vec::new();
        for entry in index.entries() {
            match options.skip_reason(entry) {
                Some(reason) => report.outcomes.push(InstallOutcome::Skipped {
                    id: entry.id.clone(),
                    reason,
                }),
                None => selected.push(entry),
            }
        }

        report.order = resolve_install_order(selected, &mut report.failed)?;
        info!(
            count = report.order.len(),
            target = %kind,
            "installing packages"
        );

        for id in report.order.clone() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.install_entry(&index, &id, kind, options) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(CtlError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(err) => {
                    warn!(package = %id, error = %err, "install failed");
                    let err = err.for_package(&id);
                    report.failed.push((id, err));
                }
            }
        }
        Ok(report)
    }

    fn install_entry(
        &self,
        index: &RegistryIndex,
        id: &str,
        kind: TargetKind,
        options: &InstallOptions,
    ) -> Result<InstallOutcome> {
        let entry = index
            .get(id)
            .ok_or_else(|| CtlError::package_not_found(id, format!("package {id} is not registered")))?;

        if let Some(reason) = options.skip_reason(entry) {
            debug!(package = %id, %reason, "skipping");
            return Ok(InstallOutcome::Skipped {
                id: id.to_string(),
                reason,
            });
        }

        if !entry.is_local()
            && (entry.provenance.upstream_revision().is_none()
                || !entry.path.join(MANIFEST_FILE).is_file())
        {
            return Err(CtlError::package_not_found(
                id,
                format!("external package {id} has not been synced yet"),
            ));
        }

        let package = Package::load(&entry.path, entry.provenance.clone())?;
        if package.id != entry.id {
            return Err(CtlError::InvalidPackage {
                id: Some(entry.id.clone()),
                path: entry.path.clone(),
                reason: format!("manifest names {}, registered as {}", package.id, entry.id),
            });
        }

        let violations = self.validator.validate(&package, index);
        if has_fatal(&violations) {
            return Err(CtlError::ValidationFailed {
                id: entry.id.clone(),
                violations,
            });
        }
        for violation in &violations {
            warn!(package = %id, code = violation.code(), "{violation}");
        }

        let target_root = self.target_dir(kind);
        ensure_dir(target_root)?;
        let dest = target_root.join(&entry.id);
        let replaced = dest.exists();
        if replaced && !options.force {
            return Err(CtlError::AlreadyExists {
                id: entry.id.clone(),
                path: dest,
            });
        }

        let files = self.stage_and_swap(&package, kind, &dest, options.force)?;
        info!(
            package = %id,
            target = %kind,
            path = %dest.display(),
            files,
            replaced,
            "installed"
        );
        Ok(InstallOutcome::Installed {
            id: entry.id.clone(),
            path: dest,
            files,
            replaced,
        })
    }

    fn stage_and_swap(
        &self,
        package: &Package,
        kind: TargetKind,
        dest: &Path,
        replace: bool,
    ) -> Result<usize> {
        let target_root = dest.parent().unwrap_or_else(|| Path::new("."));
        // Dropped on any early return, taking the partial copy with it.
        let staging = tempfile::Builder::new()
            .prefix(".skillctl-stage-")
            .tempdir_in(target_root)?;

        let files = copy_package(&package.path, staging.path(), &self.cancel)?;
        let content_hash = hash_dir(staging.path())?;
        InstallMarker::new(&package.id, kind, content_hash).write(staging.path())?;
        self.cancel.check()?;

        let staged = staging.keep();
        if let Err(err) = swap_dir(&staged, dest, replace) {
            if let Err(cleanup) = std::fs::remove_dir_all(&staged) {
                warn!(path = %staged.display(), error = %cleanup, "failed to remove staging dir");
            }
            return Err(err);
        }
        Ok(files)
    }

    /// Remove an installed package.
    ///
    /// Only directories carrying a skillctl install marker are removed.
    pub fn uninstall(&self, id: &str, kind: TargetKind) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(CtlError::ValidationFailed {
                id: id.to_string(),
                violations: vec![Violation::InvalidName { id: id.to_string() }],
            });
        }
        let dest = self.target_dir(kind).join(id);
        if !dest.is_dir() {
            return Err(CtlError::package_not_found(
                id,
                format!("{id} is not installed in {}", self.target_dir(kind).display()),
            ));
        }
        let marker = InstallMarker::read(&dest)?.ok_or_else(|| {
            CtlError::Storage(format!(
                "{} was not installed by skillctl; refusing to remove it",
                dest.display()
            ))
        })?;
        if marker.package_id != id {
            return Err(CtlError::Storage(format!(
                "{} belongs to package {}",
                dest.display(),
                marker.package_id
            )));
        }
        remove_dir_atomic(&dest)?;
        info!(package = %id, target = %kind, "uninstalled");
        Ok(dest)
    }
}

/// Dependency order for the selected entries.
///
/// Cycle members are moved to `failed` together with every entry that
/// requires one of them, directly or transitively, and the rest is
/// resolved again.
fn resolve_install_order(
    mut selected: Vec<&RegistryEntry>,
    failed: &mut Vec<(String, CtlError)>,
) -> Result<Vec<String>> {
    loop {
        let graph = requirement_graph(
            selected
                .iter()
                .map(|entry| (entry.id.as_str(), entry.requires.as_slice())),
        );
        let nodes = match graph.resolve() {
            Ok(resolution) => return Ok(resolution.order),
            Err(CtlError::GraphCycle { nodes }) if !nodes.is_empty() => nodes,
            Err(err) => return Err(err),
        };

        let mut blocked: BTreeSet<String> = nodes.iter().cloned().collect();
        loop {
            let dependents: Vec<String> = selected
                .iter()
                .filter(|entry| !blocked.contains(&entry.id))
                .filter(|entry| entry.requires.iter().any(|r| blocked.contains(r)))
                .map(|entry| entry.id.clone())
                .collect();
            if dependents.is_empty() {
                break;
            }
            blocked.extend(dependents);
        }

        warn!(
            cycle = %nodes.join(", "),
            blocked = blocked.len(),
            "dependency cycle; skipping affected packages"
        );
        for id in &blocked {
            failed.push((id.clone(), CtlError::GraphCycle { nodes: nodes.clone() }));
        }
        selected.retain(|entry| !blocked.contains(&entry.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{UnitTestFixture, skill_manifest, skill_manifest_with};

    struct Setup {
        fixture: UnitTestFixture,
        store: RegistryStore,
        installer: Installer,
    }

    fn setup(cancel: CancelToken) -> Setup {
        let fixture = UnitTestFixture::new();
        let store = fixture.store();
        let installer = Installer::new(store.clone(), &Config::default(), cancel)
            .with_target(TargetKind::User, fixture.data_path.join("user"))
            .with_target(TargetKind::Project, fixture.data_path.join("project"));
        Setup {
            fixture,
            store,
            installer,
        }
    }

    fn target_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn installs_into_target_with_marker() {
        let s = setup(CancelToken::new());
        s.fixture
            .register_local(&s.store, "helm", &skill_manifest("helm", "Helm charts", ""));

        let outcome = s
            .installer
            .install("helm", TargetKind::Project, &InstallOptions::default())
            .unwrap();
        let dest = s.fixture.data_path.join("project/helm");
        assert!(matches!(outcome, InstallOutcome::Installed { replaced: false, .. }));
        assert!(dest.join("SKILL.md").is_file());

        let marker = InstallMarker::read(&dest).unwrap().unwrap();
        assert_eq!(marker.package_id, "helm");
        assert_eq!(marker.target_kind, TargetKind::Project);
        let entry = s.store.get("helm").unwrap();
        assert_eq!(marker.content_hash, entry.content_hash);
        assert_eq!(target_entries(&s.fixture.data_path.join("project")), vec!["helm"]);
    }

    #[test]
    fn existing_install_without_force_is_already_exists() {
        let s = setup(CancelToken::new());
        s.fixture
            .register_local(&s.store, "foo", &skill_manifest("foo", "Foo", ""));
        let opts = InstallOptions::default();
        s.installer.install("foo", TargetKind::User, &opts).unwrap();

        let err = s.installer.install("foo", TargetKind::User, &opts).unwrap_err();
        assert!(matches!(err, CtlError::AlreadyExists { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn force_replaces_old_content_entirely() {
        let s = setup(CancelToken::new());
        s.fixture
            .register_local(&s.store, "foo", &skill_manifest("foo", "Foo", ""));
        let dest = s.fixture.data_path.join("user/foo");
        s.installer
            .install("foo", TargetKind::User, &InstallOptions::default())
            .unwrap();
        std::fs::write(dest.join("stale.md"), "left over").unwrap();

        let force = InstallOptions {
            force: true,
            ..InstallOptions::default()
        };
        let outcome = s.installer.install("foo", TargetKind::User, &force).unwrap();
        assert!(matches!(outcome, InstallOutcome::Installed { replaced: true, .. }));
        assert!(!dest.join("stale.md").exists());
        assert_eq!(target_entries(&s.fixture.data_path.join("user")), vec!["foo"]);
    }

    #[test]
    fn cancelled_install_leaves_nothing_behind() {
        let cancel = CancelToken::new();
        let s = setup(cancel.clone());
        s.fixture
            .register_local(&s.store, "foo", &skill_manifest("foo", "Foo", ""));
        cancel.cancel();

        let err = s
            .installer
            .install("foo", TargetKind::User, &InstallOptions::default())
            .unwrap_err();
        assert!(matches!(err, CtlError::Cancelled));
        let root = s.fixture.data_path.join("user");
        assert!(target_entries(&root).is_empty());
    }

    #[test]
    fn fatal_violations_block_install() {
        let s = setup(CancelToken::new());
        s.fixture.register_local(
            &s.store,
            "draft",
            &skill_manifest("draft", "Draft", "\nTODO: write this\n"),
        );
        let err = s
            .installer
            .install("draft", TargetKind::User, &InstallOptions::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!s.fixture.data_path.join("user/draft").exists());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let s = setup(CancelToken::new());
        let err = s
            .installer
            .install("ghost", TargetKind::User, &InstallOptions::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn filters_skip_without_copying() {
        let s = setup(CancelToken::new());
        s.fixture.register_local(
            &s.store,
            "deep",
            &skill_manifest_with("deep", "Deep", "tier: 3\ncategory: ops\n", ""),
        );
        let tiered = InstallOptions {
            tier_ceiling: Some(2),
            ..InstallOptions::default()
        };
        let outcome = s.installer.install("deep", TargetKind::User, &tiered).unwrap();
        assert!(matches!(outcome, InstallOutcome::Skipped { .. }));

        let category = InstallOptions {
            category: Some("web".to_string()),
            ..InstallOptions::default()
        };
        let outcome = s.installer.install("deep", TargetKind::User, &category).unwrap();
        assert!(matches!(outcome, InstallOutcome::Skipped { .. }));
        assert!(!s.fixture.data_path.join("user/deep").exists());
    }

    #[test]
    fn install_all_orders_dependencies_first() {
        let s = setup(CancelToken::new());
        s.fixture.register_local(
            &s.store,
            "app",
            &skill_manifest_with("app", "App", "requires: [base]\n", ""),
        );
        s.fixture
            .register_local(&s.store, "base", &skill_manifest("base", "Base", ""));
        s.fixture
            .register_local(&s.store, "zeta", &skill_manifest("zeta", "Zeta", ""));

        let report = s
            .installer
            .install_all(TargetKind::Project, &InstallOptions::default())
            .unwrap();
        assert_eq!(report.order, vec!["base", "app", "zeta"]);
        assert_eq!(report.installed(), 3);
        assert!(report.is_success());
    }

    #[test]
    fn install_all_collects_failures() {
        let s = setup(CancelToken::new());
        s.fixture
            .register_local(&s.store, "good", &skill_manifest("good", "Good", ""));
        s.fixture.register_local(
            &s.store,
            "bad",
            &skill_manifest("bad", "Bad", "\nTBD\n"),
        );
        let report = s
            .installer
            .install_all(TargetKind::User, &InstallOptions::default())
            .unwrap();
        assert_eq!(report.installed(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert!(!report.is_success());
    }

    #[test]
    fn install_all_isolates_requirement_cycle() {
        let s = setup(CancelToken::new());
        s.fixture.register_local(
            &s.store,
            "alpha",
            &skill_manifest_with("alpha", "Alpha", "requires: [beta]
", ""),
        );
        s.fixture.register_local(
            &s.store,
            "beta",
            &skill_manifest_with("beta", "Beta", "requires: [alpha]
", ""),
        );
        s.fixture.register_local(
            &s.store,
            "gamma",
            &skill_manifest_with("gamma", "Gamma", "requires: [alpha]
", ""),
        );
        s.fixture
            .register_local(&s.store, "solo", &skill_manifest("solo", "Solo", ""));

        let report = s
            .installer
            .install_all(TargetKind::User, &InstallOptions::default())
            .unwrap();
        assert_eq!(report.order, vec!["solo"]);
        assert_eq!(report.installed(), 1);
        assert!(s.fixture.data_path.join("user/solo/SKILL.md").is_file());

        let failed: Vec<(&str, &str)> = report
            .failed
            .iter()
            .map(|(id, err)| (id.as_str(), err.code()))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("alpha", "graph_cycle"),
                ("beta", "graph_cycle"),
                ("gamma", "graph_cycle")
            ]
        );
        assert!(!s.fixture.data_path.join("user/gamma").exists());
    }

    #[test]
    fn external_entry_without_revision_is_not_installed() {
        let s = setup(CancelToken::new());
        let cache = s.store.cache_path("ext");
        let stub = RegistryEntry::external_stub(
            "ext",
            "https://example.com/ext/SKILL.md",
            cache.clone(),
            1,
            "general",
        )
        .unwrap();
        s.store.register_external(stub).unwrap();
        // Content on disk that no sync has recorded a revision for.
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("SKILL.md"), skill_manifest("ext", "Old upstream", "")).unwrap();

        let err = s
            .installer
            .install("ext", TargetKind::User, &InstallOptions::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.package_id(), Some("ext"));
        assert!(!s.fixture.data_path.join("user/ext").exists());
    }

    #[test]
    fn package_dotfiles_are_installed() {
        let s = setup(CancelToken::new());
        s.fixture
            .register_local(&s.store, "env", &skill_manifest("env", "Env", ""));
        let _ = s
            .fixture
            .create_file("skills/env/scripts/.env.example", "API_KEY=\n");
        let _ = s.fixture.create_file("skills/env/.git/HEAD", "ref: main\n");

        s.installer
            .install("env", TargetKind::User, &InstallOptions::default())
            .unwrap();
        let dest = s.fixture.data_path.join("user/env");
        assert!(dest.join("scripts/.env.example").is_file());
        assert!(!dest.join(".git").exists());
    }

    #[test]
    fn uninstall_rejects_ids_that_escape_the_target() {
        let s = setup(CancelToken::new());
        let outside = s.fixture.data_path.join("outside");
        std::fs::create_dir_all(&outside).unwrap();

        let err = s.installer.uninstall("../outside", TargetKind::User).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(outside.is_dir());
    }

    #[test]
    fn uninstall_only_removes_marked_directories() {
        let s = setup(CancelToken::new());
        s.fixture
            .register_local(&s.store, "foo", &skill_manifest("foo", "Foo", ""));
        s.installer
            .install("foo", TargetKind::User, &InstallOptions::default())
            .unwrap();
        s.installer.uninstall("foo", TargetKind::User).unwrap();
        assert!(!s.fixture.data_path.join("user/foo").exists());

        let hand_made = s.fixture.data_path.join("user/mine");
        std::fs::create_dir_all(&hand_made).unwrap();
        std::fs::write(hand_made.join("SKILL.md"), "mine").unwrap();
        assert!(s.installer.uninstall("mine", TargetKind::User).is_err());
        assert!(hand_made.join("SKILL.md").exists());
    }
}
