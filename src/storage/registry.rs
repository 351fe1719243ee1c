//! Durable registry of known packages.
//!
//! The index lives in `<root>/registry.json` as pretty-printed JSON with
//! entries keyed and sorted by id, so it diffs cleanly under version
//! control. Every write goes through [`RegistryStore::update`], which holds
//! the advisory lock for the whole read-modify-write cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::lock::RegistryLock;
use crate::core::package::{Origin, Package, Provenance};
use crate::core::validation::KnownPackages;
use crate::error::{CtlError, Result};
use crate::utils::fs::{read_optional, remove_dir_atomic, write_atomic};

/// Current on-disk format version.
pub const INDEX_VERSION: u32 = 1;

/// Persisted record of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: String,
    pub path: PathBuf,
    pub description: String,
    pub tier: u8,
    pub category: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_capabilities: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default)]
    pub content_hash: String,
    pub provenance: Provenance,
}

impl RegistryEntry {
    /// Entry describing `package` with the given content hash.
    #[must_use]
    pub fn from_package(package: &Package, content_hash: String) -> Self {
        Self {
            id: package.id.clone(),
            path: package.path.clone(),
            description: package.description.clone(),
            tier: package.tier,
            category: package.category.clone(),
            allowed_capabilities: package.allowed_capabilities.clone(),
            requires: package.requires.clone(),
            content_hash,
            provenance: package.provenance.clone(),
        }
    }

    /// Placeholder for an external package that has not been synced yet.
    pub fn external_stub(
        id: impl Into<String>,
        source: impl Into<String>,
        cache_path: PathBuf,
        tier: u8,
        category: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            path: cache_path,
            description: String::new(),
            tier,
            category: category.into(),
            allowed_capabilities: BTreeSet::new(),
            requires: Vec::new(),
            content_hash: String::new(),
            provenance: Provenance::external(source)?,
        })
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.provenance.is_local()
    }

    #[must_use]
    pub const fn origin(&self) -> Origin {
        self.provenance.origin()
    }
}

/// In-memory view of the index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryIndex {
    pub version: u32,
    #[serde(default)]
    entries: BTreeMap<String, RegistryEntry>,
}

impl Default for RegistryIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl RegistryIndex {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(id)
    }

    /// Insert or replace an entry, returning the previous one.
    pub fn upsert(&mut self, entry: RegistryEntry) -> Option<RegistryEntry> {
        self.entries.insert(entry.id.clone(), entry)
    }

    pub fn remove(&mut self, id: &str) -> Option<RegistryEntry> {
        self.entries.remove(id)
    }

    /// All entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn local(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries().filter(|e| e.origin() == Origin::Local)
    }

    pub fn external(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries().filter(|e| e.origin() == Origin::External)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KnownPackages for RegistryIndex {
    fn registered_path(&self, id: &str) -> Option<&Path> {
        self.get(id).map(|entry| entry.path.as_path())
    }
}

/// Handle on the registry directory.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl RegistryStore {
    pub const INDEX_FILENAME: &'static str = "registry.json";
    pub const CACHE_DIRNAME: &'static str = "cache";

    /// Open (and create if needed) the registry rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(Self::CACHE_DIRNAME)).map_err(|err| {
            CtlError::Storage(format!("create registry at {}: {err}", root.display()))
        })?;
        // Cache paths are compared against canonical package paths.
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Ok(Self {
            root,
            lock_timeout: Duration::from_secs(10),
        })
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(Self::INDEX_FILENAME)
    }

    /// Cache directory holding the mirrored copy of an external package.
    #[must_use]
    pub fn cache_path(&self, id: &str) -> PathBuf {
        self.root.join(Self::CACHE_DIRNAME).join(id)
    }

    /// Read the current index. A missing file is an empty registry.
    pub fn load(&self) -> Result<RegistryIndex> {
        let path = self.index_path();
        let Some(raw) = read_optional(&path)? else {
            return Ok(RegistryIndex::default());
        };
        let index: RegistryIndex = serde_json::from_str(&raw).map_err(|err| {
            CtlError::Serialization(format!("parse {}: {err}", path.display()))
        })?;
        if index.version > INDEX_VERSION {
            return Err(CtlError::Storage(format!(
                "{} has format version {} (this build understands {INDEX_VERSION})",
                path.display(),
                index.version
            )));
        }
        Ok(index)
    }

    /// Locked read-modify-write of the index.
    ///
    /// The index is only rewritten when `mutate` succeeds; the new file is
    /// written beside the old one and renamed over it.
    pub fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut RegistryIndex) -> Result<T>,
    {
        let _lock = RegistryLock::acquire_timeout(&self.root, self.lock_timeout)?;
        let mut index = self.load()?;
        let before = index.clone();
        let out = mutate(&mut index)?;
        if index != before {
            index.version = INDEX_VERSION;
            self.write(&index)?;
            debug!(entries = index.len(), "registry index written");
        }
        Ok(out)
    }

    fn write(&self, index: &RegistryIndex) -> Result<()> {
        let mut json = serde_json::to_string_pretty(index)
            .map_err(|err| CtlError::Serialization(format!("serialize registry: {err}")))?;
        json.push('\n');
        write_atomic(&self.index_path(), json.as_bytes())
    }

    /// Look up a single entry.
    pub fn get(&self, id: &str) -> Result<RegistryEntry> {
        self.load()?
            .get(id)
            .cloned()
            .ok_or_else(|| CtlError::package_not_found(id, format!("package {id} is not registered")))
    }

    /// Register a locally authored package.
    ///
    /// Refuses to shadow an external entry with the same id.
    pub fn register_local(&self, package: &Package, content_hash: String) -> Result<bool> {
        if !package.provenance.is_local() {
            return Err(CtlError::Storage(format!(
                "{} is not a local package",
                package.id
            )));
        }
        let entry = RegistryEntry::from_package(package, content_hash);
        self.update(|index| {
            if let Some(existing) = index.get(&entry.id) {
                if !existing.is_local() {
                    return Err(CtlError::Storage(format!(
                        "{} is already registered as an external package",
                        entry.id
                    )));
                }
                if existing == &entry {
                    return Ok(false);
                }
            }
            info!(package = %entry.id, path = %entry.path.display(), "registered local package");
            index.upsert(entry);
            Ok(true)
        })
    }

    /// Register an external package to be fetched by the next sync.
    ///
    /// Any cached copy under the id is dropped: it belongs to a previous
    /// registration and the new stub has no revision to vouch for it.
    pub fn register_external(&self, entry: RegistryEntry) -> Result<()> {
        if entry.is_local() {
            return Err(CtlError::Storage(format!(
                "{} is not an external package",
                entry.id
            )));
        }
        let id = entry.id.clone();
        let cache = self.cache_path(&id);
        self.update(|index| {
            if let Some(existing) = index.get(&entry.id) {
                if existing.is_local() {
                    return Err(CtlError::Storage(format!(
                        "{} is already registered as a local package",
                        entry.id
                    )));
                }
            }
            info!(package = %entry.id, "registered external package");
            index.upsert(entry);
            Ok(())
        })?;
        if cache.exists() {
            info!(package = %id, path = %cache.display(), "dropping stale cached copy");
            remove_dir_atomic(&cache)?;
        }
        Ok(())
    }

    /// Drop an entry. The cached copy of an external package goes with it;
    /// a local package's directory is never touched.
    ///
    /// Returns the removed entry and whether a cached copy was deleted.
    pub fn remove(&self, id: &str) -> Result<(RegistryEntry, bool)> {
        let removed = self.update(|index| {
            index
                .remove(id)
                .ok_or_else(|| CtlError::package_not_found(id, format!("package {id} is not registered")))
        })?;
        let cache = self.cache_path(id);
        let cache_removed = !removed.is_local() && cache.exists();
        if cache_removed {
            remove_dir_atomic(&cache)?;
        }
        Ok((removed, cache_removed))
    }
}
