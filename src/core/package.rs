//! Package model: one skill directory.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::frontmatter;
use crate::core::tokens::{TokenCounts, measure_package};
use crate::error::{CtlError, Result};

/// File name of the primary manifest inside a package.
pub const MANIFEST_FILE: &str = "SKILL.md";

/// Default tier for packages that do not declare one.
pub const DEFAULT_TIER: u8 = 1;

/// Default category for packages that do not declare one.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Where a package comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    External,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Provenance of a package.
///
/// A local package never carries an upstream source and an external one
/// always does. Construction goes through [`Provenance::local`] and
/// [`Provenance::external`], and deserialization re-checks the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProvenanceRecord", into = "ProvenanceRecord")]
pub struct Provenance {
    origin: Origin,
    upstream_source: Option<String>,
    upstream_revision: Option<String>,
    synced_at: Option<DateTime<Utc>>,
}

impl Provenance {
    #[must_use]
    pub const fn local() -> Self {
        Self {
            origin: Origin::Local,
            upstream_source: None,
            upstream_revision: None,
            synced_at: None,
        }
    }

    pub fn external(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(CtlError::Config(
                "external packages need a non-empty upstream source".to_string(),
            ));
        }
        Ok(Self {
            origin: Origin::External,
            upstream_source: Some(source),
            upstream_revision: None,
            synced_at: None,
        })
    }

    /// Record a successful sync. Local provenance is returned unchanged.
    #[must_use]
    pub fn synced(mut self, revision: impl Into<String>, at: DateTime<Utc>) -> Self {
        if self.origin == Origin::External {
            self.upstream_revision = Some(revision.into());
            self.synced_at = Some(at);
        }
        self
    }

    #[must_use]
    pub const fn origin(&self) -> Origin {
        self.origin
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }

    #[must_use]
    pub fn upstream_source(&self) -> Option<&str> {
        self.upstream_source.as_deref()
    }

    #[must_use]
    pub fn upstream_revision(&self) -> Option<&str> {
        self.upstream_revision.as_deref()
    }

    #[must_use]
    pub const fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProvenanceRecord {
    origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upstream_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upstream_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProvenanceRecord> for Provenance {
    type Error = String;

    fn try_from(record: ProvenanceRecord) -> std::result::Result<Self, Self::Error> {
        let has_source = record
            .upstream_source
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        match (record.origin, has_source) {
            (Origin::Local, true) => Err("local package must not have an upstream source".into()),
            (Origin::External, false) => {
                Err("external package must have an upstream source".into())
            }
            (Origin::Local, false) => Ok(Self::local()),
            (Origin::External, true) => Ok(Self {
                origin: Origin::External,
                upstream_source: record.upstream_source,
                upstream_revision: record.upstream_revision,
                synced_at: record.synced_at,
            }),
        }
    }
}

impl From<Provenance> for ProvenanceRecord {
    fn from(p: Provenance) -> Self {
        Self {
            origin: p.origin,
            upstream_source: p.upstream_source,
            upstream_revision: p.upstream_revision,
            synced_at: p.synced_at,
        }
    }
}

/// In-memory model of a skill directory.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: String,
    pub path: PathBuf,
    pub description: String,
    pub allowed_capabilities: BTreeSet<String>,
    pub tier: u8,
    pub category: String,
    pub requires: Vec<String>,
    pub token_counts: TokenCounts,
    pub provenance: Provenance,
    manifest: String,
}

impl Package {
    /// Load a package from its directory.
    ///
    /// Rejects structurally malformed packages (no manifest, no frontmatter,
    /// missing or mistyped fields). Rule checks such as name format are left
    /// to the validator.
    pub fn load(dir: &Path, provenance: Provenance) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(CtlError::InvalidPackage {
                id: None,
                path: dir.to_path_buf(),
                reason: format!("missing {MANIFEST_FILE}"),
            });
        }
        let manifest = std::fs::read_to_string(&manifest_path).map_err(|err| {
            CtlError::InvalidPackage {
                id: None,
                path: dir.to_path_buf(),
                reason: format!("read {MANIFEST_FILE}: {err}"),
            }
        })?;
        let token_counts = measure_package(dir, &manifest)?;
        let path = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        Self::from_manifest(path, manifest, provenance, token_counts)
    }

    /// Build a package from manifest text already in memory.
    pub fn from_manifest(
        path: PathBuf,
        manifest: String,
        provenance: Provenance,
        token_counts: TokenCounts,
    ) -> Result<Self> {
        let (fm, _body) =
            frontmatter::parse(&manifest).map_err(|reason| CtlError::InvalidPackage {
                id: None,
                path: path.clone(),
                reason,
            })?;

        let allowed_capabilities = fm
            .allowed_tools
            .as_ref()
            .map(|tools| tools.names().into_iter().collect())
            .unwrap_or_default();
        let tier = fm.tier().unwrap_or(DEFAULT_TIER);
        let category = fm.category().unwrap_or(DEFAULT_CATEGORY).to_string();
        let mut requires: Vec<String> = fm
            .requires
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        requires.sort();
        requires.dedup();

        Ok(Self {
            id: fm.name.trim().to_string(),
            description: fm.description.trim().to_string(),
            path,
            allowed_capabilities,
            tier,
            category,
            requires,
            token_counts,
            provenance,
            manifest,
        })
    }

    /// Full text of `SKILL.md`, frontmatter included.
    #[must_use]
    pub fn manifest(&self) -> &str {
        &self.manifest
    }

    /// Same package, relocated. Used when content is staged before it moves
    /// to its final location.
    #[must_use]
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }
}
