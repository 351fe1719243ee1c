//! Schema and budget validation for skill packages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::package::Package;
use crate::config::BudgetConfig;

/// Maximum length of a package id.
pub const MAX_ID_LEN: usize = 64;

/// Maximum length of a package description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1024;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid id regex"));

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(TODO|TBD)\b").expect("valid placeholder regex"));

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Violation {
    InvalidName { id: String },
    DescriptionTooLong { length: usize, max: usize },
    ManifestBudgetWarning { tokens: usize, ceiling: usize },
    TotalBudgetWarning { tokens: usize, ceiling: usize },
    PlaceholderContent { marker: String, line: usize },
    DuplicateId { id: String, existing_path: PathBuf },
}

impl Violation {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "invalid_name",
            Self::DescriptionTooLong { .. } => "description_too_long",
            Self::ManifestBudgetWarning { .. } => "manifest_budget_warning",
            Self::TotalBudgetWarning { .. } => "total_budget_warning",
            Self::PlaceholderContent { .. } => "placeholder_content",
            Self::DuplicateId { .. } => "duplicate_id",
        }
    }

    /// Fatal violations block install and sync.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ManifestBudgetWarning { .. } | Self::TotalBudgetWarning { .. }
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { id } => write!(
                f,
                "id {id:?} must be lowercase hyphen-case and at most {MAX_ID_LEN} characters"
            ),
            Self::DescriptionTooLong { length, max } => {
                write!(f, "description is {length} characters (max {max})")
            }
            Self::ManifestBudgetWarning { tokens, ceiling } => {
                write!(f, "manifest is {tokens} tokens (budget {ceiling})")
            }
            Self::TotalBudgetWarning { tokens, ceiling } => {
                write!(f, "package is {tokens} tokens in total (budget {ceiling})")
            }
            Self::PlaceholderContent { marker, line } => {
                write!(f, "placeholder {marker} on line {line}")
            }
            Self::DuplicateId { id, existing_path } => write!(
                f,
                "id {id} is already registered at {}",
                existing_path.display()
            ),
        }
    }
}

/// Lookup of already-known package ids.
pub trait KnownPackages {
    /// Path registered for `id`, if any.
    fn registered_path(&self, id: &str) -> Option<&Path>;
}

/// No registry at all; used when validating a loose directory.
impl KnownPackages for () {
    fn registered_path(&self, _id: &str) -> Option<&Path> {
        None
    }
}

/// Pure package validator.
#[derive(Debug, Clone)]
pub struct Validator {
    manifest_ceiling: usize,
    total_ceiling: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::from_config(&BudgetConfig::default())
    }
}

impl Validator {
    #[must_use]
    pub const fn from_config(budget: &BudgetConfig) -> Self {
        Self {
            manifest_ceiling: budget.manifest_tokens,
            total_ceiling: budget.total_tokens,
        }
    }

    /// Run every check. An empty result means the package passes.
    pub fn validate(&self, package: &Package, known: &dyn KnownPackages) -> Vec<Violation> {
        let mut violations = Vec::new();

        if !is_valid_id(&package.id) {
            violations.push(Violation::InvalidName {
                id: package.id.clone(),
            });
        }

        let length = package.description.chars().count();
        if length > MAX_DESCRIPTION_LEN {
            violations.push(Violation::DescriptionTooLong {
                length,
                max: MAX_DESCRIPTION_LEN,
            });
        }

        let counts = package.token_counts;
        if counts.manifest_tokens > self.manifest_ceiling {
            violations.push(Violation::ManifestBudgetWarning {
                tokens: counts.manifest_tokens,
                ceiling: self.manifest_ceiling,
            });
        }
        if counts.total_tokens > self.total_ceiling {
            violations.push(Violation::TotalBudgetWarning {
                tokens: counts.total_tokens,
                ceiling: self.total_ceiling,
            });
        }

        violations.extend(find_placeholders(package.manifest()));

        if let Some(existing) = known.registered_path(&package.id) {
            if existing != package.path {
                violations.push(Violation::DuplicateId {
                    id: package.id.clone(),
                    existing_path: existing.to_path_buf(),
                });
            }
        }

        violations
    }
}

/// True when any violation blocks install or sync.
#[must_use]
pub fn has_fatal(violations: &[Violation]) -> bool {
    violations.iter().any(Violation::is_fatal)
}

#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    id.len() <= MAX_ID_LEN && ID_PATTERN.is_match(id)
}

/// First occurrence of each placeholder marker, outside fenced code blocks.
fn find_placeholders(manifest: &str) -> Vec<Violation> {
    let mut found: Vec<Violation> = Vec::new();
    let mut in_fence = false;
    for (idx, line) in manifest.lines().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for capture in PLACEHOLDER_PATTERN.find_iter(line) {
            let marker = capture.as_str();
            let seen = found.iter().any(|v| {
                matches!(v, Violation::PlaceholderContent { marker: m, .. } if m == marker)
            });
            if !seen {
                found.push(Violation::PlaceholderContent {
                    marker: marker.to_string(),
                    line: idx + 1,
                });
            }
        }
    }
    found
}
