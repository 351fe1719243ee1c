//! Typed view of the YAML frontmatter at the top of `SKILL.md`.
//!
//! Only the handful of fields the catalog acts on are modeled; everything
//! else in the frontmatter is ignored.

use serde::Deserialize;

/// Frontmatter fields understood by the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Frontmatter {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub allowed_tools: Option<CapabilityList>,
    #[serde(default)]
    pub tier: Option<u8>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub metadata: Option<FrontmatterMetadata>,
}

/// Nested `metadata:` block some skills use for classification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontmatterMetadata {
    #[serde(default)]
    pub tier: Option<u8>,
    #[serde(default)]
    pub category: Option<String>,
}

/// `allowed-tools` is written either as a YAML list or an inline string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CapabilityList {
    List(Vec<String>),
    Inline(String),
}

impl CapabilityList {
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Inline(text) => text
                .split(|c: char| c == ',' || c.is_whitespace())
                .collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Frontmatter {
    /// Top-level `tier` wins over `metadata.tier`.
    #[must_use]
    pub fn tier(&self) -> Option<u8> {
        self.tier
            .or_else(|| self.metadata.as_ref().and_then(|meta| meta.tier))
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.category.as_deref()))
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Split a manifest into its YAML frontmatter and Markdown body.
///
/// Returns `None` when the manifest has no opening `---` line or the block
/// is never closed.
#[must_use]
pub fn split(content: &str) -> Option<(&str, &str)> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

/// Parse the frontmatter of a manifest.
pub fn parse(content: &str) -> std::result::Result<(Frontmatter, &str), String> {
    let (yaml, body) = split(content).ok_or_else(|| {
        "manifest must start with a `---` delimited YAML frontmatter block".to_string()
    })?;
    let frontmatter: Frontmatter =
        serde_yaml::from_str(yaml).map_err(|err| format!("frontmatter: {err}"))?;
    Ok((frontmatter, body))
}
