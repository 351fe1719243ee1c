//! Token measurement for skill packages.
//!
//! Counts are an estimate (~4 characters per token), which is what budget
//! enforcement needs: a stable, cheap measure that tracks prompt size.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::fs::package_files;

/// Measured token counts for one package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub manifest_tokens: usize,
    pub total_tokens: usize,
}

/// Estimate token count from text (rough: ~4 chars per token, rounded up).
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Measure a package directory.
///
/// The manifest count covers `manifest` only. The total covers every text
/// file in the package; files that are not valid UTF-8 are skipped.
pub fn measure_package(dir: &Path, manifest: &str) -> Result<TokenCounts> {
    let manifest_tokens = estimate_tokens(manifest);
    let mut total_tokens = 0usize;
    for relative in package_files(dir)? {
        let bytes = std::fs::read(dir.join(&relative))?;
        if let Ok(text) = std::str::from_utf8(&bytes) {
            total_tokens += estimate_tokens(text);
        }
    }
    Ok(TokenCounts {
        manifest_tokens,
        total_tokens: total_tokens.max(manifest_tokens),
    })
}
