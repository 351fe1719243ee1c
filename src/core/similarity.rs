//! Near-duplicate code scanner
//!
//! Flags code blocks that look alike using two cheap structural signals:
//! declared names (functions, classes, structs, ...) and the set of imported
//! modules. Markdown files contribute each fenced code block as a separate
//! unit; other files are one unit each. Results are advisory and ranked; the
//! scanner only reads files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Default score at or above which a pair is reported
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

const SIGNATURE_WEIGHT: f32 = 0.6;
const IMPORT_WEIGHT: f32 = 0.4;

static SIGNATURE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:fn|def|class|function|struct|trait|interface|enum|func)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("valid signature regex")
});

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:use\s+([A-Za-z0-9_:]+)|import\s+.*\s+from\s+['"]([^'"]+)['"]|import\s+([A-Za-z0-9_.]+)|from\s+([A-Za-z0-9_.]+)\s+import|.*require\(\s*['"]([^'"]+)['"]\s*\))"#,
    )
    .expect("valid import regex")
});

/// A block of code with its structural fingerprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeUnit {
    pub file: PathBuf,
    /// 1-indexed line where the unit starts
    pub line: usize,
    pub signatures: BTreeSet<String>,
    pub imports: BTreeSet<String>,
}

impl CodeUnit {
    fn from_text(file: &Path, line: usize, text: &str) -> Self {
        let signatures = SIGNATURE_PATTERN
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect();
        let imports = IMPORT_PATTERN
            .captures_iter(text)
            .filter_map(|caps| caps.iter().skip(1).flatten().next())
            .map(|m| m.as_str().trim_end_matches("::*").to_string())
            .collect();
        Self {
            file: file.to_path_buf(),
            line,
            signatures,
            imports,
        }
    }

    fn is_empty(&self) -> bool {
        self.signatures.is_empty() && self.imports.is_empty()
    }

    /// `path:line` label
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}:{}", self.file.display(), self.line)
    }
}

/// Recommended follow-up for a candidate pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityRecommendation {
    /// Almost the same shape; likely copy-paste
    Consolidate,
    /// Worth a manual look
    Review,
    /// Shares some structure
    Related,
}

/// A candidate near-duplicate pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub a: String,
    pub b: String,
    /// Weighted score (0.0 - 1.0)
    pub score: f32,
    pub signature_overlap: f32,
    pub import_overlap: f32,
    pub common_signatures: Vec<String>,
    pub recommendation: SimilarityRecommendation,
}

pub struct SimilarityScanner {
    threshold: f32,
}

impl Default for SimilarityScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityScanner {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Read and fingerprint files. Unreadable or binary files are skipped.
    pub fn collect_units(&self, files: &[PathBuf]) -> Result<Vec<CodeUnit>> {
        let mut units = Vec::new();
        for file in files {
            let Ok(text) = std::fs::read_to_string(file) else {
                debug!(file = %file.display(), "skipping unreadable file");
                continue;
            };
            units.extend(units_for(file, &text));
        }
        Ok(units)
    }

    /// Scan files and return candidate pairs, best first.
    pub fn scan(&self, files: &[PathBuf]) -> Result<Vec<SimilarityMatch>> {
        let units = self.collect_units(files)?;
        Ok(self.compare_units(&units))
    }

    #[must_use]
    pub fn compare_units(&self, units: &[CodeUnit]) -> Vec<SimilarityMatch> {
        let mut matches = Vec::new();
        for (i, a) in units.iter().enumerate() {
            for b in &units[i + 1..] {
                if let Some(found) = self.compare(a, b) {
                    matches.push(found);
                }
            }
        }

        matches.sort_by(|x, y| {
            y.score
                .partial_cmp(&x.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.a.cmp(&y.a))
                .then_with(|| x.b.cmp(&y.b))
        });
        matches
    }

    fn compare(&self, a: &CodeUnit, b: &CodeUnit) -> Option<SimilarityMatch> {
        let signature_overlap = jaccard(&a.signatures, &b.signatures);
        let import_overlap = jaccard(&a.imports, &b.imports);
        let score = SIGNATURE_WEIGHT.mul_add(signature_overlap, IMPORT_WEIGHT * import_overlap);
        if score < self.threshold || score <= 0.0 {
            return None;
        }
        Some(SimilarityMatch {
            a: a.location(),
            b: b.location(),
            score,
            signature_overlap,
            import_overlap,
            common_signatures: a.signatures.intersection(&b.signatures).cloned().collect(),
            recommendation: recommend(score),
        })
    }
}

fn recommend(score: f32) -> SimilarityRecommendation {
    if score >= 0.9 {
        SimilarityRecommendation::Consolidate
    } else if score >= 0.7 {
        SimilarityRecommendation::Review
    } else {
        SimilarityRecommendation::Related
    }
}

fn units_for(file: &Path, text: &str) -> Vec<CodeUnit> {
    let is_markdown = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if !is_markdown {
        let unit = CodeUnit::from_text(file, 1, text);
        return if unit.is_empty() { Vec::new() } else { vec![unit] };
    }

    let mut units = Vec::new();
    let mut block: Option<(usize, String)> = None;
    for (idx, line) in text.lines().enumerate() {
        if line.trim_start().starts_with("```") {
            match block.take() {
                Some((start, body)) => {
                    let unit = CodeUnit::from_text(file, start, &body);
                    if !unit.is_empty() {
                        units.push(unit);
                    }
                }
                None => block = Some((idx + 2, String::new())),
            }
            continue;
        }
        if let Some((_, body)) = block.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    units
}

/// Jaccard index; two empty sets share nothing.
#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
