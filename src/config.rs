use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CtlError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl Config {
    /// Layered load: defaults, then the explicit file (or global and project
    /// files), then `SKILLCTL_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKILLCTL_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("skillctl/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        let path = root.join("config.toml");
        Self::load_patch(&path)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| CtlError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| CtlError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.catalog {
            self.catalog.merge(patch);
        }
        if let Some(patch) = patch.install {
            self.install.merge(patch);
        }
        if let Some(patch) = patch.budget {
            self.budget.merge(patch);
        }
        if let Some(patch) = patch.sync {
            self.sync.merge(patch);
        }
        if let Some(patch) = patch.dedup {
            self.dedup.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(values) = env_list("SKILLCTL_LOCAL_PATHS") {
            self.catalog.local_paths = merge_unique(values, &self.catalog.local_paths);
        }

        if let Some(value) = env_string("SKILLCTL_USER_DIR") {
            self.install.user_dir = value;
        }
        if let Some(value) = env_string("SKILLCTL_PROJECT_DIR") {
            self.install.project_dir = value;
        }

        if let Some(value) = env_usize("SKILLCTL_BUDGET_MANIFEST_TOKENS")? {
            self.budget.manifest_tokens = value;
        }
        if let Some(value) = env_usize("SKILLCTL_BUDGET_TOTAL_TOKENS")? {
            self.budget.total_tokens = value;
        }

        if let Some(value) = env_usize("SKILLCTL_SYNC_CONCURRENCY")? {
            self.sync.concurrency = value;
        }
        if let Some(value) = env_u32("SKILLCTL_SYNC_MAX_ATTEMPTS")? {
            self.sync.max_attempts = value;
        }
        if let Some(value) = env_u64("SKILLCTL_SYNC_BACKOFF_MS")? {
            self.sync.backoff_ms = value;
        }
        if let Some(value) = env_u64("SKILLCTL_SYNC_TIMEOUT_SECS")? {
            self.sync.timeout_secs = value;
        }
        if let Some(value) = env_u64("SKILLCTL_LOCK_TIMEOUT_MS")? {
            self.sync.lock_timeout_ms = value;
        }

        if let Some(value) = env_f32("SKILLCTL_DEDUP_THRESHOLD")? {
            self.dedup.threshold = value;
        }

        Ok(())
    }

    /// Directory for `--user` installs.
    #[must_use]
    pub fn user_target(&self) -> PathBuf {
        expand_path(&self.install.user_dir)
    }

    /// Directory for `--project` installs, relative to the working directory
    /// unless configured as absolute.
    #[must_use]
    pub fn project_target(&self) -> PathBuf {
        expand_path(&self.install.project_dir)
    }

    #[must_use]
    pub fn local_paths(&self) -> Vec<PathBuf> {
        self.catalog
            .local_paths
            .iter()
            .map(|p| expand_path(p))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directories scanned for locally authored skills
    #[serde(default)]
    pub local_paths: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            local_paths: vec!["skills".to_string()],
        }
    }
}

impl CatalogConfig {
    fn merge(&mut self, patch: CatalogPatch) {
        if let Some(values) = patch.local_paths {
            self.local_paths = merge_unique(values, &self.local_paths);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default)]
    pub user_dir: String,
    #[serde(default)]
    pub project_dir: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            user_dir: "~/.claude/skills".to_string(),
            project_dir: ".claude/skills".to_string(),
        }
    }
}

impl InstallConfig {
    fn merge(&mut self, patch: InstallPatch) {
        if let Some(value) = patch.user_dir {
            self.user_dir = value;
        }
        if let Some(value) = patch.project_dir {
            self.project_dir = value;
        }
    }
}

/// Soft token ceilings; exceeding them warns but never blocks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default)]
    pub manifest_tokens: usize,
    #[serde(default)]
    pub total_tokens: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            manifest_tokens: 5000,
            total_tokens: 15000,
        }
    }
}

impl BudgetConfig {
    fn merge(&mut self, patch: BudgetPatch) {
        if let Some(value) = patch.manifest_tokens {
            self.manifest_tokens = value;
        }
        if let Some(value) = patch.total_tokens {
            self.total_tokens = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upstream fetches in flight at once
    #[serde(default)]
    pub concurrency: usize,
    /// Attempts per entry for transient network failures
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_ms: u64,
    #[serde(default)]
    pub timeout_secs: u64,
    /// How long to wait for the registry lock
    #[serde(default)]
    pub lock_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            backoff_ms: 250,
            timeout_secs: 30,
            lock_timeout_ms: 10_000,
        }
    }
}

impl SyncConfig {
    fn merge(&mut self, patch: SyncPatch) {
        if let Some(value) = patch.concurrency {
            self.concurrency = value;
        }
        if let Some(value) = patch.max_attempts {
            self.max_attempts = value;
        }
        if let Some(value) = patch.backoff_ms {
            self.backoff_ms = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
        if let Some(value) = patch.lock_timeout_ms {
            self.lock_timeout_ms = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: crate::core::similarity::DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl DedupConfig {
    fn merge(&mut self, patch: DedupPatch) {
        if let Some(value) = patch.threshold {
            self.threshold = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub catalog: Option<CatalogPatch>,
    pub install: Option<InstallPatch>,
    pub budget: Option<BudgetPatch>,
    pub sync: Option<SyncPatch>,
    pub dedup: Option<DedupPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogPatch {
    pub local_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InstallPatch {
    pub user_dir: Option<String>,
    pub project_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BudgetPatch {
    pub manifest_tokens: Option<usize>,
    pub total_tokens: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SyncPatch {
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub lock_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DedupPatch {
    pub threshold: Option<f32>,
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_path(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| CtlError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    env_parse(key)
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    env_parse(key)
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    env_parse(key)
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    env_parse(key)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
}
