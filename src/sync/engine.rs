//! Reconciling external registry entries with their upstream sources.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::fetch::{FetchedPackage, Fetcher, SourceFetcher};
use crate::config::{Config, SyncConfig};
use crate::core::frontmatter;
use crate::core::package::Package;
use crate::core::validation::{Validator, Violation, has_fatal};
use crate::error::{CtlError, Result};
use crate::storage::registry::{RegistryEntry, RegistryIndex, RegistryStore};
use crate::utils::cancel::CancelToken;
use crate::utils::fs::{ensure_dir, hash_dir, remove_dir_atomic, swap_dir, write_files};

/// What happened to one external entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    UpToDate {
        revision: String,
    },
    Updated {
        from: Option<String>,
        to: String,
    },
    /// Upstream content failed validation; the cached copy is untouched.
    Rejected {
        reason: String,
        violations: Vec<Violation>,
    },
    FetchFailed {
        attempts: u32,
        error: String,
    },
    /// Writing the fetched content into the cache failed.
    StorageFailed {
        error: String,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryResult {
    pub id: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Local entries, which never reach the fetch stage.
    pub skipped_local: usize,
    pub results: Vec<EntryResult>,
    /// Updates written to the index by the commit step.
    pub committed: usize,
}

impl SyncReport {
    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    #[must_use]
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Updated { .. }))
    }

    #[must_use]
    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::UpToDate { .. }))
    }

    #[must_use]
    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Rejected { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::FetchFailed { .. }))
    }

    #[must_use]
    pub fn storage_failed(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::StorageFailed { .. }))
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Cancelled))
    }

    #[must_use]
    pub fn outcome(&self, id: &str) -> Option<&SyncOutcome> {
        self.results.iter().find(|r| r.id == id).map(|r| &r.outcome)
    }
}

/// Fresh upstream content already swapped into the cache, waiting for the
/// index commit.
#[derive(Debug)]
struct CacheUpdate {
    id: String,
    source: String,
    revision: String,
    content_hash: String,
    package: Package,
    declared_tier: Option<u8>,
    declared_category: Option<String>,
}

pub struct SyncEngine {
    store: RegistryStore,
    fetcher: Arc<dyn Fetcher>,
    validator: Validator,
    options: SyncConfig,
    cancel: CancelToken,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        store: RegistryStore,
        fetcher: Arc<dyn Fetcher>,
        config: &Config,
        cancel: CancelToken,
    ) -> Self {
        Self {
            store,
            fetcher,
            validator: Validator::from_config(&config.budget),
            options: config.sync.clone(),
            cancel,
        }
    }

    /// Engine using the scheme-dispatching [`SourceFetcher`].
    pub fn with_default_fetcher(
        store: RegistryStore,
        config: &Config,
        cancel: CancelToken,
    ) -> Result<Self> {
        let fetcher = SourceFetcher::new(Duration::from_secs(config.sync.timeout_secs))?;
        Ok(Self::new(store, Arc::new(fetcher), config, cancel))
    }

    /// Fetch every external entry and commit the changes in one locked
    /// index update.
    ///
    /// Per-entry problems, cache write failures included, are outcomes in
    /// the report and the remaining updates are still committed. An `Err`
    /// means the index itself could not be read or written.
    pub fn sync(&self) -> Result<SyncReport> {
        let index = self.store.load()?;
        let (local, external): (Vec<&RegistryEntry>, Vec<&RegistryEntry>) =
            index.entries().partition(|entry| entry.is_local());

        let mut report = SyncReport {
            skipped_local: local.len(),
            ..SyncReport::default()
        };
        info!(
            external = external.len(),
            skipped_local = report.skipped_local,
            concurrency = self.options.concurrency,
            "sync started"
        );
        if external.is_empty() {
            return Ok(report);
        }
        ensure_dir(self.store.root().join(RegistryStore::CACHE_DIRNAME))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency.max(1))
            .thread_name(|i| format!("skillctl-sync-{i}"))
            .build()
            .map_err(|err| CtlError::Storage(format!("sync worker pool: {err}")))?;

        let done = Mutex::new(0usize);
        let total = external.len();
        let results: Vec<(String, Result<(SyncOutcome, Option<CacheUpdate>)>)> = pool.install(|| {
            external
                .par_iter()
                .map(|entry| {
                    let result = self.sync_entry(entry, &index);
                    let mut done = done.lock();
                    *done += 1;
                    debug!(package = %entry.id, done = *done, total, "sync progress");
                    (entry.id.clone(), result)
                })
                .collect()
        });

        let mut updates = Vec::new();
        for (id, result) in results {
            match result {
                Ok((outcome, update)) => {
                    updates.extend(update);
                    report.results.push(EntryResult { id, outcome });
                }
                Err(err) => {
                    warn!(package = %id, error = %err, "sync storage failure");
                    report.results.push(EntryResult {
                        id,
                        outcome: SyncOutcome::StorageFailed {
                            error: err.to_string(),
                        },
                    });
                }
            }
        }

        report.committed = self.commit(updates)?;
        info!(
            updated = report.updated(),
            up_to_date = report.up_to_date(),
            rejected = report.rejected(),
            failed = report.failed(),
            storage_failed = report.storage_failed(),
            cancelled = report.cancelled(),
            "sync finished"
        );
        Ok(report)
    }

    fn sync_entry(
        &self,
        entry: &RegistryEntry,
        index: &RegistryIndex,
    ) -> Result<(SyncOutcome, Option<CacheUpdate>)> {
        if self.cancel.is_cancelled() {
            return Ok((SyncOutcome::Cancelled, None));
        }
        let Some(source) = entry.provenance.upstream_source() else {
            return Ok((
                SyncOutcome::FetchFailed {
                    attempts: 0,
                    error: "no upstream source".to_string(),
                },
                None,
            ));
        };

        let fetched = match self.fetch_with_retry(&entry.id, source) {
            Ok(fetched) => fetched,
            Err((_, CtlError::Cancelled)) => return Ok((SyncOutcome::Cancelled, None)),
            Err((attempts, err)) => {
                warn!(package = %entry.id, attempts, error = %err, "fetch failed");
                return Ok((
                    SyncOutcome::FetchFailed {
                        attempts,
                        error: err.to_string(),
                    },
                    None,
                ));
            }
        };

        let previous = entry.provenance.upstream_revision().map(str::to_string);
        let cache_path = self.store.cache_path(&entry.id);
        if previous.as_deref() == Some(fetched.revision.as_str()) && cache_path.is_dir() {
            debug!(package = %entry.id, revision = %fetched.revision, "up to date");
            return Ok((
                SyncOutcome::UpToDate {
                    revision: fetched.revision,
                },
                None,
            ));
        }

        let cache_root = cache_path
            .parent()
            .ok_or_else(|| CtlError::Storage(format!("bad cache path {}", cache_path.display())))?;
        // Removed on drop unless it is swapped into place below.
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-", entry.id))
            .tempdir_in(cache_root)?;
        write_files(staging.path(), &fetched.files)?;

        let package = match Package::load(staging.path(), entry.provenance.clone()) {
            Ok(package) => package.with_path(cache_path.clone()),
            Err(err) => return Ok((reject(&entry.id, err.to_string(), Vec::new()), None)),
        };
        if package.id != entry.id {
            let reason = format!("upstream manifest names {}, expected {}", package.id, entry.id);
            return Ok((reject(&entry.id, reason, Vec::new()), None));
        }
        let violations = self.validator.validate(&package, index);
        if has_fatal(&violations) {
            return Ok((
                reject(&entry.id, "validation failed".to_string(), violations),
                None,
            ));
        }

        let (declared_tier, declared_category) = frontmatter::parse(package.manifest())
            .map(|(fm, _)| (fm.tier(), fm.category().map(str::to_string)))
            .unwrap_or_default();
        let content_hash = hash_dir(staging.path())?;

        if self.cancel.is_cancelled() {
            return Ok((SyncOutcome::Cancelled, None));
        }
        let staged = staging.keep();
        if let Err(err) = swap_dir(&staged, &cache_path, true) {
            if let Err(cleanup) = std::fs::remove_dir_all(&staged) {
                warn!(path = %staged.display(), error = %cleanup, "failed to remove staging dir");
            }
            return Err(err);
        }
        info!(
            package = %entry.id,
            from = previous.as_deref().unwrap_or("-"),
            to = %fetched.revision,
            "updated cached copy"
        );

        Ok((
            SyncOutcome::Updated {
                from: previous,
                to: fetched.revision.clone(),
            },
            Some(CacheUpdate {
                id: entry.id.clone(),
                source: source.to_string(),
                revision: fetched.revision,
                content_hash,
                package,
                declared_tier,
                declared_category,
            }),
        ))
    }

    /// Fetch with linear backoff on transient errors.
    fn fetch_with_retry(
        &self,
        id: &str,
        source: &str,
    ) -> std::result::Result<FetchedPackage, (u32, CtlError)> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetcher.fetch(source) {
                Ok(fetched) => return Ok(fetched),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = Duration::from_millis(
                        self.options.backoff_ms.saturating_mul(u64::from(attempt)),
                    );
                    debug!(package = id, attempt, error = %err, ?delay, "retrying fetch");
                    std::thread::sleep(delay);
                    if self.cancel.is_cancelled() {
                        return Err((attempt, CtlError::Cancelled));
                    }
                    attempt += 1;
                }
                Err(err) => return Err((attempt, err)),
            }
        }
    }

    /// Apply finished updates to the index under the registry lock.
    fn commit(&self, updates: Vec<CacheUpdate>) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let mut orphaned = Vec::new();
        let applied = self.store.update(|index| {
            let mut applied = 0;
            for update in updates {
                let Some(entry) = index.get_mut(&update.id) else {
                    warn!(package = %update.id, "entry removed during sync; dropping update");
                    orphaned.push(update.id);
                    continue;
                };
                if entry.is_local() || entry.provenance.upstream_source() != Some(update.source.as_str()) {
                    warn!(package = %update.id, "entry changed during sync; dropping update");
                    continue;
                }
                let package = update.package;
                entry.provenance = entry.provenance.clone().synced(update.revision, now);
                entry.content_hash = update.content_hash;
                entry.path = package.path;
                entry.description = package.description;
                entry.allowed_capabilities = package.allowed_capabilities;
                entry.requires = package.requires;
                if let Some(tier) = update.declared_tier {
                    entry.tier = tier;
                }
                if let Some(category) = update.declared_category {
                    entry.category = category;
                }
                applied += 1;
            }
            Ok(applied)
        })?;

        for id in orphaned {
            let cache = self.store.cache_path(&id);
            if cache.exists() {
                if let Err(err) = remove_dir_atomic(&cache) {
                    warn!(package = %id, error = %err, "failed to remove orphaned cache");
                }
            }
        }
        Ok(applied)
    }
}

fn reject(id: &str, reason: String, violations: Vec<Violation>) -> SyncOutcome {
    warn!(package = id, %reason, "upstream content rejected");
    SyncOutcome::Rejected { reason, violations }
}
