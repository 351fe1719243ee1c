//! Advisory file lock around registry writes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CtlError, Result};

/// Exclusive advisory lock on `<root>/registry.lock`.
///
/// Released when dropped.
pub struct RegistryLock {
    file: File,
    lock_path: PathBuf,
}

impl RegistryLock {
    pub const LOCK_FILENAME: &'static str = "registry.lock";

    /// Try to acquire the lock without blocking.
    pub fn try_acquire(root: &Path) -> Result<Option<Self>> {
        let lock_path = root.join(Self::LOCK_FILENAME);
        fs::create_dir_all(root)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind()
                || err.kind() == io::ErrorKind::WouldBlock
            {
                return Ok(None);
            }
            return Err(err.into());
        }

        Self::write_lock_info(&file)?;
        Ok(Some(Self { file, lock_path }))
    }

    /// Acquire with timeout (polling)
    pub fn acquire_timeout(root: &Path, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            if let Some(lock) = Self::try_acquire(root)? {
                return Ok(lock);
            }
            if start.elapsed() >= timeout {
                if let Ok(Some(info)) = Self::read_lock_info(root) {
                    warn!(pid = info.pid, host = %info.hostname, "registry lock still held");
                }
                return Err(CtlError::LockTimeout(root.join(Self::LOCK_FILENAME)));
            }
            std::thread::sleep(poll_interval);
        }
    }

    fn write_lock_info(file: &File) -> io::Result<()> {
        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        };

        let mut file = file;
        file.set_len(0)?;
        let json = serde_json::to_string_pretty(&info).unwrap_or_default();
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read lock holder info
    pub fn read_lock_info(root: &Path) -> io::Result<Option<LockInfo>> {
        let lock_path = root.join(Self::LOCK_FILENAME);
        if !lock_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&lock_path)?;
        if content.is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&content).ok())
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!(path = %self.lock_path.display(), error = %err, "unlock failed");
        }
    }
}

/// Information about the lock holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub hostname: String,
}
