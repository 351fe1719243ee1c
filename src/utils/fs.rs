//! Filesystem utilities.
//!
//! Helpers for walking package trees, hashing their contents and moving
//! whole directories into place without ever exposing a half-written one.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{CtlError, Result};
use crate::install::MARKER_FILE;
use crate::utils::cancel::CancelToken;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Read a file to string, returning None if it doesn't exist.
pub fn read_optional(path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = path.as_ref();
    if path.exists() {
        Ok(Some(std::fs::read_to_string(path)?))
    } else {
        Ok(None)
    }
}

/// Any dot-file or dot-directory along the path.
#[must_use]
pub fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|part| part.as_os_str().to_string_lossy().starts_with('.'))
}

const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Version-control metadata and the install marker are never package content.
#[must_use]
pub fn is_tool_state(relative: &Path) -> bool {
    if relative.as_os_str() == MARKER_FILE {
        return true;
    }
    relative
        .components()
        .any(|part| VCS_DIRS.iter().any(|vcs| part.as_os_str() == *vcs))
}

/// Regular files of a package, relative to `dir`, sorted.
pub fn package_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|err| {
            CtlError::Storage(format!("walk {}: {err}", dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        if is_tool_state(relative) {
            continue;
        }
        files.push(relative.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// SHA-256 over relative paths and contents of every package file.
pub fn hash_dir(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for relative in package_files(dir)? {
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(dir.join(&relative))?);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of in-memory `(relative path, bytes)` pairs, matching [`hash_dir`].
#[must_use]
pub fn hash_files(files: &[(PathBuf, Vec<u8>)]) -> String {
    let mut sorted: Vec<&(PathBuf, Vec<u8>)> = files.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut hasher = Sha256::new();
    for (relative, bytes) in sorted {
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(bytes);
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Copy package files from `src` into the existing directory `dst`.
///
/// Checks `cancel` before every file.
pub fn copy_package(src: &Path, dst: &Path, cancel: &CancelToken) -> Result<usize> {
    let files = package_files(src)?;
    for relative in &files {
        cancel.check()?;
        let target = dst.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src.join(relative), &target)?;
    }
    Ok(files.len())
}

/// Write `(relative path, bytes)` pairs under `dst`.
pub fn write_files(dst: &Path, files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    for (relative, bytes) in files {
        let target = safe_join(dst, relative)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, bytes)?;
    }
    Ok(())
}

/// Join a relative path, refusing anything that would land outside `root`.
pub fn safe_join(root: &Path, relative: &Path) -> Result<PathBuf> {
    use std::path::Component;
    let escapes = relative.components().any(|part| {
        matches!(
            part,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || relative.as_os_str().is_empty() {
        return Err(CtlError::Storage(format!(
            "refusing path outside package: {}",
            relative.display()
        )));
    }
    Ok(root.join(relative))
}

/// Move a fully staged directory to `dest`.
///
/// `dest` must not exist unless `replace` is set. When replacing, the old
/// directory is renamed aside first and restored if the final rename fails,
/// so `dest` is always either the old tree or the new one.
pub fn swap_dir(staged: &Path, dest: &Path, replace: bool) -> Result<()> {
    if !dest.exists() {
        std::fs::rename(staged, dest)?;
        return Ok(());
    }
    if !replace {
        return Err(CtlError::Storage(format!(
            "{} already exists",
            dest.display()
        )));
    }

    let aside = aside_path(dest);
    std::fs::rename(dest, &aside)?;
    if let Err(err) = std::fs::rename(staged, dest) {
        std::fs::rename(&aside, dest)?;
        return Err(err.into());
    }
    if let Err(err) = std::fs::remove_dir_all(&aside) {
        tracing::warn!(path = %aside.display(), error = %err, "failed to remove replaced directory");
    }
    Ok(())
}

/// Rename `dir` aside, then delete it.
pub fn remove_dir_atomic(dir: &Path) -> Result<()> {
    let aside = aside_path(dir);
    std::fs::rename(dir, &aside)?;
    std::fs::remove_dir_all(&aside)?;
    Ok(())
}

fn aside_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.old-{}", uuid::Uuid::new_v4().simple()))
}

/// Write a file by writing a sibling temp file and renaming it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|err| CtlError::Storage(format!("persist {}: {}", path.display(), err.error)))?;
    Ok(())
}
