//! Install marker written into every directory skillctl installs.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TargetKind;
use crate::error::{CtlError, Result};
use crate::utils::fs::{read_optional, write_atomic};

/// File name of the marker inside an installed package directory.
pub const MARKER_FILE: &str = ".skillctl-install.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMarker {
    pub package_id: String,
    pub target_kind: TargetKind,
    pub installed_at: DateTime<Utc>,
    pub content_hash: String,
    pub tool_version: String,
}

impl InstallMarker {
    #[must_use]
    pub fn new(package_id: impl Into<String>, target_kind: TargetKind, content_hash: String) -> Self {
        Self {
            package_id: package_id.into(),
            target_kind,
            installed_at: Utc::now(),
            content_hash,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| CtlError::Serialization(format!("serialize install marker: {err}")))?;
        write_atomic(&dir.join(MARKER_FILE), json.as_bytes())
    }

    /// Marker of an installed directory, `None` when skillctl did not
    /// create it.
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MARKER_FILE);
        let Some(raw) = read_optional(&path)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| CtlError::Serialization(format!("parse {}: {err}", path.display())))
    }
}
