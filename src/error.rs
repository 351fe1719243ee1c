//! Error types for skillctl.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::validation::Violation;

pub type Result<T> = std::result::Result<T, CtlError>;

#[derive(Debug, Error)]
pub enum CtlError {
    #[error("invalid package at {}: {reason}", .path.display())]
    InvalidPackage {
        id: Option<String>,
        path: PathBuf,
        reason: String,
    },

    #[error("validation failed for {id}: {}", summarize(.violations))]
    ValidationFailed { id: String, violations: Vec<Violation> },

    #[error("dependency cycle between {}", .nodes.join(", "))]
    GraphCycle { nodes: Vec<String> },

    #[error("required edge {source_id} -> {target} points at an unknown node")]
    DanglingEdge { source_id: String, target: String },

    #[error("{id} is already installed at {} (use --force to replace)", .path.display())]
    AlreadyExists { id: String, path: PathBuf },

    #[error("not found: {message}")]
    NotFound { id: Option<String>, message: String },

    #[error("network error fetching {source_url}: {message}")]
    Network {
        id: Option<String>,
        source_url: String,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("timed out waiting for registry lock at {}", .0.display())]
    LockTimeout(PathBuf),

    #[error("operation cancelled")]
    Cancelled,
}

impl CtlError {
    /// A missing file, directory or upstream that no package id names yet.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            id: None,
            message: message.into(),
        }
    }

    /// A registered or requested package that could not be found.
    pub fn package_not_found(id: &str, message: impl Into<String>) -> Self {
        Self::NotFound {
            id: Some(id.to_string()),
            message: message.into(),
        }
    }

    /// Attach the package id to failures raised below the layer that knows it.
    #[must_use]
    pub fn for_package(mut self, package: &str) -> Self {
        match &mut self {
            Self::InvalidPackage { id, .. }
            | Self::NotFound { id, .. }
            | Self::Network { id, .. } => {
                if id.is_none() {
                    *id = Some(package.to_string());
                }
            }
            _ => {}
        }
        self
    }

    /// Machine-stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPackage { .. } => "invalid_package",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::GraphCycle { .. } => "graph_cycle",
            Self::DanglingEdge { .. } => "dangling_edge",
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotFound { .. } => "not_found",
            Self::Network { .. } => "network_error",
            Self::Storage(_) | Self::Io(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::Config(_) => "config_error",
            Self::LockTimeout(_) => "lock_timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Process exit code for this failure class.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ValidationFailed { .. } => 2,
            Self::AlreadyExists { .. } => 3,
            Self::NotFound { .. } => 4,
            _ => 1,
        }
    }

    /// Only network failures are worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Package id the failure concerns, when there is one.
    #[must_use]
    pub fn package_id(&self) -> Option<&str> {
        match self {
            Self::ValidationFailed { id, .. } | Self::AlreadyExists { id, .. } => Some(id),
            Self::InvalidPackage { id, .. }
            | Self::NotFound { id, .. }
            | Self::Network { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .filter(|v| v.is_fatal())
        .map(|v| v.code())
        .collect::<Vec<_>>()
        .join(", ")
}
