//! DFG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, DfgError>;

/// Top-level error type for disk_free_guard.
#[derive(Debug, Error)]
pub enum DfgError {
    #[error("[DFG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[DFG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[DFG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DFG-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[DFG-2001] filesystem stats failure for {path}: {details}")]
    FsStats { path: PathBuf, details: String },

    #[error("[DFG-2002] usage undefined for {what}: filesystem reports a total of zero")]
    Arithmetic { what: &'static str },

    #[error("[DFG-2003] invalid glob pattern {pattern:?}: {details}")]
    InvalidGlob { pattern: String, details: String },

    #[error("[DFG-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[DFG-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[DFG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[DFG-3003] reclaim aborted after removing {}: {source}", count_entries(.removed.len()))]
    Reclaim {
        removed: Vec<PathBuf>,
        #[source]
        source: Box<DfgError>,
    },
}

impl DfgError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "DFG-1001",
            Self::MissingConfig { .. } => "DFG-1002",
            Self::ConfigParse { .. } => "DFG-1003",
            Self::UnsupportedPlatform { .. } => "DFG-1101",
            Self::FsStats { .. } => "DFG-2001",
            Self::Arithmetic { .. } => "DFG-2002",
            Self::InvalidGlob { .. } => "DFG-2003",
            Self::Serialization { .. } => "DFG-2101",
            Self::PermissionDenied { .. } => "DFG-3001",
            Self::Io { .. } => "DFG-3002",
            Self::Reclaim { .. } => "DFG-3003",
        }
    }

    /// Paths already removed when this error interrupted a reclaim pass.
    #[must_use]
    pub fn removed_paths(&self) -> &[PathBuf] {
        match self {
            Self::Reclaim { removed, .. } => removed,
            _ => &[],
        }
    }

    /// True when the underlying IO error says the entry does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Convenience constructor for IO errors with a known path.
    ///
    /// `PermissionDenied` IO errors are mapped to the dedicated variant.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied { path };
        }
        Self::Io { path, source }
    }
}

fn count_entries(n: usize) -> String {
    if n == 1 {
        "1 entry".to_string()
    } else {
        format!("{n} entries")
    }
}

impl From<serde_json::Error> for DfgError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for DfgError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
