//! Filesystem statistics reader: fresh `statvfs` snapshot on every call.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use crate::core::errors::{DfgError, Result};
use crate::platform::pal::{FsStats, Platform};

/// Uncached stats reader. Every `measure` hits the platform so a re-check
/// after reclaiming sees the new figures.
pub struct FsStatsReader {
    platform: Arc<dyn Platform>,
}

impl FsStatsReader {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    pub fn measure(&self, path: &Path) -> Result<FsStats> {
        self.platform.fs_stats(path).map_err(|err| match err {
            DfgError::FsStats { .. } => err,
            other => DfgError::FsStats {
                path: path.to_path_buf(),
                details: other.to_string(),
            },
        })
    }
}
