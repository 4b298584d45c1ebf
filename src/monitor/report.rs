//! Usage report: a stats snapshot scaled to the requested unit, plus the
//! changed flag.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{DfgError, Result};
use crate::core::units::Unit;
use crate::platform::pal::FsStats;

/// Figures reported for a filesystem. Space is in whole units, inodes are raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStat {
    pub free: u64,
    pub size: u64,
    /// Percent of space in use, 0..=100.
    pub usage: u8,
    pub inode_free: u64,
    pub inode_count: u64,
    /// Percent of inodes in use, 0..=100.
    pub inode_usage: u8,
}

/// `{ "changed": bool, "stat": { ... } }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub changed: bool,
    pub stat: UsageStat,
}

impl UsageReport {
    /// Scale `stats` into `unit` and compute usage percentages.
    ///
    /// Fails with [`DfgError::Arithmetic`] when the filesystem reports zero
    /// total bytes or zero total inodes, since usage is undefined there.
    pub fn build(changed: bool, stats: &FsStats, unit: Unit) -> Result<Self> {
        if stats.total_bytes == 0 {
            return Err(DfgError::Arithmetic { what: "space" });
        }
        if stats.total_inodes == 0 {
            return Err(DfgError::Arithmetic { what: "inodes" });
        }
        Ok(Self {
            changed,
            stat: UsageStat {
                free: unit.whole_units(stats.free_bytes),
                size: unit.whole_units(stats.total_bytes),
                usage: used_percent(stats.free_bytes, stats.total_bytes),
                inode_free: stats.free_inodes,
                inode_count: stats.total_inodes,
                inode_usage: used_percent(stats.free_inodes, stats.total_inodes),
            },
        })
    }
}

/// `100 - floor(free / total * 100)` in double precision.
///
/// The multiply-after-divide order is kept as is: 29/100 yields 72, not 71.
fn used_percent(free: u64, total: u64) -> u8 {
    let free_pct = (free as f64 / total as f64 * 100.0).floor();
    (100.0 - free_pct).clamp(0.0, 100.0) as u8
}
