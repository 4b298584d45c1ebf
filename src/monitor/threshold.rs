//! Threshold comparison of a stats snapshot against minimum free space and inodes.

use crate::core::units::Unit;
use crate::platform::pal::FsStats;

/// True when `stats` has at least `min_free` whole `unit`s and at least
/// `min_ifree` inodes available.
///
/// Free space is truncated to whole units before comparing, so 1.9 GiB free
/// does not satisfy a 2 GiB minimum.
#[must_use]
pub fn satisfies(stats: &FsStats, unit: Unit, min_free: u64, min_ifree: u64) -> bool {
    unit.whole_units(stats.free_bytes) >= min_free && stats.free_inodes >= min_ifree
}
