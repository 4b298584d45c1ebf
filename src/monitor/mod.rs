//! Filesystem measurement: stats reading, threshold comparison, usage reporting.

pub mod fs_stats;
pub mod report;
pub mod threshold;
