//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use disk_free_guard::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{DfgError, Result};
pub use crate::core::units::Unit;

// Platform
pub use crate::platform::pal::{EntryKind, FsStats, HostPlatform, Platform, detect_platform};

// Monitor
pub use crate::monitor::fs_stats::FsStatsReader;
pub use crate::monitor::report::{UsageReport, UsageStat};
pub use crate::monitor::threshold::satisfies;

// Scanner
pub use crate::scanner::glob::GlobPattern;
pub use crate::scanner::reclaim::{ReclaimPlan, ReclaimReport, Reclaimer, SkipReason};

// Logger
pub use crate::logger::activity::ActivityLog;

// Checker
pub use crate::checker::{CheckFailure, CheckOutcome, CheckRequest, DiskFreeCheck, FailureKind};
