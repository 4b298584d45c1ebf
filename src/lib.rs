#![forbid(unsafe_code)]

//! Disk Free Guard (dfg): verify that a filesystem has a minimum amount of
//! free space and free inodes, optionally deleting listed paths first.
//!
//! Decision procedure:
//! 1. **Measure**: `statvfs` snapshot of the filesystem holding the target path
//! 2. **Compare**: whole free units and free inodes against the minimums
//! 3. **Reclaim**: delete glob matches on the same device (never in dry-run mode)
//! 4. **Re-measure**: compare again and report
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use disk_free_guard::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let request = CheckRequest {
//!     min_free: 512,
//!     ..CheckRequest::new("/var")
//! };
//! let outcome = DiskFreeCheck::new(detect_platform()?).run(&request, &mut ActivityLog::disabled());
//! println!("ok: {}", outcome.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use disk_free_guard::core::config::Config;
//! use disk_free_guard::scanner::reclaim::{Reclaimer, ReclaimPlan};
//! ```

pub mod prelude;

pub mod checker;
pub mod core;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod scanner;
