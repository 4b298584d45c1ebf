//! Reclaimer: resolves delete patterns into entries on the anchor device,
//! then removes them.
//!
//! Pipeline: patterns -> glob expansion -> device/type filter (`plan`, no side
//! effects) -> remove in discovery order (`execute`) -> report.
//!
//! Safety rules applied while planning:
//! 1. Matches on a device other than the anchor's are never touched. For a
//!    symlink both the link and its target must be on the anchor device.
//! 2. The filesystem root is never a candidate.
//! 3. Sockets, FIFOs and device nodes are skipped.
//!
//! The first removal failure aborts the pass. There is no rollback and no retry.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::errors::{DfgError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLog};
use crate::platform::pal::{EntryKind, Platform};

// ──────────────────── report types ────────────────────

/// Reason a glob match was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OtherDevice,
    UnsupportedType,
    FilesystemRoot,
    /// Gone by the time removal reached it (e.g. inside an already removed directory).
    Vanished,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OtherDevice => "different device",
            Self::UnsupportedType => "neither file nor directory",
            Self::FilesystemRoot => "filesystem root",
            Self::Vanished => "no longer exists",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// An entry scheduled for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Plan produced before anything is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimPlan {
    pub anchor_device: u64,
    /// Candidates in discovery order. Duplicate matches are kept.
    pub candidates: Vec<Candidate>,
    pub skipped: Vec<SkippedEntry>,
}

impl ReclaimPlan {
    /// Candidate paths, in the order `execute` would visit them.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.candidates.iter().map(|c| c.path.clone()).collect()
    }
}

/// Summary after a reclaim pass completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub removed: Vec<PathBuf>,
    pub skipped: Vec<SkippedEntry>,
}

impl ReclaimReport {
    /// True if at least one entry was removed.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

// ──────────────────── reclaimer ────────────────────

/// Removes pattern matches through an injected [`Platform`].
pub struct Reclaimer<'a> {
    platform: &'a dyn Platform,
}

impl<'a> Reclaimer<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        Self { platform }
    }

    /// Resolve `patterns` against the filesystem without modifying it.
    ///
    /// Fails if the anchor or any match cannot be inspected, so a broken
    /// match (such as a dangling symlink) stops the pass before any removal.
    pub fn plan(&self, anchor: &Path, patterns: &[String]) -> Result<ReclaimPlan> {
        let anchor_device = self.platform.device_id(anchor)?;
        let mut plan = ReclaimPlan {
            anchor_device,
            candidates: Vec::new(),
            skipped: Vec::new(),
        };

        for pattern in patterns {
            for path in self.platform.expand_glob(pattern)? {
                if path.parent().is_none() && path.has_root() {
                    plan.skipped.push(SkippedEntry {
                        path,
                        reason: SkipReason::FilesystemRoot,
                    });
                    continue;
                }
                if self.platform.device_id(&path)? != anchor_device
                    || self.platform.entry_device_id(&path)? != anchor_device
                {
                    plan.skipped.push(SkippedEntry {
                        path,
                        reason: SkipReason::OtherDevice,
                    });
                    continue;
                }
                match self.platform.entry_kind(&path)? {
                    EntryKind::Other => plan.skipped.push(SkippedEntry {
                        path,
                        reason: SkipReason::UnsupportedType,
                    }),
                    kind => plan.candidates.push(Candidate { path, kind }),
                }
            }
        }

        Ok(plan)
    }

    /// Remove the planned candidates in order.
    ///
    /// Entries that disappeared since planning are skipped. Any other failure
    /// aborts with [`DfgError::Reclaim`] listing what was already removed.
    pub fn execute(&self, plan: &ReclaimPlan, log: &mut ActivityLog) -> Result<ReclaimReport> {
        let mut report = ReclaimReport {
            removed: Vec::new(),
            skipped: plan.skipped.clone(),
        };
        for skipped in &plan.skipped {
            log_skip(log, skipped);
        }

        for candidate in &plan.candidates {
            match self.remove(candidate) {
                Ok(Some(kind)) => {
                    log.record(&ActivityEvent::EntryDeleted {
                        path: candidate.path.display().to_string(),
                        kind,
                    });
                    report.removed.push(candidate.path.clone());
                }
                Ok(None) => {
                    let skipped = SkippedEntry {
                        path: candidate.path.clone(),
                        reason: SkipReason::UnsupportedType,
                    };
                    log_skip(log, &skipped);
                    report.skipped.push(skipped);
                }
                Err(err) if err.is_not_found() => {
                    let skipped = SkippedEntry {
                        path: candidate.path.clone(),
                        reason: SkipReason::Vanished,
                    };
                    log_skip(log, &skipped);
                    report.skipped.push(skipped);
                }
                Err(err) => {
                    log.record(&ActivityEvent::DeletionFailed {
                        path: candidate.path.display().to_string(),
                        error_code: err.code().to_string(),
                        error_message: err.to_string(),
                    });
                    return Err(DfgError::Reclaim {
                        removed: report.removed,
                        source: Box::new(err),
                    });
                }
            }
        }

        Ok(report)
    }

    /// `plan` followed by `execute`. Planning failures are reported as
    /// [`DfgError::Reclaim`] with nothing removed.
    pub fn reclaim(
        &self,
        anchor: &Path,
        patterns: &[String],
        log: &mut ActivityLog,
    ) -> Result<ReclaimReport> {
        let plan = self.plan(anchor, patterns).map_err(|source| DfgError::Reclaim {
            removed: Vec::new(),
            source: Box::new(source),
        })?;
        self.execute(&plan, log)
    }

    /// Re-inspect and remove one candidate. `Ok(None)` means it is no longer
    /// a file or directory.
    fn remove(&self, candidate: &Candidate) -> Result<Option<EntryKind>> {
        match self.platform.entry_kind(&candidate.path)? {
            EntryKind::File => {
                self.platform.remove_file(&candidate.path)?;
                Ok(Some(EntryKind::File))
            }
            EntryKind::Directory => {
                self.platform.remove_dir_all(&candidate.path)?;
                Ok(Some(EntryKind::Directory))
            }
            EntryKind::Other => Ok(None),
        }
    }
}

fn log_skip(log: &mut ActivityLog, skipped: &SkippedEntry) {
    log.record(&ActivityEvent::CandidateSkipped {
        path: skipped.path.display().to_string(),
        reason: skipped.reason.to_string(),
    });
}
