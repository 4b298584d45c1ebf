//! Check orchestrator: measure, compare, optionally reclaim, re-measure, report.
//!
//! ```text
//! Measuring -> Checking -> Satisfied
//!                       -> NeedsReclaim -> RejectUnsatisfiable   (dry run / no candidates)
//!                                       -> Reclaiming -> ReMeasuring -> ReChecking
//!                                                     -> Satisfied | Unsatisfiable
//! ```

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{DfgError, Result};
use crate::core::units::Unit;
use crate::logger::activity::{ActivityEvent, ActivityLog};
use crate::monitor::fs_stats::FsStatsReader;
use crate::monitor::report::UsageReport;
use crate::monitor::threshold::satisfies;
use crate::platform::pal::{FsStats, Platform};
use crate::scanner::reclaim::Reclaimer;

/// Validated inputs for one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub path: PathBuf,
    pub unit: Unit,
    pub min_free: u64,
    pub min_ifree: u64,
    /// Literal paths or glob patterns, in the order they are tried.
    pub delete: Vec<String>,
    pub dry_run: bool,
}

impl CheckRequest {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            unit: Unit::default(),
            min_free: 0,
            min_ifree: 0,
            delete: Vec::new(),
            dry_run: false,
        }
    }

    /// Build a request from a normalized config. `path` is required.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config
            .path
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| DfgError::InvalidConfig {
                details: "path is required".to_string(),
            })?;
        Ok(Self {
            path,
            unit: config.unit,
            min_free: config.free,
            min_ifree: config.ifree,
            delete: config
                .delete
                .iter()
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect(),
            dry_run: config.dry_run,
        })
    }
}

/// Why a check did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The filesystem could not be measured.
    Stat,
    /// Usage percentages are undefined (zero totals).
    Arithmetic,
    /// Removing a candidate failed.
    Reclaim,
    /// Below threshold and reclaiming was not allowed (dry run or nothing to delete).
    RejectUnsatisfiable,
    /// Still below threshold after reclaiming.
    Unsatisfiable,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stat => "stat",
            Self::Arithmetic => "arithmetic",
            Self::Reclaim => "reclaim",
            Self::RejectUnsatisfiable => "reject_unsatisfiable",
            Self::Unsatisfiable => "unsatisfiable",
        }
    }

    /// Threshold failures are outcomes, not errors.
    #[must_use]
    pub const fn is_threshold(self) -> bool {
        matches!(self, Self::RejectUnsatisfiable | Self::Unsatisfiable)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub kind: FailureKind,
    pub message: String,
    /// DFG error code when the failure came from an error.
    pub error_code: Option<&'static str>,
    /// Best available figures. `None` when the filesystem could not be measured.
    pub report: Option<UsageReport>,
    /// Entries a dry run would have removed.
    pub planned: Vec<PathBuf>,
    /// Entries actually removed before the failure.
    pub removed: Vec<PathBuf>,
}

impl CheckFailure {
    fn from_error(kind: FailureKind, err: &DfgError) -> Self {
        Self {
            kind,
            message: err.to_string(),
            error_code: Some(err.code()),
            report: None,
            planned: Vec::new(),
            removed: Vec::new(),
        }
    }

    fn below_threshold(kind: FailureKind, report: UsageReport, request: &CheckRequest) -> Self {
        Self {
            kind,
            message: format!(
                "Not enough free space: have {} {unit}, want {} {unit}",
                report.stat.free,
                request.min_free,
                unit = request.unit
            ),
            error_code: None,
            report: Some(report),
            planned: Vec::new(),
            removed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Success(UsageReport),
    Failure(CheckFailure),
}

impl CheckOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn report(&self) -> Option<&UsageReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(failure) => failure.report.as_ref(),
        }
    }

    /// Whether anything on disk was removed.
    #[must_use]
    pub fn changed(&self) -> bool {
        match self {
            Self::Success(report) => report.changed,
            Self::Failure(failure) => !failure.removed.is_empty(),
        }
    }
}

/// Runs checks against one [`Platform`].
pub struct DiskFreeCheck {
    platform: Arc<dyn Platform>,
    reader: FsStatsReader,
}

impl DiskFreeCheck {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        let reader = FsStatsReader::new(Arc::clone(&platform));
        Self { platform, reader }
    }

    pub fn run(&self, request: &CheckRequest, log: &mut ActivityLog) -> CheckOutcome {
        log.record(&ActivityEvent::CheckStarted {
            path: request.path.display().to_string(),
            unit: request.unit,
            want_free: request.min_free,
            want_ifree: request.min_ifree,
            dry_run: request.dry_run,
            candidates: request.delete.len(),
        });
        let outcome = self.evaluate(request, log);
        match &outcome {
            CheckOutcome::Success(report) => log.record(&ActivityEvent::CheckPassed {
                unit: request.unit,
                report: *report,
            }),
            CheckOutcome::Failure(failure) => log.record(&ActivityEvent::CheckFailed {
                kind: failure.kind.to_string(),
                message: failure.message.clone(),
                error_code: failure.error_code.map(str::to_string),
            }),
        }
        log.flush();
        outcome
    }

    fn evaluate(&self, request: &CheckRequest, log: &mut ActivityLog) -> CheckOutcome {
        let initial = match self.measure(&request.path, "initial", log) {
            Ok(stats) => stats,
            Err(err) => return CheckOutcome::Failure(CheckFailure::from_error(FailureKind::Stat, &err)),
        };

        if satisfies(&initial, request.unit, request.min_free, request.min_ifree) {
            return match UsageReport::build(false, &initial, request.unit) {
                Ok(report) => CheckOutcome::Success(report),
                Err(err) => CheckOutcome::Failure(CheckFailure::from_error(
                    FailureKind::Arithmetic,
                    &err,
                )),
            };
        }

        let before = match UsageReport::build(false, &initial, request.unit) {
            Ok(report) => report,
            Err(err) => {
                return CheckOutcome::Failure(CheckFailure::from_error(
                    FailureKind::Arithmetic,
                    &err,
                ));
            }
        };

        let reclaimer = Reclaimer::new(self.platform.as_ref());

        if request.dry_run || request.delete.is_empty() {
            let mut failure =
                CheckFailure::below_threshold(FailureKind::RejectUnsatisfiable, before, request);
            if request.dry_run && !request.delete.is_empty() {
                // Listing what would go is best effort; the verdict stands either way.
                if let Ok(plan) = reclaimer.plan(&request.path, &request.delete) {
                    failure.planned = plan.paths();
                }
            }
            return CheckOutcome::Failure(failure);
        }

        let reclaimed = match reclaimer.reclaim(&request.path, &request.delete, log) {
            Ok(report) => report,
            Err(err) => {
                let removed = err.removed_paths().to_vec();
                let changed = !removed.is_empty();
                let report = self
                    .measure(&request.path, "after_reclaim", log)
                    .ok()
                    .and_then(|stats| UsageReport::build(changed, &stats, request.unit).ok())
                    .unwrap_or(UsageReport { changed, ..before });
                let mut failure = CheckFailure::from_error(FailureKind::Reclaim, &err);
                failure.report = Some(report);
                failure.removed = removed;
                return CheckOutcome::Failure(failure);
            }
        };

        let changed = reclaimed.changed();
        let after = match self.measure(&request.path, "after_reclaim", log) {
            Ok(stats) => stats,
            Err(err) => {
                let mut failure = CheckFailure::from_error(FailureKind::Stat, &err);
                failure.report = Some(UsageReport { changed, ..before });
                failure.removed = reclaimed.removed;
                return CheckOutcome::Failure(failure);
            }
        };
        let report = match UsageReport::build(changed, &after, request.unit) {
            Ok(report) => report,
            Err(err) => {
                let mut failure = CheckFailure::from_error(FailureKind::Arithmetic, &err);
                failure.removed = reclaimed.removed;
                return CheckOutcome::Failure(failure);
            }
        };

        if satisfies(&after, request.unit, request.min_free, request.min_ifree) {
            CheckOutcome::Success(report)
        } else {
            let mut failure =
                CheckFailure::below_threshold(FailureKind::Unsatisfiable, report, request);
            failure.removed = reclaimed.removed;
            CheckOutcome::Failure(failure)
        }
    }

    fn measure(&self, path: &Path, phase: &'static str, log: &mut ActivityLog) -> Result<FsStats> {
        let stats = self.reader.measure(path)?;
        log.record(&ActivityEvent::FsMeasured {
            path: path.display().to_string(),
            phase,
            stats,
        });
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pal::{MockEntry, MockPlatform};

    const MIB: u64 = 1024 * 1024;

    fn half_full() -> FsStats {
        FsStats {
            total_bytes: 200 * MIB,
            free_bytes: 100 * MIB,
            total_inodes: 1000,
            free_inodes: 900,
        }
    }

    fn data_volume() -> MockPlatform {
        MockPlatform::new(half_full()).with_entry("/data", MockEntry::dir(1))
    }

    fn request(min_free: u64) -> CheckRequest {
        CheckRequest {
            min_free,
            ..CheckRequest::new("/data")
        }
    }

    fn run(platform: MockPlatform, request: &CheckRequest) -> (CheckOutcome, Arc<MockPlatform>) {
        let platform = Arc::new(platform);
        let outcome =
            DiskFreeCheck::new(platform.clone()).run(request, &mut ActivityLog::disabled());
        (outcome, platform)
    }

    fn expect_failure(outcome: CheckOutcome) -> CheckFailure {
        match outcome {
            CheckOutcome::Failure(failure) => failure,
            CheckOutcome::Success(report) => panic!("expected failure, got {report:?}"),
        }
    }

    #[test]
    fn satisfied_on_first_check() {
        let (outcome, platform) = run(data_volume(), &request(50));
        let CheckOutcome::Success(report) = outcome else {
            panic!("expected success: {outcome:?}");
        };
        assert!(!report.changed);
        assert_eq!(report.stat.free, 100);
        assert_eq!(report.stat.usage, 50);
        assert_eq!(platform.stat_calls(), 1);
    }

    #[test]
    fn below_threshold_without_candidates_is_rejected() {
        let (outcome, _) = run(data_volume(), &request(150));
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::RejectUnsatisfiable);
        assert_eq!(
            failure.message,
            "Not enough free space: have 100 MiB, want 150 MiB"
        );
        assert_eq!(failure.report.unwrap().stat.free, 100);
        assert!(failure.error_code.is_none());
    }

    #[test]
    fn reclaiming_enough_space_succeeds_with_changed() {
        let platform = data_volume().with_entry("/data/big.iso", MockEntry::file(1, 60 * MIB));
        let req = CheckRequest {
            delete: vec!["/data/*.iso".to_string()],
            ..request(150)
        };
        let (outcome, platform) = run(platform, &req);
        let CheckOutcome::Success(report) = outcome else {
            panic!("expected success: {outcome:?}");
        };
        assert!(report.changed);
        assert_eq!(report.stat.free, 160);
        assert_eq!(platform.removed(), vec![PathBuf::from("/data/big.iso")]);
        assert_eq!(platform.stat_calls(), 2);
    }

    #[test]
    fn cross_device_match_stays_and_check_fails() {
        let platform = data_volume()
            .with_entry("/data/mnt", MockEntry::dir(2))
            .with_entry("/data/mnt/huge", MockEntry::file(2, 150 * MIB));
        let req = CheckRequest {
            delete: vec!["/data/mnt".to_string()],
            ..request(150)
        };
        let (outcome, platform) = run(platform, &req);
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::Unsatisfiable);
        assert!(failure.removed.is_empty());
        assert!(!failure.report.unwrap().changed);
        assert!(platform.contains(Path::new("/data/mnt/huge")));
    }

    #[test]
    fn dry_run_lists_candidates_without_removing() {
        let platform = data_volume().with_entry("/data/big.iso", MockEntry::file(1, 60 * MIB));
        let req = CheckRequest {
            delete: vec!["/data/*.iso".to_string()],
            dry_run: true,
            ..request(150)
        };
        let (outcome, platform) = run(platform, &req);
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::RejectUnsatisfiable);
        assert_eq!(failure.planned, vec![PathBuf::from("/data/big.iso")]);
        assert!(failure.removed.is_empty());
        assert!(platform.removed().is_empty());
        assert_eq!(failure.report.unwrap().stat.free, 100);
    }

    #[test]
    fn reclaiming_too_little_is_unsatisfiable_but_changed() {
        let platform = data_volume().with_entry("/data/small", MockEntry::file(1, 10 * MIB));
        let req = CheckRequest {
            delete: vec!["/data/small".to_string()],
            ..request(150)
        };
        let (outcome, _) = run(platform, &req);
        assert!(outcome.changed());
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::Unsatisfiable);
        assert_eq!(
            failure.message,
            "Not enough free space: have 110 MiB, want 150 MiB"
        );
        assert!(failure.report.unwrap().changed);
        assert_eq!(failure.removed, vec![PathBuf::from("/data/small")]);
    }

    #[test]
    fn inode_shortfall_reports_space_message() {
        let req = CheckRequest {
            min_ifree: 901,
            ..request(0)
        };
        let (outcome, _) = run(data_volume(), &req);
        let failure = expect_failure(outcome);
        assert_eq!(failure.message, "Not enough free space: have 100 MiB, want 0 MiB");
    }

    #[test]
    fn removal_failure_carries_fresh_report_and_partial_list() {
        let platform = data_volume()
            .with_entry("/data/a", MockEntry::file(1, 5 * MIB))
            .with_entry("/data/b", MockEntry::file(1, 5 * MIB).denied());
        let req = CheckRequest {
            delete: vec!["/data/?".to_string()],
            ..request(150)
        };
        let (outcome, _) = run(platform, &req);
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::Reclaim);
        assert_eq!(failure.error_code, Some("DFG-3003"));
        assert_eq!(failure.removed, vec![PathBuf::from("/data/a")]);
        let report = failure.report.unwrap();
        assert!(report.changed);
        assert_eq!(report.stat.free, 105);
    }

    #[test]
    fn remeasure_failure_after_removal_keeps_changed_report() {
        let platform = data_volume().with_entry("/data/old", MockEntry::file(1, 5 * MIB));
        let req = CheckRequest {
            delete: vec!["/data".to_string()],
            ..request(150)
        };
        let (outcome, _) = run(platform, &req);
        assert!(outcome.changed());
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::Stat);
        assert_eq!(failure.error_code, Some("DFG-2001"));
        assert_eq!(failure.removed, vec![PathBuf::from("/data")]);
        let report = failure.report.unwrap();
        assert!(report.changed);
        assert_eq!(report.stat.free, 100);
    }

    #[test]
    fn missing_path_is_a_stat_failure_without_report() {
        let req = CheckRequest::new("/nope");
        let (outcome, _) = run(data_volume(), &req);
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::Stat);
        assert_eq!(failure.error_code, Some("DFG-2001"));
        assert!(failure.report.is_none());
    }

    #[test]
    fn zero_sized_filesystem_is_an_arithmetic_failure() {
        let platform = MockPlatform::new(FsStats {
            total_bytes: 0,
            free_bytes: 0,
            total_inodes: 0,
            free_inodes: 0,
        })
        .with_entry("/proc", MockEntry::dir(9));
        let (outcome, _) = run(platform, &CheckRequest::new("/proc"));
        let failure = expect_failure(outcome);
        assert_eq!(failure.kind, FailureKind::Arithmetic);
        assert_eq!(failure.error_code, Some("DFG-2002"));
    }

    #[test]
    fn request_from_config_requires_path() {
        let err = CheckRequest::from_config(&Config::default()).unwrap_err();
        assert_eq!(err.code(), "DFG-1001");

        let config = Config {
            path: Some(PathBuf::from("/srv")),
            unit: Unit::GiB,
            free: 5,
            delete: vec!["  /srv/tmp/*  ".to_string(), "   ".to_string()],
            ..Config::default()
        };
        let req = CheckRequest::from_config(&config).unwrap();
        assert_eq!(req.path, PathBuf::from("/srv"));
        assert_eq!(req.unit, Unit::GiB);
        assert_eq!(req.min_free, 5);
        assert_eq!(req.delete, vec!["/srv/tmp/*".to_string()]);
    }
}
