//! Activity events for a check run, fanned out to the JSONL log and (in
//! verbose mode) to stderr.

#![allow(missing_docs)]

use std::io::{self, Write};

use crate::core::config::LoggingConfig;
use crate::core::units::Unit;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::monitor::report::UsageReport;
use crate::platform::pal::{EntryKind, FsStats};

/// Events emitted while a check runs.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    CheckStarted {
        path: String,
        unit: Unit,
        want_free: u64,
        want_ifree: u64,
        dry_run: bool,
        candidates: usize,
    },
    FsMeasured {
        path: String,
        phase: &'static str,
        stats: FsStats,
    },
    CandidateSkipped {
        path: String,
        reason: String,
    },
    EntryDeleted {
        path: String,
        kind: EntryKind,
    },
    DeletionFailed {
        path: String,
        error_code: String,
        error_message: String,
    },
    CheckPassed {
        unit: Unit,
        report: UsageReport,
    },
    CheckFailed {
        kind: String,
        message: String,
        error_code: Option<String>,
    },
}

/// Sink for [`ActivityEvent`]s. Disabled sinks drop everything.
pub struct ActivityLog {
    jsonl: Option<JsonlWriter>,
    verbose: bool,
}

impl ActivityLog {
    #[must_use]
    pub fn new(jsonl: Option<JsonlWriter>, verbose: bool) -> Self {
        Self { jsonl, verbose }
    }

    /// A sink that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    /// Build from the `[logging]` config table.
    #[must_use]
    pub fn from_config(logging: &LoggingConfig) -> Self {
        let jsonl = JsonlConfig::from_logging(logging).map(JsonlWriter::open);
        Self::new(jsonl, logging.verbose)
    }

    pub fn record(&mut self, event: &ActivityEvent) {
        if self.verbose {
            let _ = writeln!(io::stderr(), "[DFG] {}", describe(event));
        }
        if let Some(writer) = self.jsonl.as_mut() {
            writer.write_entry(&event_to_entry(event));
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.jsonl.as_mut() {
            writer.flush();
        }
    }
}

fn describe(event: &ActivityEvent) -> String {
    match event {
        ActivityEvent::CheckStarted {
            path,
            unit,
            want_free,
            want_ifree,
            dry_run,
            candidates,
        } => format!(
            "checking {path}: want {want_free} {unit} free, {want_ifree} inodes free \
             ({candidates} delete pattern(s){})",
            if *dry_run { ", dry run" } else { "" }
        ),
        ActivityEvent::FsMeasured { path, phase, stats } => format!(
            "{phase} stats for {path}: {} of {} bytes free, {} of {} inodes free",
            stats.free_bytes, stats.total_bytes, stats.free_inodes, stats.total_inodes
        ),
        ActivityEvent::CandidateSkipped { path, reason } => {
            format!("skipping {path}: {reason}")
        }
        ActivityEvent::EntryDeleted { path, kind } => {
            let kind = match kind {
                EntryKind::File => "file",
                EntryKind::Directory => "directory",
                EntryKind::Other => "entry",
            };
            format!("deleted {kind} {path}")
        }
        ActivityEvent::DeletionFailed {
            path,
            error_message,
            ..
        } => format!("failed to delete {path}: {error_message}"),
        ActivityEvent::CheckPassed { unit, report } => format!(
            "ok: {} {unit} free ({}% used), changed={}",
            report.stat.free, report.stat.usage, report.changed
        ),
        ActivityEvent::CheckFailed { kind, message, .. } => format!("{kind}: {message}"),
    }
}

fn event_to_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::CheckStarted {
            path,
            unit,
            want_free,
            want_ifree,
            dry_run,
            candidates,
        } => {
            let mut e = LogEntry::new(EventType::CheckStart, Severity::Info);
            e.path = Some(path.clone());
            e.unit = Some(unit.to_string());
            e.details = Some(format!(
                "want_free={want_free} want_ifree={want_ifree} dry_run={dry_run} \
                 delete_patterns={candidates}"
            ));
            e
        }
        ActivityEvent::FsMeasured { path, phase, stats } => {
            let mut e = LogEntry::new(EventType::FsMeasured, Severity::Info);
            e.path = Some(path.clone());
            e.unit = Some(Unit::Byte.to_string());
            e.free = Some(stats.free_bytes);
            e.size = Some(stats.total_bytes);
            e.inode_free = Some(stats.free_inodes);
            e.inode_count = Some(stats.total_inodes);
            e.details = Some(format!("phase={phase}"));
            e
        }
        ActivityEvent::CandidateSkipped { path, reason } => {
            let mut e = LogEntry::new(EventType::CandidateSkipped, Severity::Info);
            e.path = Some(path.clone());
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::EntryDeleted { path, kind } => {
            let mut e = LogEntry::new(EventType::EntryDeleted, Severity::Info);
            e.path = Some(path.clone());
            e.ok = Some(true);
            e.details = Some(format!("kind={kind:?}").to_lowercase());
            e
        }
        ActivityEvent::DeletionFailed {
            path,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::DeletionFailed, Severity::Warning);
            e.path = Some(path.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::CheckPassed { unit, report } => {
            let mut e = LogEntry::new(EventType::CheckPassed, Severity::Info);
            e.unit = Some(unit.to_string());
            e.free = Some(report.stat.free);
            e.size = Some(report.stat.size);
            e.inode_free = Some(report.stat.inode_free);
            e.inode_count = Some(report.stat.inode_count);
            e.changed = Some(report.changed);
            e.ok = Some(true);
            e
        }
        ActivityEvent::CheckFailed {
            kind,
            message,
            error_code,
        } => {
            let mut e = LogEntry::new(EventType::CheckFailed, Severity::Critical);
            e.ok = Some(false);
            e.error_code.clone_from(error_code);
            e.error_message = Some(message.clone());
            e.details = Some(kind.clone());
            e
        }
    }
}
