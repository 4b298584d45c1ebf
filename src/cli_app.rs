//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use disk_free_guard::checker::{CheckFailure, CheckOutcome, CheckRequest, DiskFreeCheck, FailureKind};
use disk_free_guard::core::config::Config;
use disk_free_guard::core::errors::DfgError;
use disk_free_guard::core::units::Unit;
use disk_free_guard::logger::activity::ActivityLog;
use disk_free_guard::monitor::report::UsageReport;
use disk_free_guard::platform::pal::detect_platform;

/// Disk Free Guard: verify free space and inodes, optionally reclaiming space first.
#[derive(Debug, Parser)]
#[command(
    name = "dfg",
    author,
    version,
    about = "Disk Free Guard - check free space and inodes, reclaim on demand",
    long_about = None
)]
pub struct Cli {
    /// Filesystem path to check (overrides DFG_PATH and the config file).
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,
    /// Unit for --free and the reported sizes.
    #[arg(long, value_name = "UNIT", value_parser = unit_parser())]
    unit: Option<Unit>,
    /// Minimum free space, in --unit.
    #[arg(long, value_name = "N")]
    free: Option<u64>,
    /// Minimum free inodes.
    #[arg(long, value_name = "N")]
    ifree: Option<u64>,
    /// Path or glob pattern to delete when below threshold (repeatable, ordered).
    #[arg(long = "delete", value_name = "PATTERN")]
    delete: Vec<String>,
    /// Never delete; fail if below threshold and list what would be removed.
    #[arg(long, visible_alias = "check")]
    dry_run: bool,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append activity events to this JSONL file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Mirror activity events to stderr.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn unit_parser() -> impl TypedValueParser<Value = Unit> {
    PossibleValuesParser::new(Unit::NAMES).try_map(|raw| raw.parse::<Unit>())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Threshold not met.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Reclaim removed some entries before failing.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<DfgError> for CliError {
    fn from(err: DfgError) -> Self {
        match err {
            DfgError::Serialization { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Run one check with the effective configuration.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    let config = effective_config(cli)?;
    if config.logging.verbose {
        eprintln!(
            "[DFG] effective config {} (from {})",
            config.stable_hash()?,
            config
                .config_file
                .as_deref()
                .map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
        );
    }
    let request = CheckRequest::from_config(&config)?;
    let platform = detect_platform()?;

    let mut log = ActivityLog::from_config(&config.logging);
    let outcome = DiskFreeCheck::new(platform).run(&request, &mut log);

    match output_mode(cli) {
        OutputMode::Human => render_human(cli, &request, &outcome)?,
        OutputMode::Json => write_json_line(&outcome_payload(&request, &outcome))?,
    }

    outcome_result(outcome)
}

/// Config file, then env, then command-line flags.
fn effective_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, cli);
    config.normalize();
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(path) = &cli.path {
        config.path = Some(path.clone());
    }
    if let Some(unit) = cli.unit {
        config.unit = unit;
    }
    if let Some(free) = cli.free {
        config.free = free;
    }
    if let Some(ifree) = cli.ifree {
        config.ifree = ifree;
    }
    if !cli.delete.is_empty() {
        config.delete.clone_from(&cli.delete);
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(log_file) = &cli.log_file {
        config.logging.jsonl_path = Some(log_file.clone());
    }
    if cli.verbose {
        config.logging.verbose = true;
    }
    if cli.quiet {
        config.logging.verbose = false;
    }
}

fn outcome_result(outcome: CheckOutcome) -> Result<(), CliError> {
    let failure = match outcome {
        CheckOutcome::Success(_) => return Ok(()),
        CheckOutcome::Failure(failure) => failure,
    };
    Err(match failure.kind {
        FailureKind::RejectUnsatisfiable | FailureKind::Unsatisfiable => {
            CliError::User(failure.message)
        }
        FailureKind::Reclaim if !failure.removed.is_empty() => CliError::Partial(failure.message),
        FailureKind::Stat | FailureKind::Arithmetic | FailureKind::Reclaim => {
            CliError::Runtime(failure.message)
        }
    })
}

fn outcome_payload(request: &CheckRequest, outcome: &CheckOutcome) -> Value {
    let mut payload = json!({
        "path": request.path.to_string_lossy(),
        "changed": outcome.changed(),
        "failed": !outcome.is_success(),
        "unit": request.unit.name(),
    });
    if let Some(report) = outcome.report() {
        payload["stat"] = json!(report.stat);
    }
    if let CheckOutcome::Failure(failure) = outcome {
        payload["msg"] = json!(failure.message);
        payload["kind"] = json!(failure.kind);
        if let Some(code) = failure.error_code {
            payload["error_code"] = json!(code);
        }
        if !failure.planned.is_empty() {
            payload["planned"] = json!(path_strings(&failure.planned));
        }
        if !failure.removed.is_empty() {
            payload["removed"] = json!(path_strings(&failure.removed));
        }
    }
    payload
}

fn path_strings(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.to_string_lossy().into_owned()).collect()
}

fn render_human(
    cli: &Cli,
    request: &CheckRequest,
    outcome: &CheckOutcome,
) -> Result<(), CliError> {
    match outcome {
        CheckOutcome::Success(report) => {
            if !cli.quiet {
                write_success(&mut io::stdout().lock(), request, report)?;
            }
        }
        // Header, stats, path lists and hint all share stderr.
        CheckOutcome::Failure(failure) => {
            write_failure(&mut io::stderr().lock(), request, failure)?;
        }
    }
    Ok(())
}

fn write_success(
    out: &mut impl Write,
    request: &CheckRequest,
    report: &UsageReport,
) -> io::Result<()> {
    let tag = if report.changed {
        "OK (space reclaimed)".green().bold()
    } else {
        "OK".green().bold()
    };
    writeln!(out, "{tag} {}", request.path.display())?;
    write_stat(out, request.unit, report)
}

fn write_failure(
    out: &mut impl Write,
    request: &CheckRequest,
    failure: &CheckFailure,
) -> io::Result<()> {
    writeln!(
        out,
        "{} {} ({})",
        "FAILED".red().bold(),
        request.path.display(),
        failure.kind
    )?;
    if let Some(report) = &failure.report {
        write_stat(out, request.unit, report)?;
    }
    write_paths(out, "would delete", &failure.planned)?;
    write_paths(out, "deleted", &failure.removed)?;
    write_hint(out, failure, &request.path)
}

fn write_stat(out: &mut impl Write, unit: Unit, report: &UsageReport) -> io::Result<()> {
    let stat = &report.stat;
    writeln!(
        out,
        "  space:  {} {unit} free of {} {unit} ({}% used)",
        stat.free, stat.size, stat.usage
    )?;
    writeln!(
        out,
        "  inodes: {} free of {} ({}% used)",
        stat.inode_free, stat.inode_count, stat.inode_usage
    )
}

fn write_paths(out: &mut impl Write, label: &str, paths: &[PathBuf]) -> io::Result<()> {
    for path in paths {
        writeln!(out, "  {} {}", label.yellow(), path.display())?;
    }
    Ok(())
}

fn write_hint(out: &mut impl Write, failure: &CheckFailure, path: &Path) -> io::Result<()> {
    if failure.kind == FailureKind::RejectUnsatisfiable && failure.planned.is_empty() {
        writeln!(
            out,
            "  {} pass --delete PATTERN to allow reclaiming space under {}",
            "hint:".dimmed(),
            path.display()
        )?;
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("DFG_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}
