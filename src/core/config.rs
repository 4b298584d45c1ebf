//! Configuration system: TOML file + env var overrides + defaults.
//!
//! Precedence (highest first): CLI flags, `DFG_*` environment variables, the
//! config file, built-in defaults. CLI flags are merged by the binary after
//! [`Config::load`] returns.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{DfgError, Result};
use crate::core::units::Unit;
use crate::scanner::glob::validate_glob_pattern;

/// Full dfg configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    /// Filesystem path to inspect (any path on the target mount).
    pub path: Option<PathBuf>,
    /// Unit for `free` and for reported space figures.
    pub unit: Unit,
    /// Minimum free space, in `unit`.
    pub free: u64,
    /// Minimum free inode count.
    pub ifree: u64,
    /// Paths or glob patterns that may be removed to reach the thresholds.
    pub delete: Vec<String>,
    /// Never remove anything, even when `delete` is set.
    pub dry_run: bool,
    pub logging: LoggingConfig,
    /// File this config was loaded from (not serialized).
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only JSONL activity log. Disabled when unset.
    pub jsonl_path: Option<PathBuf>,
    /// Rotate the log once it grows past this many bytes.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub max_rotated_files: u32,
    /// Mirror activity events to stderr.
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            jsonl_path: None,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            verbose: false,
        }
    }
}

impl Config {
    /// Default configuration path: `$HOME/.config/dfg/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[DFG-CONFIG] WARNING: HOME not set, falling back to /tmp for config");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("dfg").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, env_var)
    }

    /// Like [`Config::load`] but with a custom environment lookup.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| DfgError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let mut parsed = Self::from_toml_str(&raw)?;
            parsed.config_file = Some(path_buf);
            parsed
        } else if path.is_some() {
            return Err(DfgError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(lookup)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("DFG_PATH") {
            self.path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("DFG_UNIT") {
            self.unit = raw.trim().parse().map_err(|_| DfgError::ConfigParse {
                context: "env",
                details: format!("DFG_UNIT={raw:?}: expected one of {}", Unit::NAMES.join(", ")),
            })?;
        }
        if let Some(raw) = lookup("DFG_FREE") {
            self.free = parse_env_u64("DFG_FREE", &raw)?;
        }
        if let Some(raw) = lookup("DFG_IFREE") {
            self.ifree = parse_env_u64("DFG_IFREE", &raw)?;
        }
        if let Some(raw) = lookup("DFG_DELETE") {
            self.delete = raw
                .split(['\n', ','])
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("DFG_DRY_RUN") {
            self.dry_run = parse_env_bool("DFG_DRY_RUN", &raw)?;
        }
        if let Some(raw) = lookup("DFG_LOG_FILE") {
            self.logging.jsonl_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("DFG_VERBOSE") {
            self.logging.verbose = parse_env_bool("DFG_VERBOSE", &raw)?;
        }
        Ok(())
    }

    /// Trim delete entries and drop the empty ones.
    pub fn normalize(&mut self) {
        self.delete = self
            .delete
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.path
            && path.as_os_str().is_empty()
        {
            return Err(DfgError::InvalidConfig {
                details: "path must not be empty".to_string(),
            });
        }

        for pattern in &self.delete {
            validate_glob_pattern(pattern)?;
        }

        if self.logging.max_size_bytes == 0 {
            return Err(DfgError::InvalidConfig {
                details: "logging.max_size_bytes must be > 0".to_string(),
            });
        }

        if self.logging.max_rotated_files == 0 {
            return Err(DfgError::InvalidConfig {
                details: "logging.max_rotated_files must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| DfgError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DfgError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}
