//! Size units accepted for thresholds and reported figures.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::DfgError;

/// Unit of measurement for space thresholds and reports.
///
/// Names are case-sensitive: `kB` is decimal kilobytes, `KiB` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "byte")]
    Byte,
    #[serde(rename = "kB")]
    KB,
    #[serde(rename = "KiB")]
    KiB,
    #[serde(rename = "MB")]
    MB,
    #[default]
    #[serde(rename = "MiB")]
    MiB,
    #[serde(rename = "GB")]
    GB,
    #[serde(rename = "GiB")]
    GiB,
    #[serde(rename = "TB")]
    TB,
    #[serde(rename = "TiB")]
    TiB,
    #[serde(rename = "PB")]
    PB,
    #[serde(rename = "PiB")]
    PiB,
    #[serde(rename = "EB")]
    EB,
    #[serde(rename = "EiB")]
    EiB,
}

impl Unit {
    /// Every unit, smallest first.
    pub const ALL: [Self; 13] = [
        Self::Byte,
        Self::KB,
        Self::KiB,
        Self::MB,
        Self::MiB,
        Self::GB,
        Self::GiB,
        Self::TB,
        Self::TiB,
        Self::PB,
        Self::PiB,
        Self::EB,
        Self::EiB,
    ];

    /// Accepted spellings, in the same order as [`Unit::ALL`].
    pub const NAMES: [&'static str; 13] = [
        "byte", "kB", "KiB", "MB", "MiB", "GB", "GiB", "TB", "TiB", "PB", "PiB", "EB", "EiB",
    ];

    /// Number of bytes in one unit. Always positive.
    #[must_use]
    pub const fn multiplier(self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::KB => 1000,
            Self::KiB => 1024,
            Self::MB => 1000_u64.pow(2),
            Self::MiB => 1024_u64.pow(2),
            Self::GB => 1000_u64.pow(3),
            Self::GiB => 1024_u64.pow(3),
            Self::TB => 1000_u64.pow(4),
            Self::TiB => 1024_u64.pow(4),
            Self::PB => 1000_u64.pow(5),
            Self::PiB => 1024_u64.pow(5),
            Self::EB => 1000_u64.pow(6),
            Self::EiB => 1024_u64.pow(6),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::KB => "kB",
            Self::KiB => "KiB",
            Self::MB => "MB",
            Self::MiB => "MiB",
            Self::GB => "GB",
            Self::GiB => "GiB",
            Self::TB => "TB",
            Self::TiB => "TiB",
            Self::PB => "PB",
            Self::PiB => "PiB",
            Self::EB => "EB",
            Self::EiB => "EiB",
        }
    }

    /// Whole units contained in `bytes`, rounded down.
    #[must_use]
    pub const fn whole_units(self, bytes: u64) -> u64 {
        bytes / self.multiplier()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Unit {
    type Err = DfgError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.name() == raw)
            .ok_or_else(|| DfgError::InvalidConfig {
                details: format!(
                    "unknown unit {raw:?}; expected one of {}",
                    Self::NAMES.join(", ")
                ),
            })
    }
}
