//! Core types: errors, configuration, size units.

pub mod config;
pub mod errors;
pub mod units;
