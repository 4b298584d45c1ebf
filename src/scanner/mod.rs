//! Delete-pattern resolution and removal.

pub mod glob;
pub mod reclaim;
