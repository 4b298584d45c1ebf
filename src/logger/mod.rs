//! Activity logging: JSONL append-only log plus verbose stderr mirroring.

pub mod activity;
pub mod jsonl;
