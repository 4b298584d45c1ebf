//! Platform abstraction layer (PAL).

pub mod pal;
