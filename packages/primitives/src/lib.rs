//! Primitive types shared by all the ghostseed packages.
//!
//! These are plain value types with no behavior beyond parsing and
//! formatting. Everything that acts on them lives in the other packages.
use std::time::Duration;

pub mod announce_event;
pub mod info_hash;
pub mod peers;

/// Duration since the Unix epoch (a timestamp).
pub type DurationSinceUnixEpoch = Duration;
