//! The seeding core: everything between a `.torrent` file on disk and a
//! stream of plausible announces on the wire.
//!
//! The three subsystems and how they hang together:
//!
//! - the [`torrent`] module watches the torrents directory and maintains the
//!   set of known meta-info files;
//! - the [`orchestrator`] owns the active set of [`announce::announcer`]s and
//!   drives them through a time-ordered [`announce::delay_queue`], a bounded
//!   [`announce::executor`] and a fixed [`announce::response`] handler chain;
//! - the [`bandwidth`] dispatcher fabricates the upload history those
//!   announces report.
//!
//! The [`hit_and_run`] module keeps per-torrent seed-time accounting across
//! restarts and the [`connection`] probe supplies the ip/port the emulated
//! client reports.
pub mod announce;
pub mod bandwidth;
pub mod connection;
pub mod event;
pub mod folders;
pub mod hit_and_run;
pub mod orchestrator;
pub mod test_helpers;
pub mod torrent;

/// Target for tracing crate logs.
pub const SEEDER_CORE_LOG_TARGET: &str = "SEEDER CORE";

/// This code needs to be copied into each crate.
/// Working version, for production.
#[cfg(not(test))]
#[allow(dead_code)]
pub(crate) type CurrentClock = ghostseed_clock::clock::Working;

/// Stopped version, for testing.
#[cfg(test)]
#[allow(dead_code)]
pub(crate) type CurrentClock = ghostseed_clock::clock::Stopped;
