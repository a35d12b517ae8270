//! Emulated BitTorrent client fingerprints.
//!
//! A fingerprint file (`clients/<name>.client`, JSON) describes how one real
//! client builds its announces: the query template, the HTTP headers, how the
//! peer id and the `key` parameter are generated and refreshed, and how raw
//! bytes are percent-encoded into the query string. The seeding core fills a
//! template in; nothing here knows about trackers or scheduling.
pub mod client;
pub mod encoder;
pub mod generator;
pub mod provider;

use std::path::PathBuf;

pub use client::{AnnounceQuery, EmulatedClient, Header};

/// Errors raised while loading or using a client fingerprint file.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("client file not found: {path}")]
    MissingClientFile { path: PathBuf },

    #[error("unable to read client file {path}: {source}")]
    UnreadableClientFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid client file json: {source}")]
    InvalidClientFile { source: serde_json::Error },

    #[error("invalid encoding exclusion pattern {pattern}: {source}")]
    InvalidExclusionPattern { pattern: String, source: regex::Error },

    #[error("peer id prefix is {len} bytes long, the whole peer id must fit in 20")]
    PeerIdPrefixTooLong { len: usize },
}
