//! Parsing and validating torrent meta-info.
//!
//! The info-hash is computed by re-encoding the raw `info` value from the
//! decoded file, not the typed model, so fields this crate does not care
//! about still contribute to the hash.
use std::sync::Arc;

use ghostseed_primitives::info_hash::InfoHash;
use serde::Deserialize;
use serde_bencode::value::Value;
use sha1::{Digest, Sha1};
use url::Url;

/// Length in bytes of one SHA-1 piece hash inside `pieces`.
pub const PIECE_HASH_SIZE: usize = 20;

#[derive(thiserror::Error, Debug)]
pub enum MetaInfoError {
    #[error("invalid bencoding: {source}")]
    InvalidBencoding { source: serde_bencode::Error },

    #[error("meta-info has no info dictionary")]
    MissingInfoDictionary,

    #[error("meta-info declares neither a length nor a file list")]
    MissingLength,

    #[error("pieces length {len} is not a multiple of {PIECE_HASH_SIZE}")]
    InvalidPiecesLength { len: usize },

    #[error("torrent size does not match the number of pieces and the piece size")]
    SizeMismatch,

    #[error("meta-info has no usable announce url")]
    MissingAnnounce,
}

#[derive(Deserialize)]
struct MetaInfoFile {
    announce: Option<String>,
    #[serde(rename = "announce-list")]
    announce_list: Option<Vec<Vec<String>>>,
    info: InfoDictionary,
}

#[derive(Deserialize)]
struct InfoDictionary {
    name: String,
    #[serde(rename = "piece length")]
    piece_length: u64,
    pieces: serde_bytes::ByteBuf,
    length: Option<u64>,
    files: Option<Vec<FileEntry>>,
}

#[derive(Deserialize)]
struct FileEntry {
    length: u64,
}

/// One parsed and validated torrent, ready to be lied about.
///
/// No piece data is ever read; only the identity, the size and the trackers
/// matter to a seed emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededTorrent {
    info_hash: InfoHash,
    name: String,
    size: u64,
    announce_tiers: Vec<Vec<Url>>,
}

impl SeededTorrent {
    /// Parses meta-info bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`MetaInfoError`] when the bencoding is invalid, when the
    /// declared size does not fit the piece table, or when no tracker URL can
    /// be used.
    pub fn from_bytes(bytes: &[u8]) -> Result<Arc<Self>, MetaInfoError> {
        let meta: MetaInfoFile =
            serde_bencode::from_bytes(bytes).map_err(|source| MetaInfoError::InvalidBencoding { source })?;

        let size = match (meta.info.length, &meta.info.files) {
            (Some(length), _) => length,
            (None, Some(files)) => files.iter().map(|file| file.length).sum(),
            (None, None) => return Err(MetaInfoError::MissingLength),
        };

        let pieces_len = meta.info.pieces.len();
        if pieces_len % PIECE_HASH_SIZE != 0 {
            return Err(MetaInfoError::InvalidPiecesLength { len: pieces_len });
        }
        if (pieces_len / PIECE_HASH_SIZE) as u64 * meta.info.piece_length < size {
            return Err(MetaInfoError::SizeMismatch);
        }

        let announce_tiers = parse_announce_tiers(meta.announce.as_deref(), meta.announce_list.as_deref())?;

        Ok(Arc::new(Self {
            info_hash: compute_info_hash(bytes)?,
            name: meta.info.name,
            size,
            announce_tiers,
        }))
    }

    #[must_use]
    pub fn info_hash(&self) -> &InfoHash {
        &self.info_hash
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total torrent size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Tracker tiers in the order declared by the meta-info (the
    /// multi-tracker extension, BEP 12).
    #[must_use]
    pub fn announce_tiers(&self) -> &[Vec<Url>] {
        &self.announce_tiers
    }
}

/// SHA-1 over the re-encoded raw `info` value.
fn compute_info_hash(bytes: &[u8]) -> Result<InfoHash, MetaInfoError> {
    let value: Value = serde_bencode::from_bytes(bytes).map_err(|source| MetaInfoError::InvalidBencoding { source })?;

    let Value::Dict(entries) = value else {
        return Err(MetaInfoError::MissingInfoDictionary);
    };

    let info = entries
        .get(b"info".as_slice())
        .ok_or(MetaInfoError::MissingInfoDictionary)?;

    let encoded = serde_bencode::to_bytes(info).map_err(|source| MetaInfoError::InvalidBencoding { source })?;

    let digest: [u8; 20] = Sha1::digest(&encoded).into();

    Ok(InfoHash::new(digest))
}

fn parse_announce_tiers(
    announce: Option<&str>,
    announce_list: Option<&[Vec<String>]>,
) -> Result<Vec<Vec<Url>>, MetaInfoError> {
    let mut tiers: Vec<Vec<Url>> = Vec::new();

    if let Some(announce_list) = announce_list {
        for tier in announce_list {
            let urls: Vec<Url> = tier.iter().filter_map(|raw| parse_tracker_url(raw)).collect();
            if !urls.is_empty() {
                tiers.push(urls);
            }
        }
    }

    if tiers.is_empty() {
        if let Some(raw) = announce {
            if let Some(url) = parse_tracker_url(raw) {
                tiers.push(vec![url]);
            }
        }
    }

    if tiers.is_empty() {
        return Err(MetaInfoError::MissingAnnounce);
    }

    Ok(tiers)
}

fn parse_tracker_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!("Skipping unparsable tracker url {raw}: {e}");
            None
        }
    }
}
