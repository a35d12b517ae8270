//! Helpers shared by the unit tests and the end-to-end tests of the root
//! crate. Not part of the public API.
#![doc(hidden)]
use std::sync::Arc;

use ghostseed_configuration::AppConfiguration;
use ghostseed_primitives::info_hash::InfoHash;

use crate::torrent::metainfo::SeededTorrent;

/// A qBittorrent-flavoured fingerprint, small but complete.
pub const SAMPLE_CLIENT_FILE_JSON: &str = r#"{
    "peerIdGenerator": { "prefix": "-qB4650-", "alphabet": "alphanumeric", "refreshOn": "NEVER" },
    "keyGenerator": { "length": 8, "case": "lower", "refreshOn": "TORRENT_VOLATILE" },
    "urlEncoder": { "encodingExclusionPattern": "[A-Za-z0-9-]", "encodedHexCase": "lower" },
    "query": "info_hash={infohash}&peer_id={peerid}&port={port}&uploaded={uploaded}&downloaded={downloaded}&left={left}&corrupt=0&key={key}&event={event}&numwant={numwant}&compact=1&no_peer_id=1",
    "numwant": 200,
    "numwantOnStop": 0,
    "requestHeaders": [
        { "name": "User-Agent", "value": "qBittorrent/4.6.5" },
        { "name": "Accept-Encoding", "value": "gzip" },
        { "name": "Connection", "value": "close" }
    ]
}"#;

/// Description of a torrent to fabricate for a test.
#[derive(Debug, Clone)]
pub struct TorrentSpec {
    pub name: String,
    pub announce: String,
    /// When non-empty, written as the `announce-list` extension.
    pub announce_tiers: Vec<Vec<String>>,
    pub length: u64,
    pub piece_length: u64,
    /// Zero means "just enough pieces to cover `length`".
    pub piece_count: usize,
}

impl Default for TorrentSpec {
    fn default() -> Self {
        Self {
            name: "sample".to_string(),
            announce: "http://tracker.example.com/announce".to_string(),
            announce_tiers: Vec::new(),
            length: 16_384,
            piece_length: 16_384,
            piece_count: 0,
        }
    }
}

impl TorrentSpec {
    /// The bencoded `info` dictionary alone, with keys in canonical order.
    #[must_use]
    pub fn info_dictionary_bytes(&self) -> Vec<u8> {
        let piece_count = if self.piece_count == 0 {
            usize::try_from(self.length.div_ceil(self.piece_length).max(1)).unwrap()
        } else {
            self.piece_count
        };

        let mut out = vec![b'd'];
        push_bytes(&mut out, b"length");
        out.extend(format!("i{}e", self.length).into_bytes());
        push_bytes(&mut out, b"name");
        push_bytes(&mut out, self.name.as_bytes());
        push_bytes(&mut out, b"piece length");
        out.extend(format!("i{}e", self.piece_length).into_bytes());
        push_bytes(&mut out, b"pieces");
        push_bytes(&mut out, &vec![1u8; piece_count * 20]);
        out.push(b'e');
        out
    }
}

/// Fabricates the complete bencoded meta-info file for a [`TorrentSpec`].
#[must_use]
pub fn torrent_bytes(spec: &TorrentSpec) -> Vec<u8> {
    let mut out = vec![b'd'];

    push_bytes(&mut out, b"announce");
    push_bytes(&mut out, spec.announce.as_bytes());

    if !spec.announce_tiers.is_empty() {
        push_bytes(&mut out, b"announce-list");
        out.push(b'l');
        for tier in &spec.announce_tiers {
            out.push(b'l');
            for url in tier {
                push_bytes(&mut out, url.as_bytes());
            }
            out.push(b'e');
        }
        out.push(b'e');
    }

    push_bytes(&mut out, b"info");
    out.extend(spec.info_dictionary_bytes());
    out.push(b'e');
    out
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend(format!("{}:", bytes.len()).into_bytes());
    out.extend_from_slice(bytes);
}

#[must_use]
pub fn sample_torrent() -> Arc<SeededTorrent> {
    sample_torrent_named("sample")
}

#[must_use]
pub fn sample_torrent_named(name: &str) -> Arc<SeededTorrent> {
    SeededTorrent::from_bytes(&torrent_bytes(&TorrentSpec {
        name: name.to_string(),
        ..TorrentSpec::default()
    }))
    .expect("the fabricated torrent should parse")
}

#[must_use]
pub fn sample_info_hash() -> InfoHash {
    InfoHash::new([0x2au8; 20])
}

#[must_use]
pub fn sample_configuration() -> AppConfiguration {
    AppConfiguration::load_from_json(
        &serde_json::json!({
            "minUploadRate": 1000,
            "maxUploadRate": 1000,
            "simultaneousSeed": 2,
            "client": "qbittorrent-4.6.5.client",
            "keepTorrentWithZeroLeechers": true
        })
        .to_string(),
    )
    .expect("the sample configuration should be valid")
}
