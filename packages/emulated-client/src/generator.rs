//! Peer-id and `key` generation with per-client refresh policies.
use std::collections::HashMap;
use std::sync::Mutex;

use ghostseed_primitives::info_hash::InfoHash;
use rand::seq::IndexedRandom;
use serde::Deserialize;

use crate::encoder::HexCase;
use crate::Error;

pub const PEER_ID_LENGTH: usize = 20;

const ALPHANUMERIC_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const PRINTABLE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_~().-";
const HEX_CHARS_LOWER: &[u8] = b"0123456789abcdef";
const HEX_CHARS_UPPER: &[u8] = b"0123456789ABCDEF";

/// When a generated value is replaced by a fresh one.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshPolicy {
    /// One value for the whole process lifetime.
    #[default]
    Never,

    /// A fresh value on every announce.
    Always,

    /// One value per torrent, kept until the process restarts.
    TorrentVolatile,
}

/// Character pool for the random part of a peer id.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Alphabet {
    #[default]
    Alphanumeric,
    Printable,
    Hex,
}

impl Alphabet {
    fn chars(self) -> &'static [u8] {
        match self {
            Self::Alphanumeric => ALPHANUMERIC_CHARS,
            Self::Printable => PRINTABLE_CHARS,
            Self::Hex => HEX_CHARS_LOWER,
        }
    }
}

fn random_string(chars: &[u8], length: usize) -> String {
    let mut rng = rand::rng();

    (0..length)
        .map(|_| char::from(*chars.choose(&mut rng).expect("the alphabet is never empty")))
        .collect()
}

/// Generates the 20-byte peer id: a fixed client prefix plus random filler.
#[derive(Debug)]
pub struct PeerIdGenerator {
    prefix: String,
    alphabet: Alphabet,
    refresh_policy: RefreshPolicy,
    cache: Mutex<GeneratorCache>,
}

#[derive(Debug, Default)]
struct GeneratorCache {
    global: Option<String>,
    per_torrent: HashMap<InfoHash, String>,
}

impl PeerIdGenerator {
    /// # Errors
    ///
    /// Returns [`Error::PeerIdPrefixTooLong`] when the prefix does not leave
    /// room for any random filler.
    pub fn new(prefix: &str, alphabet: Alphabet, refresh_policy: RefreshPolicy) -> Result<Self, Error> {
        if prefix.len() > PEER_ID_LENGTH {
            return Err(Error::PeerIdPrefixTooLong { len: prefix.len() });
        }

        Ok(Self {
            prefix: prefix.to_string(),
            alphabet,
            refresh_policy,
            cache: Mutex::new(GeneratorCache::default()),
        })
    }

    /// The peer id to report for `info_hash` on the next announce.
    #[must_use]
    pub fn peer_id_for(&self, info_hash: &InfoHash) -> String {
        let generate = || format!("{}{}", self.prefix, self.filler());

        let mut cache = self.cache.lock().expect("the peer id cache lock is poisoned");

        match self.refresh_policy {
            RefreshPolicy::Always => generate(),
            RefreshPolicy::Never => cache.global.get_or_insert_with(generate).clone(),
            RefreshPolicy::TorrentVolatile => cache.per_torrent.entry(*info_hash).or_insert_with(generate).clone(),
        }
    }

    fn filler(&self) -> String {
        random_string(self.alphabet.chars(), PEER_ID_LENGTH - self.prefix.len())
    }
}

/// Generates the session `key` query parameter.
#[derive(Debug)]
pub struct KeyGenerator {
    length: usize,
    hex_case: HexCase,
    refresh_policy: RefreshPolicy,
    cache: Mutex<GeneratorCache>,
}

impl KeyGenerator {
    #[must_use]
    pub fn new(length: usize, hex_case: HexCase, refresh_policy: RefreshPolicy) -> Self {
        Self {
            length,
            hex_case,
            refresh_policy,
            cache: Mutex::new(GeneratorCache::default()),
        }
    }

    /// The `key` value to report for `info_hash` on the next announce.
    #[must_use]
    pub fn key_for(&self, info_hash: &InfoHash) -> String {
        let chars = match self.hex_case {
            HexCase::Lower => HEX_CHARS_LOWER,
            HexCase::Upper => HEX_CHARS_UPPER,
        };
        let generate = || random_string(chars, self.length);

        let mut cache = self.cache.lock().expect("the key cache lock is poisoned");

        match self.refresh_policy {
            RefreshPolicy::Always => generate(),
            RefreshPolicy::Never => cache.global.get_or_insert_with(generate).clone(),
            RefreshPolicy::TorrentVolatile => cache.per_torrent.entry(*info_hash).or_insert_with(generate).clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ghostseed_primitives::info_hash::InfoHash;

    use super::{Alphabet, KeyGenerator, PeerIdGenerator, RefreshPolicy, PEER_ID_LENGTH};
    use crate::encoder::HexCase;

    fn sample_info_hash() -> InfoHash {
        InfoHash::new([1u8; 20])
    }

    fn another_info_hash() -> InfoHash {
        InfoHash::new([2u8; 20])
    }

    #[test]
    fn it_should_generate_a_20_byte_peer_id_starting_with_the_prefix() {
        let generator = PeerIdGenerator::new("-qB4650-", Alphabet::Alphanumeric, RefreshPolicy::Never).unwrap();

        let peer_id = generator.peer_id_for(&sample_info_hash());

        assert_eq!(peer_id.len(), PEER_ID_LENGTH);
        assert!(peer_id.starts_with("-qB4650-"));
    }

    #[test]
    fn it_should_reject_a_prefix_longer_than_the_peer_id() {
        assert!(PeerIdGenerator::new(&"x".repeat(21), Alphabet::Alphanumeric, RefreshPolicy::Never).is_err());
    }

    #[test]
    fn it_should_keep_the_same_peer_id_under_the_never_policy() {
        let generator = PeerIdGenerator::new("-qB4650-", Alphabet::Alphanumeric, RefreshPolicy::Never).unwrap();

        assert_eq!(
            generator.peer_id_for(&sample_info_hash()),
            generator.peer_id_for(&another_info_hash())
        );
    }

    #[test]
    fn it_should_keep_one_peer_id_per_torrent_under_the_volatile_policy() {
        let generator = PeerIdGenerator::new("-TR4050-", Alphabet::Alphanumeric, RefreshPolicy::TorrentVolatile).unwrap();

        let first = generator.peer_id_for(&sample_info_hash());

        assert_eq!(first, generator.peer_id_for(&sample_info_hash()));
    }

    #[test]
    fn it_should_generate_a_key_of_the_configured_length_and_case() {
        let generator = KeyGenerator::new(8, HexCase::Upper, RefreshPolicy::Always);

        let key = generator.key_for(&sample_info_hash());

        assert_eq!(key.len(), 8);
        assert!(key.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn it_should_keep_the_same_key_per_torrent_under_the_volatile_policy() {
        let generator = KeyGenerator::new(8, HexCase::Lower, RefreshPolicy::TorrentVolatile);

        assert_eq!(generator.key_for(&sample_info_hash()), generator.key_for(&sample_info_hash()));
    }
}
