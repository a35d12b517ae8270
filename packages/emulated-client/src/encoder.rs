//! Percent-encoding the way the emulated client does it.
//!
//! Real clients differ in which bytes they leave raw in the query string and
//! in the case of the hex digits they emit, and trackers have been known to
//! fingerprint on both. The exclusion pattern is a single-character regex
//! class from the fingerprint file; everything it does not match is encoded.
use regex::Regex;
use serde::Deserialize;

use crate::Error;

/// Case of the hex digits in `%XX` escapes.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HexCase {
    #[default]
    Lower,
    Upper,
}

/// Percent-encoder configured from a client fingerprint.
#[derive(Debug, Clone)]
pub struct UrlEncoder {
    exclusion: Regex,
    hex_case: HexCase,
}

impl UrlEncoder {
    /// Builds an encoder from the fingerprint's exclusion pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExclusionPattern`] when the pattern is not a
    /// valid regex.
    pub fn new(exclusion_pattern: &str, hex_case: HexCase) -> Result<Self, Error> {
        let exclusion = Regex::new(exclusion_pattern).map_err(|source| Error::InvalidExclusionPattern {
            pattern: exclusion_pattern.to_string(),
            source,
        })?;

        Ok(Self { exclusion, hex_case })
    }

    /// Encodes raw bytes into a query-safe string.
    #[must_use]
    pub fn encode(&self, bytes: &[u8]) -> String {
        let mut encoded = String::with_capacity(bytes.len() * 3);

        for &byte in bytes {
            if self.is_excluded_from_encoding(byte) {
                encoded.push(char::from(byte));
            } else {
                match self.hex_case {
                    HexCase::Lower => encoded.push_str(&format!("%{byte:02x}")),
                    HexCase::Upper => encoded.push_str(&format!("%{byte:02X}")),
                }
            }
        }

        encoded
    }

    fn is_excluded_from_encoding(&self, byte: u8) -> bool {
        if !byte.is_ascii() {
            return false;
        }

        let mut buffer = [0u8; 1];
        buffer[0] = byte;
        let text = std::str::from_utf8(&buffer).expect("a single ASCII byte is valid UTF-8");

        self.exclusion.is_match(text)
    }
}
