//! The torrent identity: the SHA-1 over the bencoded `info` dictionary of a
//! torrent's meta-info.
use std::fmt;
use std::str::FromStr;

/// A 20-byte SHA-1 hash identifying one torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    #[must_use]
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

/// Lowercase hex. This is the "human readable" form used in logs and in the
/// elapsed-times persistence file.
impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({self})")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseInfoHashError {
    #[error("invalid info-hash length: expected 40 hex characters, got {len}")]
    InvalidLength { len: usize },

    #[error("invalid hex character in info-hash: {text}")]
    InvalidHex { text: String },
}

impl FromStr for InfoHash {
    type Err = ParseInfoHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(ParseInfoHashError::InvalidLength { len: s.len() });
        }

        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let text = std::str::from_utf8(chunk).map_err(|_| ParseInfoHashError::InvalidHex {
                text: format!("{chunk:?}"),
            })?;
            bytes[i] = u8::from_str_radix(text, 16).map_err(|_| ParseInfoHashError::InvalidHex {
                text: text.to_string(),
            })?;
        }

        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{InfoHash, ParseInfoHashError};

    #[test]
    fn it_should_display_as_lowercase_hex() {
        let info_hash = InfoHash::new([0xAB; 20]);

        assert_eq!(info_hash.to_string(), "ab".repeat(20));
    }

    #[test]
    fn it_should_round_trip_through_the_hex_form() {
        let info_hash = InfoHash::new([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11,
            0x12, 0xff,
        ]);

        assert_eq!(InfoHash::from_str(&info_hash.to_string()), Ok(info_hash));
    }

    #[test]
    fn it_should_reject_a_string_that_is_not_40_characters_long() {
        assert_eq!(
            InfoHash::from_str("deadbeef"),
            Err(ParseInfoHashError::InvalidLength { len: 8 })
        );
    }

    #[test]
    fn it_should_reject_non_hex_characters() {
        let text = "zz".repeat(20);

        assert!(matches!(
            InfoHash::from_str(&text),
            Err(ParseInfoHashError::InvalidHex { .. })
        ));
    }
}
