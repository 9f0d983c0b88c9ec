//! Content hashing for target snapshots
//!
//! Provides [`ContentHash`], a 32-byte Blake3 digest used to prove that a
//! target file is byte-identical across a dry run and to label snapshots in
//! logs.

use std::fmt;
use std::str::FromStr;

/// Digest width in bytes
const DIGEST_LEN: usize = blake3::OUT_LEN;

/// Blake3 digest of a snapshot's exact bytes
///
/// Line endings and trailing newlines count; two snapshots compare equal only
/// when they are byte-identical. Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentHash([u8; DIGEST_LEN]);

impl ContentHash {
    /// Digest of `text`
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        Self::of_bytes(text.as_bytes())
    }

    /// Digest of `bytes`
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).into())
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// First 8 bytes as hex, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digest = [0u8; DIGEST_LEN];
        if s.len() != DIGEST_LEN * 2 {
            return Err(HashError::Length(s.len()));
        }
        hex::decode_to_slice(s, &mut digest)?;
        Ok(Self(digest))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A hex string that is not a digest
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),

    #[error("not a hex digest: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_hashes_equal() {
        let a = ContentHash::of_text("<p>hi</p>\n");
        let b = ContentHash::of_text("<p>hi</p>\n");
        assert_eq!(a, b);
    }

    #[test]
    fn trailing_newline_changes_hash() {
        let a = ContentHash::of_text("<p>hi</p>");
        let b = ContentHash::of_text("<p>hi</p>\n");
        assert_ne!(a, b);
    }

    #[test]
    fn non_hex_is_rejected() {
        let result: Result<ContentHash, _> = "z".repeat(64).parse();
        assert!(matches!(result, Err(HashError::Hex(_))));
    }

    #[test]
    fn short_is_sixteen_hex_chars() {
        assert_eq!(ContentHash::of_text("x").short().len(), 16);
    }

    #[test]
    fn display_parses_back() {
        let hash = ContentHash::of_text("body { margin: 0; }\n");
        let parsed: ContentHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let result: Result<ContentHash, _> = "abcd".parse();
        assert!(matches!(result, Err(HashError::Length(4))));
    }

    #[test]
    fn serde_uses_hex_string() {
        let hash = ContentHash::of_text("x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
