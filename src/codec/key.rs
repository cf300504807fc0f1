//! Digest algorithms and the Key Codec.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The six supported digest widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("malformed key: expected {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("malformed key: non-hex character at offset {0}")]
    NotHex(usize),

    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),
}

impl Algorithm {
    /// Every algorithm, in numbering order (1-6).
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Length of the hex key: two characters per digest byte.
    pub fn key_len(self) -> usize {
        match self {
            Algorithm::Md5 => 32,
            Algorithm::Sha1 => 40,
            Algorithm::Sha224 => 56,
            Algorithm::Sha256 => 64,
            Algorithm::Sha384 => 96,
            Algorithm::Sha512 => 128,
        }
    }

    /// URL prefix the algorithm is served under, e.g. `/store/sha256/`.
    pub fn route_prefix(self) -> &'static str {
        match self {
            Algorithm::Md5 => "/store/md5/",
            Algorithm::Sha1 => "/store/sha1/",
            Algorithm::Sha224 => "/store/sha224/",
            Algorithm::Sha256 => "/store/sha256/",
            Algorithm::Sha384 => "/store/sha384/",
            Algorithm::Sha512 => "/store/sha512/",
        }
    }

    /// Numeric id accepted by the posting tool's `--alg`.
    pub fn number(self) -> u8 {
        match self {
            Algorithm::Md5 => 1,
            Algorithm::Sha1 => 2,
            Algorithm::Sha224 => 3,
            Algorithm::Sha256 => 4,
            Algorithm::Sha384 => 5,
            Algorithm::Sha512 => 6,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|alg| alg.number() == n)
    }

    /// The algorithm whose keys have `len` hex characters.
    pub fn from_key_len(len: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|alg| alg.key_len() == len)
    }

    /// Lowercase hex digest of `data`.
    pub fn digest_hex(self, data: &[u8]) -> String {
        match self {
            Algorithm::Md5 => hex::encode(Md5::digest(data)),
            Algorithm::Sha1 => hex::encode(Sha1::digest(data)),
            Algorithm::Sha224 => hex::encode(Sha224::digest(data)),
            Algorithm::Sha256 => hex::encode(Sha256::digest(data)),
            Algorithm::Sha384 => hex::encode(Sha384::digest(data)),
            Algorithm::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts a name (`sha256`, case-insensitive) or a number (`4`).
impl FromStr for Algorithm {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Self::from_number(n).ok_or_else(|| KeyError::UnknownAlgorithm(s.to_string()));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| KeyError::UnknownAlgorithm(s.to_string()))
    }
}

/// Key Codec: checks length and hex-ness and lowercases.
///
/// Purely syntactic. Nothing checks that the key is the digest of any payload.
///
/// ```
/// use webstore::codec::canonicalize;
/// assert_eq!(canonicalize("AbC123", 6).unwrap(), "abc123");
/// assert!(canonicalize("abc12g", 6).is_err());
/// ```
pub fn canonicalize(segment: &str, expected_len: usize) -> Result<String, KeyError> {
    if segment.len() != expected_len {
        return Err(KeyError::WrongLength {
            expected: expected_len,
            actual: segment.len(),
        });
    }
    if let Some(offset) = segment.bytes().position(|b| !b.is_ascii_hexdigit()) {
        return Err(KeyError::NotHex(offset));
    }
    Ok(segment.to_ascii_lowercase())
}
