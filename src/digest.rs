//! Digest values and the algorithms that produce them.
//!
//! A [`DigestValue`] is only ever produced by [`crate::hash::HashComputer`] or
//! by one of the validating parsers here; there is no way to build one from
//! unchecked bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A digest family implemented by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// SHA-1, 160-bit output
    Sha1,
    /// SHA-256, 256-bit output
    Sha256,
    /// SHA-512, 512-bit output
    Sha512,
}

impl Algorithm {
    pub const ALL: [Self; 3] = [Self::Sha1, Self::Sha256, Self::Sha512];

    /// Canonical lower-case name, also used as the directory name in the store.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the digest output in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Accepts the usual spellings: `SHA1`, `sha-1`, `SHA_256`, `sha512`...
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == normalized)
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_owned()))
    }
}

impl TryFrom<String> for Algorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> Self {
        algorithm.name().to_owned()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The output of a digest computation, tagged with the algorithm that produced it.
///
/// Two values are equal only when both the algorithm and the bytes match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DigestValue {
    algorithm: Algorithm,
    bytes: Box<[u8]>,
}

impl DigestValue {
    /// Wraps a finished accumulator output. Only the hash module calls this.
    pub(crate) fn from_output(algorithm: Algorithm, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), algorithm.output_len());
        Self {
            algorithm,
            bytes: bytes.into(),
        }
    }

    /// Parses a hex digest for a known algorithm, checking charset and length.
    pub fn from_hex(algorithm: Algorithm, hex: &str) -> Result<Self> {
        let bytes = hex::decode(hex)
            .map_err(|e| Error::InvalidDigest(format!("'{hex}' is not valid hex: {e}")))?;

        if bytes.len() != algorithm.output_len() {
            return Err(Error::InvalidDigest(format!(
                "{algorithm} digest must be {} bytes, got {}",
                algorithm.output_len(),
                bytes.len()
            )));
        }

        Ok(Self {
            algorithm,
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lower-case hex encoding, stable across runs and platforms.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Self-describing form, `<algorithm>:<hex>`.
    pub fn to_prefixed(&self) -> String {
        format!("{}:{}", self.algorithm, self.to_hex())
    }
}

impl FromStr for DigestValue {
    type Err = Error;

    /// Parses the `<algorithm>:<hex>` form produced by [`DigestValue::to_prefixed`].
    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidDigest(format!("'{s}' is missing an algorithm prefix")))?;
        Self::from_hex(algorithm.parse()?, hex)
    }
}

impl TryFrom<String> for DigestValue {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DigestValue> for String {
    fn from(digest: DigestValue) -> Self {
        digest.to_prefixed()
    }
}

impl fmt::Display for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
