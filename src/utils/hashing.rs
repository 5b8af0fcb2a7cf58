//! Digest helpers for consistent hashing and cache keys

use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use tracing::warn;

/// Mask that clears the sign bit so ring positions stay in the positive half
const POSITIVE_MASK: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Digest used to place keys on a hash ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// MD5 (default)
    #[default]
    Md5,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
    /// Polynomial string hash, used when the configured digest is unknown
    Simple,
}

impl HashAlgorithm {
    /// Resolve a configured digest name.
    ///
    /// Unknown names do not fail: they log a warning and select the simple
    /// string hash so the ring can still be built.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "md5" => HashAlgorithm::Md5,
            "sha-256" | "sha256" => HashAlgorithm::Sha256,
            "sha-512" | "sha512" => HashAlgorithm::Sha512,
            other => {
                warn!(
                    "Unsupported hash algorithm '{}', falling back to simple string hash",
                    other
                );
                HashAlgorithm::Simple
            }
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha-256",
            HashAlgorithm::Sha512 => "sha-512",
            HashAlgorithm::Simple => "simple",
        }
    }

    /// Hash `input` to a non-negative 64-bit ring position.
    ///
    /// Digest algorithms take the first 8 bytes big-endian with the sign bit
    /// cleared.
    pub fn hash64(&self, input: &str) -> u64 {
        match self {
            HashAlgorithm::Md5 => leading_u64(&md5::compute(input.as_bytes()).0),
            HashAlgorithm::Sha256 => leading_u64(&Sha256::digest(input.as_bytes())),
            HashAlgorithm::Sha512 => leading_u64(&Sha512::digest(input.as_bytes())),
            HashAlgorithm::Simple => simple_hash(input),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn leading_u64(digest: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) & POSITIVE_MASK
}

fn simple_hash(input: &str) -> u64 {
    input
        .bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
        & POSITIVE_MASK
}

/// Lowercase hex SHA-256 of `content`
pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
