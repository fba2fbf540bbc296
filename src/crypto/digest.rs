//! # Digests
//!
//! One-way hashing of UTF-8 text to lowercase hexadecimal.
//!
//! | Algorithm | Output | Hex length |
//! |-----------|--------|------------|
//! | SHA-256 | 32 bytes | 64 chars |
//! | SHA-512 | 64 bytes | 128 chars |

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

/// Supported digest algorithms
///
/// Also selects the hash used by RSA-OAEP and by signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Digest output size in bytes
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

/// Hash UTF-8 text and return the lowercase hex digest
pub fn digest(text: &str, algorithm: DigestAlgorithm) -> String {
    hex::encode(digest_bytes(text.as_bytes(), algorithm))
}

/// Hash arbitrary bytes and return the raw digest
pub fn digest_bytes(data: &[u8], algorithm: DigestAlgorithm) -> Vec<u8> {
    match algorithm {
        DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// SHA-256 hex digest of `text`
pub fn sha256_hex(text: &str) -> String {
    digest(text, DigestAlgorithm::Sha256)
}

/// SHA-512 hex digest of `text`
pub fn sha512_hex(text: &str) -> String {
    digest(text, DigestAlgorithm::Sha512)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            sha256_hex("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
        assert_eq!(
            sha512_hex("test"),
            "ee26b0dd4af7e749aa1a8ee3c10ae9923f618980772e473f8819a5d4940e0db2\
             7ac185f8a0e1d5f84f88bc887fd67b143732c304cc5fa9ad8e6f57f50028a8ff"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_lowercase_fixed_length() {
        for text in ["", "a", "Hello, world!", "密码"] {
            let h256 = sha256_hex(text);
            let h512 = sha512_hex(text);
            assert_eq!(h256.len(), 64);
            assert_eq!(h512.len(), 128);
            assert!(h512.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(digest("psw", DigestAlgorithm::Sha512), sha512_hex("psw"));
        assert_eq!(digest_bytes(b"psw", DigestAlgorithm::Sha256).len(), 32);
    }
}
