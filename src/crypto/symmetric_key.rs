//! # Symmetric Key Material
//!
//! Typed AES keys and initialization vectors.
//!
//! Lengths are checked once, at construction. Every other function in the
//! crate can assume a [`SymmetricKey`] is 16, 24 or 32 bytes and an
//! [`InitializationVector`] is 16 bytes.
//!
//! ## Password Derivation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    PASSWORD → KEY WINDOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  password ──► SHA-512 ──► 128 lowercase hex chars                       │
//! │                                                                         │
//! │  key:  offset = hex[0]    mod (128 - 2·len)                             │
//! │  iv:   offset = hex[127]  mod (128 - 32)                                │
//! │                                                                         │
//! │  hex[offset .. offset + 2·len] ──► hex decode ──► len bytes             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The derivation has no salt and no work factor, so the password itself is
//! the secret and is exposed to dictionary attacks. It exists so keys stay
//! compatible with existing vChat installations. New code that only needs a
//! fresh key should call [`SymmetricKey::generate`].

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use super::digest::sha512_hex;
use crate::error::{Error, Result};

/// Size of an AES initialization vector in bytes
pub const IV_SIZE: usize = 16;

/// Accepted AES key sizes in bytes
pub const KEY_SIZES: [usize; 3] = [16, 24, 32];

const KEY_SIZES_TEXT: &str = "16, 24 or 32";

/// Length of a SHA-512 digest in hex characters
const DIGEST_HEX_LEN: usize = 128;

/// AES key strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLength {
    /// AES-128 (16 bytes)
    Aes128,
    /// AES-192 (24 bytes)
    Aes192,
    /// AES-256 (32 bytes)
    #[default]
    Aes256,
}

impl KeyLength {
    /// Key size in bytes
    pub fn bytes(self) -> usize {
        match self {
            KeyLength::Aes128 => 16,
            KeyLength::Aes192 => 24,
            KeyLength::Aes256 => 32,
        }
    }

    /// Map a byte count to a key length
    pub fn from_bytes(len: usize) -> Result<Self> {
        match len {
            16 => Ok(KeyLength::Aes128),
            24 => Ok(KeyLength::Aes192),
            32 => Ok(KeyLength::Aes256),
            actual => Err(Error::InvalidLength {
                expected: KEY_SIZES_TEXT,
                actual,
            }),
        }
    }
}

/// An AES key of 16, 24 or 32 bytes
///
/// Zeroized when dropped.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: Vec<u8>,
    #[zeroize(skip)]
    length: KeyLength,
}

impl SymmetricKey {
    fn new(bytes: Vec<u8>) -> Result<Self> {
        let length = KeyLength::from_bytes(bytes.len())?;
        Ok(Self { bytes, length })
    }

    /// Create from raw bytes, accepting only 16, 24 or 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.to_vec())
    }

    /// Generate a fresh key from the OS random number generator
    pub fn generate(length: KeyLength) -> Self {
        let mut bytes = vec![0u8; length.bytes()];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes, length }
    }

    /// Derive a key deterministically from a password
    ///
    /// `target_len` must be 16, 24 or 32. Anything else, including lengths
    /// that would leave no room for the offset window, is `InvalidLength`.
    pub fn from_password(password: &str, target_len: usize) -> Result<Self> {
        KeyLength::from_bytes(target_len)?;
        let digest = sha512_hex(password);
        let offset_byte = digest.as_bytes()[0];
        derive_window(&digest, offset_byte, target_len).and_then(Self::new)
    }

    /// Decode from exactly `length * 2` hex characters
    pub fn from_hex(hex_str: &str, length: usize) -> Result<Self> {
        KeyLength::from_bytes(length)?;
        decode_hex_exact(hex_str, length).and_then(Self::new)
    }

    /// Decode from standard padded base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = decode_base64(encoded)?;
        Self::from_bytes(&bytes)
    }

    /// Key strength
    pub fn length(&self) -> KeyLength {
        self.length
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex, two characters per byte
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Standard padded base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({} bytes)", self.bytes.len())
    }
}

/// A 16-byte AES initialization vector
///
/// Not secret, but it must never repeat under the same key for CBC.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InitializationVector([u8; IV_SIZE]);

impl InitializationVector {
    /// Create from raw bytes, accepting only 16 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; IV_SIZE] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: "16",
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Generate a random IV from the OS random number generator
    pub fn random() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive an IV deterministically from a password
    ///
    /// Uses the same digest window as [`SymmetricKey::from_password`] with a
    /// fixed length of 16, but takes the offset from the last digest byte.
    pub fn from_password(password: &str) -> Result<Self> {
        let digest = sha512_hex(password);
        let offset_byte = digest.as_bytes()[DIGEST_HEX_LEN - 1];
        let bytes = derive_window(&digest, offset_byte, IV_SIZE)?;
        Self::from_bytes(&bytes)
    }

    /// Decode from exactly 32 hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = decode_hex_exact(hex_str, IV_SIZE)?;
        Self::from_bytes(&bytes)
    }

    /// Decode from standard padded base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = decode_base64(encoded)?;
        Self::from_bytes(&bytes)
    }

    /// Raw IV bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }

    /// Lowercase hex, two characters per byte
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Standard padded base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

// ============================================================================
// DERIVATION HELPERS
// ============================================================================

/// Take `len * 2` hex chars from a SHA-512 hex digest at an offset chosen by
/// `offset_byte` and decode them.
fn derive_window(digest_hex: &str, offset_byte: u8, len: usize) -> Result<Vec<u8>> {
    let window = len * 2;
    if window >= DIGEST_HEX_LEN {
        return Err(Error::InvalidLength {
            expected: "less than 64",
            actual: len,
        });
    }

    let offset = usize::from(offset_byte) % (DIGEST_HEX_LEN - window);
    let slice = &digest_hex[offset..offset + window];
    hex::decode(slice).map_err(|e| Error::Internal(format!("Digest is not hex: {}", e)))
}

/// Decode hex text that must be exactly `len * 2` characters
///
/// Reports the first offending two-character group rather than a byte index.
fn decode_hex_exact(hex_str: &str, len: usize) -> Result<Vec<u8>> {
    let chars: Vec<char> = hex_str.chars().collect();
    if chars.len() != len * 2 {
        return Err(Error::LengthMismatch {
            expected: len * 2,
            actual: chars.len(),
        });
    }

    if let Some(group) = chars
        .chunks(2)
        .find(|pair| !pair.iter().all(char::is_ascii_hexdigit))
    {
        return Err(Error::BadHexDigit(group.iter().collect()));
    }

    hex::decode(hex_str).map_err(|e| Error::BadHexDigit(e.to_string()))
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| Error::DecodeFailure(e.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_bytes_lengths() {
        for len in [16, 24, 32] {
            assert!(SymmetricKey::from_bytes(&vec![7u8; len]).is_ok());
        }
        for len in [0, 1, 15, 17, 23, 31, 33, 64] {
            let err = SymmetricKey::from_bytes(&vec![7u8; len]).unwrap_err();
            assert!(matches!(err, Error::InvalidLength { actual, .. } if actual == len));
        }
    }

    #[test]
    fn test_iv_from_bytes_lengths() {
        assert!(InitializationVector::from_bytes(&[1u8; 16]).is_ok());
        assert!(InitializationVector::from_bytes(&[1u8; 15]).is_err());
        assert!(InitializationVector::from_bytes(&[1u8; 32]).is_err());
    }

    #[test]
    fn test_password_key_deterministic() {
        let k1 = SymmetricKey::from_password("psw", 32).unwrap();
        let k2 = SymmetricKey::from_password("psw", 32).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.as_bytes().len(), 32);

        let other = SymmetricKey::from_password("psw2", 32).unwrap();
        assert_ne!(k1, other);
    }

    #[test]
    fn test_password_key_window() {
        // Recompute the window by hand for each supported length.
        let digest = sha512_hex("this is a password");
        for len in [16usize, 24, 32] {
            let offset = usize::from(digest.as_bytes()[0]) % (128 - len * 2);
            let expected = hex::decode(&digest[offset..offset + len * 2]).unwrap();
            let key = SymmetricKey::from_password("this is a password", len).unwrap();
            assert_eq!(key.as_bytes(), expected.as_slice());
        }
    }

    #[test]
    fn test_password_iv_window() {
        let digest = sha512_hex("this is a password");
        let offset = usize::from(digest.as_bytes()[127]) % (128 - 32);
        let expected = hex::decode(&digest[offset..offset + 32]).unwrap();
        let iv = InitializationVector::from_password("this is a password").unwrap();
        assert_eq!(iv.as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_password_target_length_rejected() {
        for len in [0usize, 8, 20, 48, 64, 65, 128] {
            let err = SymmetricKey::from_password("psw", len).unwrap_err();
            assert!(matches!(err, Error::InvalidLength { .. }));
        }
    }

    #[test]
    fn test_window_guard() {
        let digest = sha512_hex("psw");
        assert!(derive_window(&digest, 0, 64).is_err());
        assert!(derive_window(&digest, 255, 63).is_ok());
    }

    #[test]
    fn test_psw_hex_round_trip() {
        let key = SymmetricKey::from_password("psw", 32).unwrap();
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        let restored = SymmetricKey::from_hex(&hex, 32).unwrap();
        assert_eq!(restored.as_bytes(), key.as_bytes());

        let iv = InitializationVector::from_password("psw").unwrap();
        let restored_iv = InitializationVector::from_hex(&iv.to_hex()).unwrap();
        assert_eq!(iv, restored_iv);
    }

    #[test]
    fn test_from_hex_length_mismatch() {
        let err = SymmetricKey::from_hex("abcd", 16).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 32, actual: 4 }));

        let err = InitializationVector::from_hex(&"0".repeat(31)).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 32, actual: 31 }));
    }

    #[test]
    fn test_from_hex_bad_digit_reports_group() {
        let mut text = "00".repeat(16);
        text.replace_range(6..8, "g1");
        match SymmetricKey::from_hex(&text, 16).unwrap_err() {
            Error::BadHexDigit(group) => assert_eq!(group, "g1"),
            other => panic!("unexpected error: {other:?}"),
        }

        // A sign prefix is not a hex digit.
        let text = format!("+1{}", "00".repeat(15));
        assert!(matches!(
            SymmetricKey::from_hex(&text, 16),
            Err(Error::BadHexDigit(g)) if g == "+1"
        ));
    }

    #[test]
    fn test_from_hex_accepts_uppercase() {
        let key = SymmetricKey::from_hex(&"AB".repeat(16), 16).unwrap();
        assert_eq!(key.as_bytes(), &[0xABu8; 16]);
        assert_eq!(key.to_hex(), "ab".repeat(16));
    }

    #[test]
    fn test_base64_round_trip() {
        let key = SymmetricKey::generate(KeyLength::Aes192);
        let restored = SymmetricKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key, restored);

        let iv = InitializationVector::random();
        assert_eq!(InitializationVector::from_base64(&iv.to_base64()).unwrap(), iv);
    }

    #[test]
    fn test_base64_failures() {
        assert!(matches!(
            SymmetricKey::from_base64("not base64!!"),
            Err(Error::DecodeFailure(_))
        ));
        // Valid base64, wrong length.
        assert!(matches!(
            SymmetricKey::from_base64("AAAA"),
            Err(Error::InvalidLength { actual: 3, .. })
        ));
        assert!(matches!(
            InitializationVector::from_base64(""),
            Err(Error::InvalidLength { actual: 0, .. })
        ));
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = SymmetricKey::generate(KeyLength::Aes256);
        let b = SymmetricKey::generate(KeyLength::Aes256);
        assert_ne!(a, b);
        assert_eq!(a.length(), KeyLength::Aes256);
    }

    #[test]
    fn test_length_matches_bytes_for_every_constructor() {
        for len in KEY_SIZES {
            let derived = SymmetricKey::from_password("psw", len).unwrap();
            let decoded = SymmetricKey::from_hex(&derived.to_hex(), len).unwrap();
            let copied = derived.clone();
            for key in [&derived, &decoded, &copied] {
                assert_eq!(key.length().bytes(), len);
                assert_eq!(key.as_bytes().len(), len);
                assert_eq!(key.to_hex().len(), len * 2);
            }
        }
    }

    #[test]
    fn test_debug_hides_key_bytes() {
        let key = SymmetricKey::from_bytes(&[0xAA; 16]).unwrap();
        let printed = format!("{:?}", key);
        assert_eq!(printed, "SymmetricKey(16 bytes)");
    }
}
