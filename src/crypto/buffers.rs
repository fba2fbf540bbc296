//! # Typed Buffers
//!
//! Wrappers that keep plaintext, ciphertext and signatures from being mixed
//! up at call sites. Each cipher call borrows its input buffer and returns a
//! freshly allocated output buffer, so plaintext and ciphertext never alias.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Bytes before encryption or after decryption
///
/// Zeroized when dropped.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct PlaintextBuffer(Vec<u8>);

impl PlaintextBuffer {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Wrap UTF-8 text
    pub fn from_text(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }

    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Interpret the bytes as UTF-8 text
    pub fn to_utf8(&self) -> Result<String> {
        String::from_utf8(self.0.clone()).map_err(|_| Error::InvalidUtf8)
    }
}

impl fmt::Debug for PlaintextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlaintextBuffer({} bytes)", self.0.len())
    }
}

impl From<&str> for PlaintextBuffer {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl From<Vec<u8>> for PlaintextBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Encrypted bytes
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CiphertextBuffer(Vec<u8>);

impl CiphertextBuffer {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode from standard padded base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        STANDARD
            .decode(encoded)
            .map(Self)
            .map_err(|e| Error::DecodeFailure(e.to_string()))
    }

    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Standard padded base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

/// Signature bytes produced by [`crate::crypto::asymmetric::sign`]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureBuffer(Vec<u8>);

impl SignatureBuffer {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode from standard padded base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        STANDARD
            .decode(encoded)
            .map(Self)
            .map_err(|e| Error::DecodeFailure(e.to_string()))
    }

    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Standard padded base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_text_round_trip() {
        let buf = PlaintextBuffer::from_text("Hello, 世界");
        assert_eq!(buf.to_utf8().unwrap(), "Hello, 世界");
    }

    #[test]
    fn test_plaintext_invalid_utf8() {
        let buf = PlaintextBuffer::from_bytes(vec![0xff, 0xfe, 0x00]);
        assert!(matches!(buf.to_utf8(), Err(Error::InvalidUtf8)));
    }

    #[test]
    fn test_plaintext_debug_hides_content() {
        let buf = PlaintextBuffer::from_text("meet at noon");
        let printed = format!("{:?}", buf);
        assert_eq!(printed, "PlaintextBuffer(12 bytes)");
        assert!(!printed.contains("109"));
    }

    #[test]
    fn test_ciphertext_base64() {
        let ct = CiphertextBuffer::from_bytes(vec![0u8, 1, 2, 250, 251]);
        let encoded = ct.to_base64();
        assert!(encoded.ends_with('='));
        assert_eq!(CiphertextBuffer::from_base64(&encoded).unwrap(), ct);
        assert!(matches!(
            CiphertextBuffer::from_base64("***"),
            Err(Error::DecodeFailure(_))
        ));
    }

    #[test]
    fn test_signature_base64() {
        let sig = SignatureBuffer::from_bytes(vec![9u8; 128]);
        assert_eq!(SignatureBuffer::from_base64(&sig.to_base64()).unwrap(), sig);
    }
}
