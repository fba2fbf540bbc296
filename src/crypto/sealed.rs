//! # Sealed Boxes
//!
//! Authenticated encryption with AES-GCM for callers that need integrity on
//! top of confidentiality.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SEAL / OPEN                                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  seal(key, plaintext, aad)                                              │
//! │    nonce  = 12 random bytes from OsRng                                  │
//! │    output = AES-GCM(key, nonce, plaintext, aad) ‖ 16-byte tag           │
//! │                                                                         │
//! │  Wire form:  nonce (12) ‖ ciphertext ‖ tag (16)                         │
//! │                                                                         │
//! │  open(key, box, aad)                                                    │
//! │    any change to nonce, ciphertext, tag or aad → AuthenticationFailed   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same [`SymmetricKey`] type drives both the CBC cipher and this one;
//! its length picks AES-128-GCM, AES-192-GCM or AES-256-GCM.

use aes::Aes192;
use aes_gcm::{
    aead::{consts::U12, generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use rand::RngCore;

use super::symmetric_key::{KeyLength, SymmetricKey};
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// A nonce for AES-GCM
///
/// Never reuse a nonce with the same key. Random nonces are safe for about
/// 2^32 messages per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Nonce plus ciphertext-with-tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedBox {
    /// Nonce used for this box
    pub nonce: Nonce,
    /// Ciphertext followed by the 16-byte tag
    pub ciphertext: Vec<u8>,
}

impl SealedBox {
    /// Serialize as `nonce ‖ ciphertext ‖ tag`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(self.nonce.as_bytes());
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the wire form produced by [`SealedBox::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::InvalidLength {
                expected: "at least 28 bytes (nonce + tag)",
                actual: bytes.len(),
            });
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self {
            nonce: Nonce(nonce_bytes),
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt and authenticate `plaintext`
///
/// `aad` is authenticated but not encrypted; the same bytes must be passed
/// to [`open`].
pub fn seal(key: &SymmetricKey, plaintext: &[u8], aad: &[u8]) -> Result<SealedBox> {
    let nonce = Nonce::random();
    let ciphertext = match key.length() {
        KeyLength::Aes128 => seal_with::<Aes128Gcm>(key.as_bytes(), &nonce, plaintext, aad)?,
        KeyLength::Aes192 => seal_with::<Aes192Gcm>(key.as_bytes(), &nonce, plaintext, aad)?,
        KeyLength::Aes256 => seal_with::<Aes256Gcm>(key.as_bytes(), &nonce, plaintext, aad)?,
    };
    Ok(SealedBox { nonce, ciphertext })
}

/// Verify and decrypt a [`SealedBox`]
///
/// ## Errors
///
/// Returns `AuthenticationFailed` if the key, nonce, ciphertext, tag or AAD
/// differ from what was sealed.
pub fn open(key: &SymmetricKey, sealed: &SealedBox, aad: &[u8]) -> Result<Vec<u8>> {
    match key.length() {
        KeyLength::Aes128 => open_with::<Aes128Gcm>(key.as_bytes(), sealed, aad),
        KeyLength::Aes192 => open_with::<Aes192Gcm>(key.as_bytes(), sealed, aad),
        KeyLength::Aes256 => open_with::<Aes256Gcm>(key.as_bytes(), sealed, aad),
    }
}

fn seal_with<C>(key: &[u8], nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + KeyInit,
{
    let cipher =
        C::new_from_slice(key).map_err(|e| Error::CipherFailure(format!("Invalid key: {}", e)))?;

    cipher
        .encrypt(
            GenericArray::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| Error::CipherFailure(format!("Encryption failed: {}", e)))
}

fn open_with<C>(key: &[u8], sealed: &SealedBox, aad: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + KeyInit,
{
    let cipher =
        C::new_from_slice(key).map_err(|e| Error::CipherFailure(format!("Invalid key: {}", e)))?;

    cipher
        .decrypt(
            GenericArray::from_slice(sealed.nonce.as_bytes()),
            Payload {
                msg: &sealed.ciphertext,
                aad,
            },
        )
        .map_err(|_| Error::AuthenticationFailed)
}

// ============================================================================
// TESTS
// ============================================================================
