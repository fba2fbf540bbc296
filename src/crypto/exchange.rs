//! # Key Exchange Blobs
//!
//! Wraps a conversation's [`SymmetricKey`] for one of a contact's devices.
//!
//! ```text
//! sender                                     receiver device
//! ──────                                     ───────────────
//! key ──► RSA-OAEP-SHA256(device public) ──► base64 blob
//!                                            stored in ContactRecord.keys[device]
//! blob ──► base64 decode ──► RSA-OAEP-SHA256(private) ──► key
//! ```
//!
//! Only the blob format is defined here; how blobs travel between peers is
//! up to the transport.

use super::asymmetric::{self, EncryptionPadding, EncryptionParams};
use super::buffers::{CiphertextBuffer, PlaintextBuffer};
use super::digest::DigestAlgorithm;
use super::keys::{PrivateKeyMaterial, PublicKeyMaterial};
use super::symmetric_key::SymmetricKey;
use crate::error::Result;

const EXCHANGE_PARAMS: EncryptionParams = EncryptionParams {
    padding: EncryptionPadding::Oaep,
    digest: DigestAlgorithm::Sha256,
};

/// Encrypt `key` to a device's public key and return the base64 blob
pub fn seal_key_for_device(key: &SymmetricKey, device: &PublicKeyMaterial) -> Result<String> {
    let plaintext = PlaintextBuffer::from_bytes(key.as_bytes());
    let ciphertext = asymmetric::encrypt(&plaintext, device, EXCHANGE_PARAMS)?;
    Ok(ciphertext.to_base64())
}

/// Recover a key from a blob made by [`seal_key_for_device`]
///
/// ## Errors
///
/// `DecodeFailure` for bad base64, `DecryptFailure` for a blob sealed to
/// another key, `InvalidLength` if the recovered bytes are not an AES key.
pub fn open_exchanged_key(blob: &str, private: &PrivateKeyMaterial) -> Result<SymmetricKey> {
    let ciphertext = CiphertextBuffer::from_base64(blob)?;
    let plaintext = asymmetric::decrypt(&ciphertext, private, EXCHANGE_PARAMS)?;
    SymmetricKey::from_bytes(plaintext.as_bytes())
}
