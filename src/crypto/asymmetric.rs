//! # Asymmetric Cipher
//!
//! RSA encryption and signatures over [`PrivateKeyMaterial`] /
//! [`PublicKeyMaterial`].
//!
//! ## Payload Limits
//!
//! | Padding | Max plaintext (k = modulus bytes) |
//! |---------|-----------------------------------|
//! | PKCS#1 v1.5 | k − 11 |
//! | OAEP | k − 2·hLen − 2 |
//!
//! PKCS#1 v1.5 with SHA-256 is the default. Key exchange pins OAEP-SHA256.
//! A 4096-bit key with OAEP-SHA256 carries at most 446 bytes, enough for any
//! [`SymmetricKey`](super::SymmetricKey) but not for message bodies. When
//! the padding is larger than the modulus every message is rejected.
//!
//! ## Signatures
//!
//! The message is hashed with the selected digest, then signed with PSS
//! (default, 16-byte salt) or PKCS#1 v1.5. `verify` answers `Ok(false)` for
//! a well-formed signature that does not match.

use rand::rngs::OsRng;
use rsa::{traits::PublicKeyParts, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};

use super::buffers::{CiphertextBuffer, PlaintextBuffer, SignatureBuffer};
use super::digest::{digest_bytes, DigestAlgorithm};
use super::keys::{PrivateKeyMaterial, PublicKeyMaterial};
use crate::error::{Error, Result};

/// Overhead of PKCS#1 v1.5 encryption padding
const PKCS1V15_OVERHEAD: usize = 11;

/// Default PSS salt length in bytes
pub const DEFAULT_SALT_LEN: usize = 16;

/// Encryption padding scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionPadding {
    /// RSAES-PKCS1-v1_5
    #[default]
    Pkcs1v15,
    /// RSAES-OAEP
    Oaep,
}

/// Parameters for [`encrypt`] / [`decrypt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncryptionParams {
    /// Padding scheme
    pub padding: EncryptionPadding,
    /// Hash for OAEP and MGF1; ignored by PKCS#1 v1.5
    pub digest: DigestAlgorithm,
}

impl EncryptionParams {
    /// Largest plaintext these parameters accept for a `k`-byte modulus
    ///
    /// `None` when the padding alone does not fit in the modulus, as with
    /// OAEP-SHA512 on a 1024-bit key.
    pub fn max_payload(&self, modulus_len: usize) -> Option<usize> {
        let overhead = match self.padding {
            EncryptionPadding::Pkcs1v15 => PKCS1V15_OVERHEAD,
            EncryptionPadding::Oaep => 2 * self.digest.output_len() + 2,
        };
        modulus_len.checked_sub(overhead)
    }
}

/// Signature padding scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePadding {
    /// RSASSA-PSS
    #[default]
    Pss,
    /// RSASSA-PKCS1-v1_5
    Pkcs1v15,
}

/// Parameters for [`sign`] / [`verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParams {
    /// Padding scheme
    pub padding: SignaturePadding,
    /// Message digest
    pub digest: DigestAlgorithm,
    /// PSS salt length; ignored by PKCS#1 v1.5
    pub salt_len: usize,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            padding: SignaturePadding::Pss,
            digest: DigestAlgorithm::Sha256,
            salt_len: DEFAULT_SALT_LEN,
        }
    }
}

/// Encrypt a short message to `public`
///
/// ## Errors
///
/// - `PayloadTooLarge` if the message exceeds [`EncryptionParams::max_payload`],
///   or for any message when the key is too small for the padding
/// - `EncryptFailure` if the RSA operation fails
pub fn encrypt(
    message: &PlaintextBuffer,
    public: &PublicKeyMaterial,
    params: EncryptionParams,
) -> Result<CiphertextBuffer> {
    match params.max_payload(public.modulus_len()) {
        Some(max) if message.len() <= max => {}
        max => {
            return Err(Error::PayloadTooLarge {
                max: max.unwrap_or(0),
                actual: message.len(),
            })
        }
    }

    let key = public.inner();
    let result = match params.padding {
        EncryptionPadding::Pkcs1v15 => key.encrypt(&mut OsRng, Pkcs1v15Encrypt, message.as_bytes()),
        EncryptionPadding::Oaep => {
            key.encrypt(&mut OsRng, oaep(params.digest), message.as_bytes())
        }
    };

    result
        .map(CiphertextBuffer::from_bytes)
        .map_err(|e| Error::EncryptFailure(e.to_string()))
}

/// Decrypt a message produced by [`encrypt`]
///
/// ## Errors
///
/// - `PayloadTooLarge` if the ciphertext is longer than the modulus
/// - `DecryptFailure` for a wrong key, wrong parameters or corrupted input
pub fn decrypt(
    ciphertext: &CiphertextBuffer,
    private: &PrivateKeyMaterial,
    params: EncryptionParams,
) -> Result<PlaintextBuffer> {
    let key = private.inner();
    let k = key.size();
    if ciphertext.len() > k {
        return Err(Error::PayloadTooLarge {
            max: k,
            actual: ciphertext.len(),
        });
    }

    let result = match params.padding {
        EncryptionPadding::Pkcs1v15 => {
            key.decrypt_blinded(&mut OsRng, Pkcs1v15Encrypt, ciphertext.as_bytes())
        }
        EncryptionPadding::Oaep => {
            key.decrypt_blinded(&mut OsRng, oaep(params.digest), ciphertext.as_bytes())
        }
    };

    result.map(PlaintextBuffer::from_bytes).map_err(|e| {
        tracing::debug!("RSA decrypt rejected");
        Error::DecryptFailure(e.to_string())
    })
}

/// Sign `message` with `private`
pub fn sign(
    message: &[u8],
    private: &PrivateKeyMaterial,
    params: SignatureParams,
) -> Result<SignatureBuffer> {
    let hashed = digest_bytes(message, params.digest);
    let key = private.inner();

    let result = match params.padding {
        SignaturePadding::Pss => {
            key.sign_with_rng(&mut OsRng, pss(params.digest, params.salt_len), &hashed)
        }
        SignaturePadding::Pkcs1v15 => {
            key.sign_with_rng(&mut OsRng, pkcs1v15_sign(params.digest), &hashed)
        }
    };

    result
        .map(SignatureBuffer::from_bytes)
        .map_err(|e| Error::SignFailure(e.to_string()))
}

/// Check `signature` over `message` against `public`
///
/// ## Returns
///
/// `Ok(true)` on a valid signature, `Ok(false)` on any mismatch (tampered
/// message, other key, different parameters).
///
/// ## Errors
///
/// `MalformedSignature` when the signature length differs from the modulus
/// length, which no signature from this key can have.
pub fn verify(
    message: &[u8],
    signature: &SignatureBuffer,
    public: &PublicKeyMaterial,
    params: SignatureParams,
) -> Result<bool> {
    let k = public.modulus_len();
    if signature.len() != k {
        return Err(Error::MalformedSignature(format!(
            "expected {} bytes, got {}",
            k,
            signature.len()
        )));
    }

    let hashed = digest_bytes(message, params.digest);
    let key = public.inner();

    let result = match params.padding {
        SignaturePadding::Pss => key.verify(
            pss(params.digest, params.salt_len),
            &hashed,
            signature.as_bytes(),
        ),
        SignaturePadding::Pkcs1v15 => {
            key.verify(pkcs1v15_sign(params.digest), &hashed, signature.as_bytes())
        }
    };

    Ok(result.is_ok())
}

fn oaep(digest: DigestAlgorithm) -> Oaep {
    match digest {
        DigestAlgorithm::Sha256 => Oaep::new::<Sha256>(),
        DigestAlgorithm::Sha512 => Oaep::new::<Sha512>(),
    }
}

fn pss(digest: DigestAlgorithm, salt_len: usize) -> Pss {
    match digest {
        DigestAlgorithm::Sha256 => Pss::new_with_salt::<Sha256>(salt_len),
        DigestAlgorithm::Sha512 => Pss::new_with_salt::<Sha512>(salt_len),
    }
}

fn pkcs1v15_sign(digest: DigestAlgorithm) -> Pkcs1v15Sign {
    match digest {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
