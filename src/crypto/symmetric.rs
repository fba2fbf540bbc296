//! # Symmetric Cipher
//!
//! AES in CBC mode over typed buffers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CBC ENCRYPTION                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  plaintext ──► PKCS#7 pad to 16 bytes ──► AES-CBC(key, iv) ──► blocks   │
//! │                                                                         │
//! │  Key length selects the cipher:                                         │
//! │    16 bytes → AES-128    24 bytes → AES-192    32 bytes → AES-256       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security
//!
//! CBC gives confidentiality only. A modified ciphertext decrypts to garbage
//! or fails the padding check, but nothing here detects tampering reliably.
//! Use [`crate::crypto::sealed`] when integrity matters, and never reuse an
//! IV under the same key.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use serde::{Deserialize, Serialize};

use super::buffers::{CiphertextBuffer, PlaintextBuffer};
use super::symmetric_key::{InitializationVector, KeyLength, SymmetricKey};
use crate::error::{Error, Result};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Block chaining mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockMode {
    /// Cipher block chaining; requires an IV
    #[default]
    Cbc,
}

/// Padding applied before encryption and stripped after decryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Padding {
    /// PKCS#7: always pads, validated on decrypt
    #[default]
    Pkcs7,
    /// No padding: input must already be a multiple of the block size
    None,
}

/// Mode and padding for [`encrypt`] / [`decrypt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CipherOptions {
    /// Block chaining mode
    pub mode: BlockMode,
    /// Padding scheme
    pub padding: Padding,
}

/// Encrypt `plaintext` with AES-CBC
pub fn encrypt(
    plaintext: &PlaintextBuffer,
    key: &SymmetricKey,
    iv: &InitializationVector,
    options: CipherOptions,
) -> Result<CiphertextBuffer> {
    let data = plaintext.as_bytes();
    if options.padding == Padding::None && data.len() % BLOCK_SIZE != 0 {
        return Err(Error::CipherFailure(format!(
            "Unpadded input must be a multiple of {} bytes, got {}",
            BLOCK_SIZE,
            data.len()
        )));
    }

    let BlockMode::Cbc = options.mode;
    let key_bytes = key.as_bytes();
    let iv_bytes = iv.as_bytes().as_slice();

    let ciphertext = match key.length() {
        KeyLength::Aes128 => {
            encrypt_with::<cbc::Encryptor<Aes128>>(key_bytes, iv_bytes, data, options.padding)?
        }
        KeyLength::Aes192 => {
            encrypt_with::<cbc::Encryptor<Aes192>>(key_bytes, iv_bytes, data, options.padding)?
        }
        KeyLength::Aes256 => {
            encrypt_with::<cbc::Encryptor<Aes256>>(key_bytes, iv_bytes, data, options.padding)?
        }
    };

    Ok(CiphertextBuffer::from_bytes(ciphertext))
}

/// Decrypt `ciphertext` with AES-CBC
///
/// ## Errors
///
/// - `CipherFailure` if the ciphertext is empty or not block aligned
/// - `PaddingError` if the decrypted tail is not a valid PKCS#7 pad
///   (wrong key, wrong IV, or a modified ciphertext)
pub fn decrypt(
    ciphertext: &CiphertextBuffer,
    key: &SymmetricKey,
    iv: &InitializationVector,
    options: CipherOptions,
) -> Result<PlaintextBuffer> {
    let data = ciphertext.as_bytes();
    if data.len() % BLOCK_SIZE != 0 {
        return Err(Error::CipherFailure(format!(
            "Ciphertext must be a multiple of {} bytes, got {}",
            BLOCK_SIZE,
            data.len()
        )));
    }
    if data.is_empty() && options.padding == Padding::Pkcs7 {
        return Err(Error::CipherFailure("Ciphertext is empty".into()));
    }

    let BlockMode::Cbc = options.mode;
    let key_bytes = key.as_bytes();
    let iv_bytes = iv.as_bytes().as_slice();

    let plaintext = match key.length() {
        KeyLength::Aes128 => {
            decrypt_with::<cbc::Decryptor<Aes128>>(key_bytes, iv_bytes, data, options.padding)?
        }
        KeyLength::Aes192 => {
            decrypt_with::<cbc::Decryptor<Aes192>>(key_bytes, iv_bytes, data, options.padding)?
        }
        KeyLength::Aes256 => {
            decrypt_with::<cbc::Decryptor<Aes256>>(key_bytes, iv_bytes, data, options.padding)?
        }
    };

    Ok(PlaintextBuffer::from_bytes(plaintext))
}

fn encrypt_with<E>(key: &[u8], iv: &[u8], data: &[u8], padding: Padding) -> Result<Vec<u8>>
where
    E: KeyIvInit + BlockEncryptMut,
{
    let encryptor =
        E::new_from_slices(key, iv).map_err(|e| Error::CipherFailure(e.to_string()))?;

    Ok(match padding {
        Padding::Pkcs7 => encryptor.encrypt_padded_vec_mut::<Pkcs7>(data),
        Padding::None => encryptor.encrypt_padded_vec_mut::<NoPadding>(data),
    })
}

fn decrypt_with<D>(key: &[u8], iv: &[u8], data: &[u8], padding: Padding) -> Result<Vec<u8>>
where
    D: KeyIvInit + BlockDecryptMut,
{
    let decryptor =
        D::new_from_slices(key, iv).map_err(|e| Error::CipherFailure(e.to_string()))?;

    let result = match padding {
        Padding::Pkcs7 => decryptor.decrypt_padded_vec_mut::<Pkcs7>(data),
        Padding::None => decryptor.decrypt_padded_vec_mut::<NoPadding>(data),
    };

    result.map_err(|_| {
        tracing::debug!("AES-CBC decrypt rejected: invalid padding");
        Error::PaddingError
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(len: usize) -> SymmetricKey {
        SymmetricKey::from_bytes(&vec![42u8; len]).unwrap()
    }

    fn iv() -> InitializationVector {
        InitializationVector::from_bytes(&[7u8; 16]).unwrap()
    }

    #[test]
    fn test_round_trip_all_key_sizes() {
        let plaintext = PlaintextBuffer::from_text("Hello, world!");
        for len in [16, 24, 32] {
            let k = key(len);
            let ct = encrypt(&plaintext, &k, &iv(), CipherOptions::default()).unwrap();
            assert_eq!(ct.len(), 16);
            let pt = decrypt(&ct, &k, &iv(), CipherOptions::default()).unwrap();
            assert_eq!(pt, plaintext);
        }
    }

    #[test]
    fn test_empty_plaintext_pads_full_block() {
        let ct = encrypt(
            &PlaintextBuffer::from_bytes(Vec::new()),
            &key(32),
            &iv(),
            CipherOptions::default(),
        )
        .unwrap();
        assert_eq!(ct.len(), BLOCK_SIZE);
        let pt = decrypt(&ct, &key(32), &iv(), CipherOptions::default()).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn test_block_aligned_plaintext_gets_extra_block() {
        let plaintext = PlaintextBuffer::from_bytes(vec![1u8; 32]);
        let ct = encrypt(&plaintext, &key(16), &iv(), CipherOptions::default()).unwrap();
        assert_eq!(ct.len(), 48);
    }

    #[test]
    fn test_known_answer_aes128_cbc() {
        // NIST SP 800-38A F.2.1, first block.
        let k = SymmetricKey::from_hex("2b7e151628aed2a6abf7158809cf4f3c", 16).unwrap();
        let v = InitializationVector::from_hex("000102030405060708090a0b0c0d0e0f").unwrap();
        let block = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let options = CipherOptions {
            padding: Padding::None,
            ..CipherOptions::default()
        };
        let ct = encrypt(&PlaintextBuffer::from_bytes(block), &k, &v, options).unwrap();
        assert_eq!(hex::encode(ct.as_bytes()), "7649abac8119b246cee98e9b12e9197d");
    }

    #[test]
    fn test_password_material_round_trip() {
        let text = "Hello, world!".repeat(1000);
        let k = SymmetricKey::from_password("this is a password", 32).unwrap();
        let v = InitializationVector::from_password("this is a password").unwrap();
        let plaintext = PlaintextBuffer::from_text(&text);

        let ct = encrypt(&plaintext, &k, &v, CipherOptions::default()).unwrap();
        let pt = decrypt(&ct, &k, &v, CipherOptions::default()).unwrap();
        assert_eq!(pt.to_utf8().unwrap(), text);
    }

    #[test]
    fn test_wrong_key_fails_or_garbles() {
        let plaintext = PlaintextBuffer::from_text("secret message");
        let ct = encrypt(&plaintext, &key(32), &iv(), CipherOptions::default()).unwrap();
        let other = SymmetricKey::from_bytes(&[9u8; 32]).unwrap();
        match decrypt(&ct, &other, &iv(), CipherOptions::default()) {
            Err(Error::PaddingError) => {}
            Ok(pt) => assert_ne!(pt, plaintext),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unaligned_ciphertext_rejected() {
        let ct = CiphertextBuffer::from_bytes(vec![0u8; 17]);
        assert!(matches!(
            decrypt(&ct, &key(16), &iv(), CipherOptions::default()),
            Err(Error::CipherFailure(_))
        ));
        let empty = CiphertextBuffer::from_bytes(Vec::new());
        assert!(matches!(
            decrypt(&empty, &key(16), &iv(), CipherOptions::default()),
            Err(Error::CipherFailure(_))
        ));
    }

    #[test]
    fn test_unpadded_requires_alignment() {
        let options = CipherOptions {
            padding: Padding::None,
            ..CipherOptions::default()
        };
        let unaligned = PlaintextBuffer::from_bytes(vec![1u8; 10]);
        assert!(matches!(
            encrypt(&unaligned, &key(16), &iv(), options),
            Err(Error::CipherFailure(_))
        ));

        let aligned = PlaintextBuffer::from_bytes(vec![1u8; 32]);
        let ct = encrypt(&aligned, &key(16), &iv(), options).unwrap();
        assert_eq!(ct.len(), 32);
        assert_eq!(decrypt(&ct, &key(16), &iv(), options).unwrap(), aligned);
    }

    #[test]
    fn test_corrupted_padding_detected() {
        // Encrypt a full block of 0x00 without padding, then ask for PKCS#7:
        // a trailing 0x00 byte is never a valid pad.
        let raw = CipherOptions {
            padding: Padding::None,
            ..CipherOptions::default()
        };
        let ct = encrypt(&PlaintextBuffer::from_bytes(vec![0u8; 16]), &key(24), &iv(), raw)
            .unwrap();
        assert!(matches!(
            decrypt(&ct, &key(24), &iv(), CipherOptions::default()),
            Err(Error::PaddingError)
        ));
    }

    #[test]
    fn test_iv_changes_ciphertext() {
        let plaintext = PlaintextBuffer::from_text("same text");
        let a = encrypt(&plaintext, &key(32), &iv(), CipherOptions::default()).unwrap();
        let b = encrypt(
            &plaintext,
            &key(32),
            &InitializationVector::random(),
            CipherOptions::default(),
        )
        .unwrap();
        assert_ne!(a, b);
    }
}
