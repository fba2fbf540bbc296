//! # Cryptography Module
//!
//! All cryptographic primitives used by vChat Core.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    DEVICE IDENTITY                              │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  RSA keypair (4096 bits by default), generated once per device │   │
//! │  │  • Public key: shared with contacts, names the device          │   │
//! │  │  • Private key: never leaves the device unencrypted            │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 CONTENT ENCRYPTION                              │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  Symmetric key (AES-128/192/256)                               │   │
//! │  │    from a password:   SHA-512 window derivation                │   │
//! │  │    from a contact:    RSA-OAEP blob in ContactRecord.keys      │   │
//! │  │                                                                 │   │
//! │  │  AES-CBC + PKCS#7   confidentiality only                       │   │
//! │  │  AES-GCM            confidentiality + integrity                │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 SIGNATURES                                      │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  RSA-PSS (default) or PKCS#1 v1.5 over SHA-256 / SHA-512       │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: symmetric keys and plaintext buffers are zeroized
//!    when dropped
//! 2. **Secure Random**: `rand::rngs::OsRng` for keys, IVs, nonces and salts
//! 3. **Weak password derivation**: [`SymmetricKey::from_password`] has no
//!    salt or work factor and exists for compatibility with existing peers

pub mod asymmetric;
pub mod buffers;
pub mod digest;
pub mod exchange;
pub mod keys;
pub mod sealed;
pub mod symmetric;
pub mod symmetric_key;

pub use asymmetric::{
    EncryptionPadding, EncryptionParams, SignaturePadding, SignatureParams,
};
pub use buffers::{CiphertextBuffer, PlaintextBuffer, SignatureBuffer};
pub use digest::{digest, sha256_hex, sha512_hex, DigestAlgorithm};
pub use exchange::{open_exchanged_key, seal_key_for_device};
pub use keys::{
    generate_key_pair, generate_key_pair_async, PemCipher, PemEncryption, PrivateKeyMaterial,
    PublicKeyMaterial, DEFAULT_KEY_BITS,
};
pub use sealed::{Nonce, SealedBox, NONCE_SIZE};
pub use symmetric::{BlockMode, CipherOptions, Padding};
pub use symmetric_key::{InitializationVector, KeyLength, SymmetricKey, IV_SIZE};
