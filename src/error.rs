//! # Error Handling
//!
//! This module provides the error type shared by every vChat Core operation.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Validation Errors (100-199)                                       │
//! │  │   ├── InvalidLength         - Key/IV length not allowed             │
//! │  │   ├── LengthMismatch        - Hex text has the wrong length         │
//! │  │   ├── BadHexDigit           - Hex group is not hexadecimal          │
//! │  │   ├── DecodeFailure         - Base64 input rejected                 │
//! │  │   ├── InvalidUtf8           - Plaintext is not UTF-8                │
//! │  │   └── InvalidConfig         - Configuration value rejected          │
//! │  │                                                                      │
//! │  ├── Crypto Operation Errors (200-299)                                 │
//! │  │   ├── CipherFailure         - AES primitive rejected input          │
//! │  │   ├── PaddingError          - PKCS#7 pad invalid after decrypt      │
//! │  │   ├── AuthenticationFailed  - AES-GCM tag mismatch                  │
//! │  │   ├── KeyGenFailure         - RSA generation failed                 │
//! │  │   ├── EncryptFailure        - RSA encryption failed                 │
//! │  │   ├── DecryptFailure        - RSA decryption failed                 │
//! │  │   ├── PayloadTooLarge       - Input exceeds the RSA block budget    │
//! │  │   ├── SignFailure           - Signing failed                        │
//! │  │   ├── MalformedSignature    - Signature cannot belong to the key    │
//! │  │   └── KeyEncodeFailure      - DER/PEM export failed                 │
//! │  │                                                                      │
//! │  ├── Parse Errors (300-399)                                            │
//! │  │   ├── PemParseFailure       - PEM text rejected at some stage       │
//! │  │   ├── DerParseFailure       - DER bytes are not a key               │
//! │  │   └── WrongPassword         - Encrypted PEM did not decrypt         │
//! │  │                                                                      │
//! │  ├── State Errors (400-499)                                            │
//! │  │   ├── AlreadyInitialized    - Identity already exists               │
//! │  │   ├── NoIdentity            - Identity not created yet              │
//! │  │   └── IdentityMismatch      - Rotation targeted another identity    │
//! │  │                                                                      │
//! │  └── Storage Errors (500-599)                                          │
//! │      ├── DatabaseError         - SQLite failure                        │
//! │      ├── StorageCorrupted      - Persisted value failed to decode      │
//! │      ├── ContactExists         - Contact uid already stored            │
//! │      ├── ContactNotFound       - Contact uid unknown                   │
//! │      └── SerializationError    - JSON encode/decode failure            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate terminates the process. Every fallible path returns
//! one of these variants and the host decides whether to halt the session
//! or show the failure inline.

use std::fmt;

use thiserror::Error;

/// Result type alias for vChat Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// The stage of key parsing that rejected the input
///
/// Carried by [`Error::PemParseFailure`] so the host can tell the user
/// whether the text was not PEM at all or whether the key inside was bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// The PEM envelope (armor, label, base64 body)
    Envelope,
    /// A PKCS#1 `RSAPrivateKey` / `RSAPublicKey` structure
    Pkcs1,
    /// A PKCS#8 / SPKI structure
    Pkcs8,
    /// The PBES2 `EncryptedPrivateKeyInfo` container
    EncryptedContainer,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseStage::Envelope => "PEM envelope",
            ParseStage::Pkcs1 => "PKCS#1 structure",
            ParseStage::Pkcs8 => "PKCS#8 structure",
            ParseStage::EncryptedContainer => "encrypted container",
        };
        f.write_str(name)
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad key/IV length, malformed hex or base64, bad configuration
    Validation,
    /// The underlying cipher or signature primitive rejected the input
    CryptoOperation,
    /// PEM/DER input could not be parsed
    Parse,
    /// An operation was called in the wrong lifecycle state
    State,
    /// The persistence collaborator failed
    Storage,
    /// Should not happen in normal operation
    Internal,
}

/// Main error type for vChat Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors (100-199)
    // ========================================================================

    /// A key, IV or target length outside the accepted set
    #[error("Invalid length {actual}: expected {expected}")]
    InvalidLength {
        /// Human-readable description of the accepted lengths
        expected: &'static str,
        /// The length that was supplied
        actual: usize,
    },

    /// Hex text whose character count does not match the requested length
    #[error("Hex string must be {expected} characters, got {actual}")]
    LengthMismatch {
        /// Required number of hex characters
        expected: usize,
        /// Supplied number of hex characters
        actual: usize,
    },

    /// The first two-character group that is not valid hexadecimal
    #[error("Unexpected hex group: {0:?}")]
    BadHexDigit(String),

    /// Base64 input that could not be decoded
    #[error("Failed to decode base64: {0}")]
    DecodeFailure(String),

    /// Bytes that are not valid UTF-8 where text was requested
    #[error("Plaintext is not valid UTF-8")]
    InvalidUtf8,

    /// A configuration value outside its accepted range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Crypto Operation Errors (200-299)
    // ========================================================================

    /// The symmetric cipher rejected its input
    #[error("Cipher failure: {0}")]
    CipherFailure(String),

    /// The decrypted tail is not a valid PKCS#7 pad
    #[error("Invalid padding after decryption")]
    PaddingError,

    /// AES-GCM authentication tag did not verify
    #[error("Authentication failed: ciphertext or associated data was modified")]
    AuthenticationFailed,

    /// RSA key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenFailure(String),

    /// RSA encryption failed
    #[error("Encryption failed: {0}")]
    EncryptFailure(String),

    /// RSA decryption failed
    #[error("Decryption failed: {0}")]
    DecryptFailure(String),

    /// Input larger than the key can carry under the chosen padding
    #[error("Payload of {actual} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge {
        /// Largest accepted payload in bytes
        max: usize,
        /// Supplied payload size in bytes
        actual: usize,
    },

    /// Signature creation failed
    #[error("Signing failed: {0}")]
    SignFailure(String),

    /// Signature bytes that cannot belong to the verifying key
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// A key could not be exported to DER/PEM
    #[error("Failed to encode key: {0}")]
    KeyEncodeFailure(String),

    // ========================================================================
    // Parse Errors (300-399)
    // ========================================================================

    /// PEM text rejected, with the stage that failed
    #[error("Failed to parse PEM ({stage}): {reason}")]
    PemParseFailure {
        /// Where parsing stopped
        stage: ParseStage,
        /// Underlying parser message
        reason: String,
    },

    /// DER bytes that do not hold the expected key
    #[error("Failed to parse DER key: {0}")]
    DerParseFailure(String),

    /// The password did not decrypt the encrypted PEM
    #[error("Wrong password for encrypted key")]
    WrongPassword,

    // ========================================================================
    // State Errors (400-499)
    // ========================================================================

    /// An identity already exists for this installation
    #[error("Device identity is already initialized. Refusing to replace it.")]
    AlreadyInitialized,

    /// No identity has been created yet
    #[error("No device identity. Initialize the identity first.")]
    NoIdentity,

    /// Key rotation addressed an identity other than the stored one
    #[error("Identity {0} does not match the stored identity")]
    IdentityMismatch(String),

    // ========================================================================
    // Storage Errors (500-599)
    // ========================================================================

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A persisted value failed to decode
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    /// A contact with this uid already exists
    #[error("Contact already exists: {0}")]
    ContactExists(String),

    /// No contact with this uid
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Validation
    /// - 200-299: Crypto operations
    /// - 300-399: Parsing
    /// - 400-499: Lifecycle state
    /// - 500-599: Storage
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidLength { .. } => 100,
            Error::LengthMismatch { .. } => 101,
            Error::BadHexDigit(_) => 102,
            Error::DecodeFailure(_) => 103,
            Error::InvalidUtf8 => 104,
            Error::InvalidConfig(_) => 105,

            Error::CipherFailure(_) => 200,
            Error::PaddingError => 201,
            Error::AuthenticationFailed => 202,
            Error::KeyGenFailure(_) => 203,
            Error::EncryptFailure(_) => 204,
            Error::DecryptFailure(_) => 205,
            Error::PayloadTooLarge { .. } => 206,
            Error::SignFailure(_) => 207,
            Error::MalformedSignature(_) => 208,
            Error::KeyEncodeFailure(_) => 209,

            Error::PemParseFailure { .. } => 300,
            Error::DerParseFailure(_) => 301,
            Error::WrongPassword => 302,

            Error::AlreadyInitialized => 400,
            Error::NoIdentity => 401,
            Error::IdentityMismatch(_) => 402,

            Error::DatabaseError(_) => 500,
            Error::StorageCorrupted(_) => 501,
            Error::ContactExists(_) => 502,
            Error::ContactNotFound(_) => 503,
            Error::SerializationError(_) => 504,

            Error::Internal(_) => 900,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self.code() {
            100..=199 => ErrorKind::Validation,
            200..=299 => ErrorKind::CryptoOperation,
            300..=399 => ErrorKind::Parse,
            400..=499 => ErrorKind::State,
            500..=599 => ErrorKind::Storage,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors are fixed by the caller supplying different input
    /// or parameters. State errors mean the caller got the call order wrong.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::CryptoOperation | ErrorKind::Parse
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Background task failed: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================
