//! # vChat Core
//!
//! Device identity and end-to-end confidentiality for the vChat P2P client.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         VCHAT CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐                      │
//! │  │  Identity   │  │  Contacts   │  │  Messaging  │                      │
//! │  │             │  │             │  │             │                      │
//! │  │ - Record    │  │ - Devices   │  │ - History   │                      │
//! │  │ - Lifecycle │  │ - Exchanged │  │ - Sealed    │                      │
//! │  │ - Rotation  │  │   keys      │  │   content   │                      │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘                      │
//! │         │                │                │                             │
//! │         └────────────────┴────────────────┘                             │
//! │                          │                                              │
//! │  ┌───────────────────────┴──┐    ┌──────────────────────────┐           │
//! │  │         Crypto           │    │         Storage          │           │
//! │  │                          │    │                          │           │
//! │  │ - RSA keys, PEM/DER      │    │ - trait RecordStore      │           │
//! │  │ - OAEP / PSS             │    │ - SQLite, versioned      │           │
//! │  │ - AES-CBC, AES-GCM       │    │ - In-memory              │           │
//! │  └──────────────────────────┘    └──────────────────────────┘           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Digests, AES, RSA, key exchange
//! - [`identity`] - The device identity and the local user account
//! - [`contacts`] - Contacts and their per-device exchanged keys
//! - [`messaging`] - Chat history records
//! - [`storage`] - Persistence (SQLite, in-memory)
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Device Identity (RSA)                                         │
//! │  ──────────────────────────────                                         │
//! │  Each installation owns one RSA keypair bound to a UUID that never      │
//! │  changes. Keys may be rotated; the identifier stays.                    │
//! │                                                                         │
//! │  Layer 2: Key Exchange (RSA-OAEP-SHA256)                                │
//! │  ───────────────────────────────────────                                │
//! │  A conversation key is sealed to each of the peer's devices with       │
//! │  that device's public key.                                              │
//! │                                                                         │
//! │  Layer 3: Content Encryption (AES-CBC or AES-GCM)                       │
//! │  ────────────────────────────────────────────────                       │
//! │  Message content is encrypted with the conversation key. CBC keeps      │
//! │  the legacy wire format; sealed boxes add authentication.               │
//! │                                                                         │
//! │  Layer 4: Signatures (RSA-PSS-SHA256)                                   │
//! │  ────────────────────────────────────                                   │
//! │  Payloads can be signed with the identity key.                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod contacts;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod storage;
/// Wall-clock timestamps.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use contacts::ContactRecord;
pub use crypto::{
    KeyLength, PemEncryption, PlaintextBuffer, PrivateKeyMaterial, PublicKeyMaterial,
    SymmetricKey,
};
pub use error::{Error, ErrorKind, Result};
pub use identity::{IdentityRecord, IdentityState, LocalUser, PublicIdentity};
pub use messaging::{ChatHistoryRecord, ContentType};
pub use storage::{MemoryStore, RecordStore, SqliteStore};

// ============================================================================
// CORE INSTANCE
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crypto::keys::check_key_bits;

/// Configuration for opening a [`VChatCore`]
///
/// Every field has a default, so `{}` is a valid JSON configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    /// Database path (in-memory if None)
    pub storage_path: Option<String>,
    /// Modulus size for generated identity keys
    pub rsa_key_bits: usize,
    /// Length of generated conversation keys
    pub symmetric_key_length: KeyLength,
    /// Parameters for exporting the private key as encrypted PEM
    pub pem_encryption: PemEncryption,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            rsa_key_bits: crypto::DEFAULT_KEY_BITS,
            symmetric_key_length: KeyLength::default(),
            pem_encryption: PemEncryption::default(),
        }
    }
}

impl CoreConfig {
    /// Parse a JSON configuration and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<()> {
        check_key_bits(self.rsa_key_bits).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if self.pem_encryption.iterations == 0 {
            return Err(Error::InvalidConfig(
                "PEM encryption needs at least one PBKDF2 iteration".into(),
            ));
        }
        Ok(())
    }
}

/// Entry point tying configuration, storage and the identity lifecycle
///
/// ## Lifecycle
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                        VCHAT CORE LIFECYCLE                             │
/// ├─────────────────────────────────────────────────────────────────────────┤
/// │                                                                         │
/// │  1. Open                                                                │
/// │     ┌─────────────┐                                                     │
/// │     │ VChatCore:: │──► Validate config                                  │
/// │     │ open()      │──► Open store, migrate schema                       │
/// │     └─────────────┘                                                     │
/// │            │                                                            │
/// │            ▼                                                            │
/// │  2. Load or Create Identity                                             │
/// │     ┌─────────────┐                                                     │
/// │     │ ensure_     │──► Load the stored record                           │
/// │     │ identity()  │──► Or generate keys and insert once                 │
/// │     └─────────────┘                                                     │
/// │            │                                                            │
/// │            ▼                                                            │
/// │  3. Ready for Operations                                                │
/// │     ┌─────────────┐                                                     │
/// │     │  Active     │◄─► Seal keys for contact devices                    │
/// │     │  State      │◄─► Encrypt / store chat history                     │
/// │     └─────────────┘◄─► Rotate identity keys                             │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub struct VChatCore {
    config: CoreConfig,
    store: Arc<dyn RecordStore>,
}

impl VChatCore {
    /// Validate `config` and open the store it names
    ///
    /// ## Example
    ///
    /// ```ignore
    /// use vchat_core::{CoreConfig, VChatCore};
    ///
    /// let core = VChatCore::open(CoreConfig::default())?;
    /// let identity = core.ensure_identity().await?;
    /// ```
    pub fn open(config: CoreConfig) -> Result<Self> {
        tracing::info!("Opening vChat Core v{}", version());
        config.validate()?;

        let store = storage::open(&storage::StorageConfig {
            database_path: config.storage_path.clone(),
        })?;

        tracing::info!(
            storage = config.storage_path.as_deref().unwrap_or(":memory:"),
            "vChat Core opened"
        );
        Ok(Self { config, store })
    }

    /// Use an existing store instead of opening one
    pub fn with_store(config: CoreConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    /// The active configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The persistence collaborator
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Whether an identity exists yet
    pub fn identity_state(&self) -> Result<IdentityState> {
        identity::identity_state(self.store.as_ref())
    }

    /// The stored identity; `NoIdentity` before initialization
    pub fn identity(&self) -> Result<IdentityRecord> {
        identity::load_identity(self.store.as_ref())
    }

    /// Load the identity, creating it on first run
    pub async fn ensure_identity(&self) -> Result<IdentityRecord> {
        identity::ensure_identity_async(Arc::clone(&self.store), self.config.rsa_key_bits).await
    }

    /// Create the identity; `AlreadyInitialized` if one exists
    pub async fn initialize_identity(&self) -> Result<IdentityRecord> {
        identity::initialize_identity_async(Arc::clone(&self.store), self.config.rsa_key_bits).await
    }

    /// Replace the identity keys, keeping the identifier
    pub async fn rotate_identity_keys(&self) -> Result<IdentityRecord> {
        identity::rotate_keys_async(Arc::clone(&self.store), self.config.rsa_key_bits).await
    }

    /// A fresh conversation key of the configured length
    pub fn generate_conversation_key(&self) -> SymmetricKey {
        SymmetricKey::generate(self.config.symmetric_key_length)
    }

    /// Export the identity's private key as password-protected PEM
    pub fn export_private_key(&self, password: &str) -> Result<String> {
        self.identity()?
            .private_key()?
            .to_encrypted_pem(password, self.config.pem_encryption)
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of vChat Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CoreConfig {
        CoreConfig {
            rsa_key_bits: 1024,
            ..CoreConfig::default()
        }
    }

    #[test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.rsa_key_bits, 4096);
        assert_eq!(config.symmetric_key_length, KeyLength::Aes256);
    }

    #[test]
    fn test_config_from_json() {
        let config = CoreConfig::from_json_str(
            r#"{"rsaKeyBits": 2048, "symmetricKeyLength": "aes128",
                "pemEncryption": {"cipher": "aes128-cbc", "iterations": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.rsa_key_bits, 2048);
        assert_eq!(config.symmetric_key_length, KeyLength::Aes128);
        assert_eq!(config.pem_encryption.iterations, 10);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"rsaKeyBits": 512}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"pemEncryption": {"iterations": 0}}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str("not json"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = CoreConfig {
            rsa_key_bits: 1000,
            ..CoreConfig::default()
        };
        assert!(matches!(
            VChatCore::open(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_identity_lifecycle() {
        let core = VChatCore::open(test_config()).unwrap();
        assert_eq!(core.identity_state().unwrap(), IdentityState::Uninitialized);
        assert!(matches!(core.identity(), Err(Error::NoIdentity)));

        let created = core.initialize_identity().await.unwrap();
        assert!(matches!(
            core.initialize_identity().await,
            Err(Error::AlreadyInitialized)
        ));

        let ensured = core.ensure_identity().await.unwrap();
        assert_eq!(ensured.identifier(), created.identifier());
        assert_eq!(ensured.public_key_der(), created.public_key_der());

        let rotated = core.rotate_identity_keys().await.unwrap();
        assert_eq!(rotated.identifier(), created.identifier());
        assert_ne!(rotated.public_key_der(), created.public_key_der());
        assert_eq!(core.identity().unwrap(), rotated);
    }

    #[tokio::test]
    async fn test_export_private_key() {
        let config = CoreConfig {
            pem_encryption: PemEncryption {
                iterations: 1,
                ..PemEncryption::default()
            },
            ..test_config()
        };
        let core = VChatCore::with_store(config, Arc::new(MemoryStore::new())).unwrap();
        assert!(matches!(
            core.export_private_key("pw"),
            Err(Error::NoIdentity)
        ));

        let identity = core.ensure_identity().await.unwrap();
        let pem = core.export_private_key("pw").unwrap();
        let restored = PrivateKeyMaterial::from_encrypted_pem(&pem, "pw").unwrap();
        assert_eq!(restored.to_der().unwrap(), identity.private_key_der());
    }

    #[test]
    fn test_conversation_key_length() {
        let config = CoreConfig {
            symmetric_key_length: KeyLength::Aes192,
            ..test_config()
        };
        let core = VChatCore::with_store(config, Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(core.generate_conversation_key().length(), KeyLength::Aes192);
    }
}
