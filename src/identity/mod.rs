//! # Identity Module
//!
//! The device identity: one long-lived RSA keypair per installation, named
//! by a random UUID.
//!
//! ## Identity Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      IDENTITY LIFECYCLE                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   ┌───────────────┐   initialize / ensure    ┌───────────────┐          │
//! │   │ Uninitialized │ ───────────────────────► │  Initialized  │          │
//! │   └───────────────┘                          └───────┬───────┘          │
//! │                                                      │                  │
//! │                       initialize again ──► AlreadyInitialized           │
//! │                       rotate_keys      ──► new keypair, same UUID       │
//! │                                                                         │
//! │  Step 1: check the store for an existing record                         │
//! │  Step 2: generate an RSA keypair (slow; off the caller's thread when    │
//! │          driven through the async API)                                  │
//! │  Step 3: insert-if-absent, atomic in every RecordStore                  │
//! │          two racing initializers → exactly one record survives          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record Forms
//!
//! Keys are held as PKCS#1 DER bytes. The base64-text form with
//! `identifier` / `publicKey` / `privateKey` fields exists only at the
//! persistence boundary, see [`IdentityRecord::to_legacy_text`].

pub mod user;

pub use user::LocalUser;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::keys::generate_key_pair;
use crate::crypto::{PrivateKeyMaterial, PublicKeyMaterial};
use crate::error::{Error, Result};
use crate::storage::{InsertOutcome, RecordStore};

/// The single device identity
///
/// ## Security
///
/// - Holds the private key; the DER bytes are zeroized on drop
/// - `Debug` prints the identifier and public fingerprint only
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Device identifier, fixed for the life of the record
    identifier: Uuid,

    /// PKCS#1 DER of the public key
    #[serde(with = "base64_bytes")]
    public_key: Vec<u8>,

    /// PKCS#1 DER of the private key
    #[serde(with = "base64_secret")]
    private_key: Zeroizing<Vec<u8>>,

    /// When the record was created (Unix timestamp)
    #[serde(default)]
    created_at: i64,

    /// When the keys were last replaced (Unix timestamp)
    #[serde(default)]
    updated_at: i64,
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("identifier", &self.identifier)
            .field("public_key_len", &self.public_key.len())
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

impl IdentityRecord {
    /// Build a new record with a fresh v4 identifier
    pub fn new(private: &PrivateKeyMaterial, public: &PublicKeyMaterial) -> Result<Self> {
        check_pair(private, public)?;
        let now = crate::time::now_timestamp();
        Ok(Self {
            identifier: Uuid::new_v4(),
            public_key: public.to_der()?,
            private_key: Zeroizing::new(private.to_der()?),
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a record from stored parts, validating both keys
    ///
    /// ## Errors
    ///
    /// - `DerParseFailure` if either key does not parse
    /// - `IdentityMismatch` if the keys do not belong together
    pub fn from_parts(
        identifier: Uuid,
        public_key: Vec<u8>,
        private_key: Vec<u8>,
        created_at: i64,
        updated_at: i64,
    ) -> Result<Self> {
        let record = Self {
            identifier,
            public_key,
            private_key: Zeroizing::new(private_key),
            created_at,
            updated_at,
        };
        record.validate()?;
        Ok(record)
    }

    /// Parse the legacy JSON text form
    ///
    /// ```text
    /// {"identifier":"<uuid>","publicKey":"<base64 DER>","privateKey":"<base64 DER>"}
    /// ```
    pub fn from_legacy_text(text: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(text)?;
        record.validate()?;
        Ok(record)
    }

    /// Render the legacy JSON text form
    pub fn to_legacy_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The device identifier
    pub fn identifier(&self) -> Uuid {
        self.identifier
    }

    /// PKCS#1 DER of the public key
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key
    }

    /// PKCS#1 DER of the private key
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key
    }

    /// Decode the public key
    pub fn public_key(&self) -> Result<PublicKeyMaterial> {
        PublicKeyMaterial::from_der(&self.public_key)
    }

    /// Decode the private key
    pub fn private_key(&self) -> Result<PrivateKeyMaterial> {
        PrivateKeyMaterial::from_der(&self.private_key)
    }

    /// Creation time (Unix timestamp)
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Last key replacement time (Unix timestamp)
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// The shareable half of this identity
    pub fn public_identity(&self) -> Result<PublicIdentity> {
        let public = self.public_key()?;
        Ok(PublicIdentity {
            identifier: self.identifier,
            public_key: public.to_base64_der()?,
            fingerprint: public.fingerprint()?,
        })
    }

    /// Same identifier, new keys
    pub fn with_rotated_keys(
        &self,
        private: &PrivateKeyMaterial,
        public: &PublicKeyMaterial,
    ) -> Result<Self> {
        check_pair(private, public)?;
        Ok(Self {
            identifier: self.identifier,
            public_key: public.to_der()?,
            private_key: Zeroizing::new(private.to_der()?),
            created_at: self.created_at,
            updated_at: crate::time::now_timestamp(),
        })
    }

    fn validate(&self) -> Result<()> {
        let public = self.public_key()?;
        let private = self.private_key()?;
        check_pair(&private, &public)
    }
}

/// Public portion of an identity that can be shared with contacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    /// Device identifier
    pub identifier: Uuid,
    /// Base64 of the PKCS#1 DER public key
    pub public_key: String,
    /// SHA-256 hex of the DER public key
    pub fingerprint: String,
}

impl PublicIdentity {
    /// Decode the public key, checking it against the fingerprint
    pub fn public_key(&self) -> Result<PublicKeyMaterial> {
        let key = PublicKeyMaterial::from_base64_der(&self.public_key)?;
        if key.fingerprint()? != self.fingerprint {
            return Err(Error::IdentityMismatch(format!(
                "Fingerprint does not match public key for {}",
                self.identifier
            )));
        }
        Ok(key)
    }
}

/// Whether a store holds an identity yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    /// No record exists
    Uninitialized,
    /// A record exists with this identifier
    Initialized(Uuid),
}

/// Report the identity state of `store`
pub fn identity_state(store: &dyn RecordStore) -> Result<IdentityState> {
    Ok(match store.load_identity()? {
        Some(record) => IdentityState::Initialized(record.identifier()),
        None => IdentityState::Uninitialized,
    })
}

/// Load the identity, failing with `NoIdentity` if there is none
pub fn load_identity(store: &dyn RecordStore) -> Result<IdentityRecord> {
    store.load_identity()?.ok_or(Error::NoIdentity)
}

/// Create the device identity
///
/// ## Errors
///
/// `AlreadyInitialized` if an identity exists, including when another
/// initializer won a race while this one was generating keys.
pub fn initialize_identity(store: &dyn RecordStore, key_bits: usize) -> Result<IdentityRecord> {
    if store.identity_count()? > 0 {
        return Err(Error::AlreadyInitialized);
    }
    let (private, public) = generate_key_pair(key_bits)?;
    insert_new(store, &private, &public)
}

/// Async [`initialize_identity`]; the store reads, key generation and
/// insert all run on the blocking pool
pub async fn initialize_identity_async(
    store: Arc<dyn RecordStore>,
    key_bits: usize,
) -> Result<IdentityRecord> {
    tokio::task::spawn_blocking(move || initialize_identity(store.as_ref(), key_bits)).await?
}

/// Load the identity, creating it on first run
///
/// When two callers race, both receive the record that was stored first.
pub fn ensure_identity(store: &dyn RecordStore, key_bits: usize) -> Result<IdentityRecord> {
    if let Some(existing) = store.load_identity()? {
        return Ok(existing);
    }
    let (private, public) = generate_key_pair(key_bits)?;
    insert_or_adopt(store, &private, &public)
}

/// Async [`ensure_identity`], run on the blocking pool
pub async fn ensure_identity_async(
    store: Arc<dyn RecordStore>,
    key_bits: usize,
) -> Result<IdentityRecord> {
    tokio::task::spawn_blocking(move || ensure_identity(store.as_ref(), key_bits)).await?
}

/// Async [`rotate_keys`], run on the blocking pool
pub async fn rotate_keys_async(
    store: Arc<dyn RecordStore>,
    key_bits: usize,
) -> Result<IdentityRecord> {
    tokio::task::spawn_blocking(move || rotate_keys(store.as_ref(), key_bits)).await?
}

/// Replace the identity's keypair, keeping its identifier
pub fn rotate_keys(store: &dyn RecordStore, key_bits: usize) -> Result<IdentityRecord> {
    let current = load_identity(store)?;
    let (private, public) = generate_key_pair(key_bits)?;
    let rotated = current.with_rotated_keys(&private, &public)?;
    store.replace_identity_keys(&rotated)?;

    tracing::info!(identifier = %rotated.identifier(), "Identity keys rotated");
    Ok(rotated)
}

fn insert_new(
    store: &dyn RecordStore,
    private: &PrivateKeyMaterial,
    public: &PublicKeyMaterial,
) -> Result<IdentityRecord> {
    let record = IdentityRecord::new(private, public)?;
    match store.insert_identity_if_absent(&record)? {
        InsertOutcome::Inserted => {
            tracing::info!(identifier = %record.identifier(), "Identity created");
            Ok(record)
        }
        InsertOutcome::AlreadyPresent => {
            tracing::debug!("Identity initialization lost the race");
            Err(Error::AlreadyInitialized)
        }
    }
}

fn insert_or_adopt(
    store: &dyn RecordStore,
    private: &PrivateKeyMaterial,
    public: &PublicKeyMaterial,
) -> Result<IdentityRecord> {
    match insert_new(store, private, public) {
        Err(Error::AlreadyInitialized) => store
            .load_identity()?
            .ok_or_else(|| Error::Internal("Identity vanished after insert conflict".into())),
        other => other,
    }
}

fn check_pair(private: &PrivateKeyMaterial, public: &PublicKeyMaterial) -> Result<()> {
    if &private.public_key() != public {
        return Err(Error::IdentityMismatch(
            "Private key does not match public key".into(),
        ));
    }
    Ok(())
}

/// Serde helper for byte vectors as standard base64
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

/// Same as `base64_bytes`, for zeroized buffers
mod base64_secret {
    use serde::{Deserializer, Serializer};
    use zeroize::Zeroizing;

    pub fn serialize<S>(bytes: &Zeroizing<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::base64_bytes::serialize(bytes.as_slice(), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Zeroizing<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        super::base64_bytes::deserialize(deserializer).map(Zeroizing::new)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const TEST_BITS: usize = 1024;

    #[test]
    fn test_initialize_then_already_initialized() {
        let store = MemoryStore::new();
        assert_eq!(identity_state(&store).unwrap(), IdentityState::Uninitialized);

        let record = initialize_identity(&store, TEST_BITS).unwrap();
        assert_eq!(
            identity_state(&store).unwrap(),
            IdentityState::Initialized(record.identifier())
        );
        assert_eq!(record.identifier().get_version_num(), 4);

        assert!(matches!(
            initialize_identity(&store, TEST_BITS),
            Err(Error::AlreadyInitialized)
        ));
        assert_eq!(store.identity_count().unwrap(), 1);
    }

    #[test]
    fn test_ensure_identity_is_idempotent() {
        let store = MemoryStore::new();
        let first = ensure_identity(&store, TEST_BITS).unwrap();
        let second = ensure_identity(&store, TEST_BITS).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_keys_round_trip_through_record() {
        let store = MemoryStore::new();
        let record = initialize_identity(&store, TEST_BITS).unwrap();
        let private = record.private_key().unwrap();
        let public = record.public_key().unwrap();
        assert_eq!(private.public_key(), public);
        assert_eq!(private.bit_length(), TEST_BITS);
    }

    #[test]
    fn test_rotate_keeps_identifier() {
        let store = MemoryStore::new();
        let original = initialize_identity(&store, TEST_BITS).unwrap();
        let rotated = rotate_keys(&store, TEST_BITS).unwrap();

        assert_eq!(rotated.identifier(), original.identifier());
        assert_ne!(rotated.public_key_der(), original.public_key_der());
        assert_eq!(rotated.created_at(), original.created_at());

        let stored = load_identity(&store).unwrap();
        assert_eq!(stored, rotated);
    }

    #[test]
    fn test_rotate_without_identity() {
        let store = MemoryStore::new();
        assert!(matches!(
            rotate_keys(&store, TEST_BITS),
            Err(Error::NoIdentity)
        ));
    }

    #[test]
    fn test_legacy_text_round_trip() {
        let store = MemoryStore::new();
        let record = initialize_identity(&store, TEST_BITS).unwrap();

        let text = record.to_legacy_text().unwrap();
        assert!(text.contains("\"identifier\""));
        assert!(text.contains("\"publicKey\""));
        assert!(text.contains("\"privateKey\""));

        let parsed = IdentityRecord::from_legacy_text(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_legacy_text_without_timestamps() {
        let (private, public) = generate_key_pair(TEST_BITS).unwrap();
        let text = format!(
            r#"{{"identifier":"{}","publicKey":"{}","privateKey":"{}"}}"#,
            Uuid::new_v4(),
            public.to_base64_der().unwrap(),
            private.to_base64_der().unwrap()
        );
        let parsed = IdentityRecord::from_legacy_text(&text).unwrap();
        assert_eq!(parsed.created_at(), 0);
        assert_eq!(parsed.public_key().unwrap(), public);
    }

    #[test]
    fn test_mismatched_keys_rejected() {
        let (private, _) = generate_key_pair(TEST_BITS).unwrap();
        let (_, other_public) = generate_key_pair(TEST_BITS).unwrap();
        assert!(matches!(
            IdentityRecord::new(&private, &other_public),
            Err(Error::IdentityMismatch(_))
        ));
        assert!(matches!(
            IdentityRecord::from_parts(
                Uuid::new_v4(),
                other_public.to_der().unwrap(),
                private.to_der().unwrap(),
                0,
                0
            ),
            Err(Error::IdentityMismatch(_))
        ));
    }

    #[test]
    fn test_public_identity_checks_fingerprint() {
        let store = MemoryStore::new();
        let record = initialize_identity(&store, TEST_BITS).unwrap();
        let public = record.public_identity().unwrap();
        assert_eq!(public.public_key().unwrap(), record.public_key().unwrap());

        let tampered = PublicIdentity {
            fingerprint: "00".repeat(32),
            ..public
        };
        assert!(matches!(
            tampered.public_key(),
            Err(Error::IdentityMismatch(_))
        ));
    }

    #[test]
    fn test_debug_omits_private_key() {
        let store = MemoryStore::new();
        let record = initialize_identity(&store, TEST_BITS).unwrap();
        let debug = format!("{:?}", record);
        assert!(debug.contains(&record.identifier().to_string()));
        assert!(!debug.contains("private_key"));
    }

    #[tokio::test]
    async fn test_async_initialize() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let record = initialize_identity_async(Arc::clone(&store), TEST_BITS)
            .await
            .unwrap();
        assert_eq!(
            ensure_identity_async(Arc::clone(&store), TEST_BITS).await.unwrap(),
            record
        );
        assert!(matches!(
            initialize_identity_async(Arc::clone(&store), TEST_BITS).await,
            Err(Error::AlreadyInitialized)
        ));

        let rotated = rotate_keys_async(Arc::clone(&store), TEST_BITS).await.unwrap();
        assert_eq!(rotated.identifier(), record.identifier());
        assert_eq!(store.load_identity().unwrap(), Some(rotated));
    }

    #[test]
    fn test_concurrent_initialize_leaves_one_record() {
        use std::sync::{Arc, Barrier};

        let store = Arc::new(MemoryStore::new());
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ensure_identity(store.as_ref(), TEST_BITS)
                })
            })
            .collect();

        let results: Vec<IdentityRecord> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        assert_eq!(store.identity_count().unwrap(), 1);
        let stored = load_identity(store.as_ref()).unwrap();
        assert!(results.iter().all(|r| r == &stored));
    }
}
