//! # Storage Module
//!
//! Persistence for the identity, contacts, chat history and local users.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                    ┌──────────────────────────┐                         │
//! │                    │   trait RecordStore      │                         │
//! │                    └────────────┬─────────────┘                         │
//! │                 ┌───────────────┴───────────────┐                       │
//! │                 ▼                               ▼                       │
//! │  ┌──────────────────────────┐    ┌──────────────────────────┐           │
//! │  │  MemoryStore             │    │  SqliteStore             │           │
//! │  │  parking_lot::RwLock     │    │  rusqlite, versioned     │           │
//! │  │  tests and tooling       │    │  schema with migrations  │           │
//! │  └──────────────────────────┘    └──────────────────────────┘           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Invariant
//!
//! A store holds at most one [`IdentityRecord`]. Every implementation makes
//! [`RecordStore::insert_identity_if_absent`] atomic, so concurrent
//! first-run initializers cannot both succeed.

mod database;
mod memory;
mod schema;

pub use database::SqliteStore;
pub use memory::MemoryStore;
pub use schema::SCHEMA_VERSION;

use std::sync::Arc;

use uuid::Uuid;

use crate::contacts::ContactRecord;
use crate::error::Result;
use crate::identity::{IdentityRecord, LocalUser};
use crate::messaging::ChatHistoryRecord;

/// Result of [`RecordStore::insert_identity_if_absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored
    Inserted,
    /// An identity already existed; nothing was written
    AlreadyPresent,
}

/// Persistence collaborator for every record type
pub trait RecordStore: Send + Sync {
    // ── identity ────────────────────────────────────────────────────────

    /// Number of stored identities (0 or 1)
    fn identity_count(&self) -> Result<usize>;

    /// The stored identity, if any
    fn load_identity(&self) -> Result<Option<IdentityRecord>>;

    /// Store `record` unless an identity already exists, atomically
    fn insert_identity_if_absent(&self, record: &IdentityRecord) -> Result<InsertOutcome>;

    /// Overwrite the keys of the stored identity
    ///
    /// Fails with `NoIdentity` if none is stored and `IdentityMismatch` if
    /// `record` carries a different identifier.
    fn replace_identity_keys(&self, record: &IdentityRecord) -> Result<()>;

    // ── contacts ────────────────────────────────────────────────────────

    /// Add a contact; `ContactExists` if the uid is taken
    fn insert_contact(&self, contact: &ContactRecord) -> Result<()>;

    /// Overwrite a contact including its key map; `ContactNotFound` if absent
    fn update_contact(&self, contact: &ContactRecord) -> Result<()>;

    /// Look up a contact by uid
    fn load_contact(&self, uid: &str) -> Result<Option<ContactRecord>>;

    /// All contacts ordered by uid
    fn list_contacts(&self) -> Result<Vec<ContactRecord>>;

    /// Remove a contact; history entries keep their content but lose the link
    fn delete_contact(&self, uid: &str) -> Result<bool>;

    /// Set one device's exchanged-key blob; `ContactNotFound` if absent
    fn set_contact_key(&self, uid: &str, device: Uuid, blob: &str) -> Result<()>;

    // ── chat history ────────────────────────────────────────────────────

    /// Append an entry; `ContactNotFound` if it names an unknown contact
    fn append_history(&self, record: &ChatHistoryRecord) -> Result<()>;

    /// Entries for `contact_uid` (or unlinked entries for `None`), oldest first
    fn history_for_contact(&self, contact_uid: Option<&str>) -> Result<Vec<ChatHistoryRecord>>;

    // ── local users ─────────────────────────────────────────────────────

    /// Insert or replace a local user
    fn save_local_user(&self, user: &LocalUser) -> Result<()>;

    /// Look up a local user by uid
    fn load_local_user(&self, uid: &str) -> Result<Option<LocalUser>>;
}

/// Storage configuration
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Path to the database file (None for in-memory)
    pub database_path: Option<String>,
}

/// Open the SQLite-backed store described by `config`
pub fn open(config: &StorageConfig) -> Result<Arc<dyn RecordStore>> {
    let store = SqliteStore::open(config.database_path.as_deref())?;
    Ok(Arc::new(store))
}
