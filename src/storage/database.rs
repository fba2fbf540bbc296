//! # Database
//!
//! SQLite-backed [`RecordStore`].
//!
//! ## Database Operations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DATABASE OPERATIONS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │   Application   │                                                   │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   SqliteStore   │  RecordStore implementation                       │
//! │  │   (this file)   │  - Identity (single slot)                         │
//! │  │                 │  - Contacts + exchanged keys                      │
//! │  │                 │  - Chat history, local users                      │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │    rusqlite     │  SQLite wrapper                                   │
//! │  │                 │  - Transactions                                   │
//! │  │                 │  - Prepared statements                            │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   SQLite DB     │  Storage                                          │
//! │  │   (file or      │  - In-memory for tests                            │
//! │  │    memory)      │  - File for production                            │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::schema;
use super::{InsertOutcome, RecordStore};
use crate::contacts::{ContactKeyMap, ContactRecord};
use crate::error::{Error, Result};
use crate::identity::{IdentityRecord, LocalUser};
use crate::messaging::ChatHistoryRecord;

/// How long a connection waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite record store
///
/// Wraps one connection behind a mutex. Several stores may open the same
/// file; the single-slot identity table keeps the one-identity invariant
/// across them.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::DatabaseError(format!("Failed to set busy timeout: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::DatabaseError(format!("Failed to enable foreign keys: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.conn.lock();
        read_schema_version(&conn)?
            .ok_or_else(|| Error::StorageCorrupted("Missing schema version".into()))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match read_schema_version(&tx)? {
            None => {
                tx.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;
                tx.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| {
                    Error::DatabaseError(format!("Failed to set schema version: {}", e))
                })?;

                tracing::info!("Database schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                tracing::info!(
                    "Database schema version {} is older than current {}, running migrations",
                    v,
                    schema::SCHEMA_VERSION
                );

                if v < 2 {
                    tracing::info!("Running migration v1 → v2 (identity keys to BLOB)");
                    migrate_v1_to_v2(&tx)?;
                }

                tx.execute("DELETE FROM schema_version", [])?;
                tx.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )?;

                tracing::info!(
                    "All migrations complete (now at version {})",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(Error::DatabaseError(format!(
                    "Database schema version {} is newer than supported {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(v) => {
                tracing::debug!("Database schema version: {}", v);
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_keys(conn: &Connection, uid: &str) -> Result<ContactKeyMap> {
        let mut stmt = conn
            .prepare("SELECT device_id, key_blob FROM contact_keys WHERE contact_uid = ?")
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(params![uid], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query contact keys: {}", e)))?;

        let mut keys = ContactKeyMap::new();
        for row in rows {
            let (device, blob) = row?;
            keys.insert(parse_uuid(&device)?, blob);
        }
        Ok(keys)
    }

    fn contact_exists(conn: &Connection, uid: &str) -> Result<bool> {
        Ok(conn
            .query_row("SELECT 1 FROM contacts WHERE uid = ?", params![uid], |_| Ok(()))
            .optional()?
            .is_some())
    }
}

impl RecordStore for SqliteStore {
    // ========================================================================
    // IDENTITY OPERATIONS
    // ========================================================================

    fn identity_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM device_identity", [], |row| row.get(0))
            .map_err(|e| Error::DatabaseError(format!("Failed to count identities: {}", e)))?;
        Ok(count as usize)
    }

    fn load_identity(&self) -> Result<Option<IdentityRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT identifier, public_key, private_key, created_at, updated_at
             FROM device_identity WHERE slot = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        );

        let (identifier, public_key, private_key, created_at, updated_at) = match result {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => {
                return Err(Error::DatabaseError(format!(
                    "Failed to load identity: {}",
                    e
                )))
            }
        };

        let record = IdentityRecord::from_parts(
            parse_uuid(&identifier)?,
            public_key,
            private_key,
            created_at,
            updated_at,
        )
        .map_err(|e| Error::StorageCorrupted(format!("Stored identity is invalid: {}", e)))?;

        Ok(Some(record))
    }

    fn insert_identity_if_absent(&self, record: &IdentityRecord) -> Result<InsertOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO device_identity
                 (slot, identifier, public_key, private_key, created_at, updated_at)
                 VALUES (1, ?, ?, ?, ?, ?)",
                params![
                    record.identifier().to_string(),
                    record.public_key_der(),
                    record.private_key_der(),
                    record.created_at(),
                    record.updated_at(),
                ],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to insert identity: {}", e)))?;
        tx.commit()?;

        Ok(if inserted == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyPresent
        })
    }

    fn replace_identity_keys(&self, record: &IdentityRecord) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<String> = tx
            .query_row(
                "SELECT identifier FROM device_identity WHERE slot = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let stored = stored.ok_or(Error::NoIdentity)?;
        if parse_uuid(&stored)? != record.identifier() {
            return Err(Error::IdentityMismatch(format!(
                "Stored identity is {}, not {}",
                stored,
                record.identifier()
            )));
        }

        tx.execute(
            "UPDATE device_identity SET public_key = ?, private_key = ?, updated_at = ?
             WHERE slot = 1",
            params![
                record.public_key_der(),
                record.private_key_der(),
                record.updated_at(),
            ],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to replace identity keys: {}", e)))?;
        tx.commit()?;

        Ok(())
    }

    // ========================================================================
    // CONTACT OPERATIONS
    // ========================================================================

    fn insert_contact(&self, contact: &ContactRecord) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO contacts (uid, username, nickname) VALUES (?, ?, ?)",
                params![contact.uid, contact.username, contact.nickname],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to add contact: {}", e)))?;
        if inserted == 0 {
            return Err(Error::ContactExists(contact.uid.clone()));
        }

        for (device, blob) in &contact.keys {
            tx.execute(
                "INSERT INTO contact_keys (contact_uid, device_id, key_blob) VALUES (?, ?, ?)",
                params![contact.uid, device.to_string(), blob],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to store contact key: {}", e)))?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update_contact(&self, contact: &ContactRecord) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let updated = tx
            .execute(
                "UPDATE contacts SET username = ?, nickname = ? WHERE uid = ?",
                params![contact.username, contact.nickname, contact.uid],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to update contact: {}", e)))?;
        if updated == 0 {
            return Err(Error::ContactNotFound(contact.uid.clone()));
        }

        tx.execute(
            "DELETE FROM contact_keys WHERE contact_uid = ?",
            params![contact.uid],
        )?;
        for (device, blob) in &contact.keys {
            tx.execute(
                "INSERT INTO contact_keys (contact_uid, device_id, key_blob) VALUES (?, ?, ?)",
                params![contact.uid, device.to_string(), blob],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to store contact key: {}", e)))?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_contact(&self, uid: &str) -> Result<Option<ContactRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT uid, username, nickname FROM contacts WHERE uid = ?",
            params![uid],
            |row| {
                Ok(ContactRecord {
                    uid: row.get(0)?,
                    username: row.get(1)?,
                    nickname: row.get(2)?,
                    keys: ContactKeyMap::new(),
                })
            },
        );

        match result {
            Ok(mut contact) => {
                contact.keys = Self::load_keys(&conn, uid)?;
                Ok(Some(contact))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to get contact: {}", e))),
        }
    }

    fn list_contacts(&self) -> Result<Vec<ContactRecord>> {
        let conn = self.conn.lock();

        let mut keys: BTreeMap<String, ContactKeyMap> = BTreeMap::new();
        {
            let mut stmt = conn
                .prepare("SELECT contact_uid, device_id, key_blob FROM contact_keys")
                .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|e| {
                    Error::DatabaseError(format!("Failed to query contact keys: {}", e))
                })?;
            for row in rows {
                let (uid, device, blob) = row?;
                keys.entry(uid).or_default().insert(parse_uuid(&device)?, blob);
            }
        }

        let mut stmt = conn
            .prepare("SELECT uid, username, nickname FROM contacts ORDER BY uid")
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ContactRecord {
                    uid: row.get(0)?,
                    username: row.get(1)?,
                    nickname: row.get(2)?,
                    keys: ContactKeyMap::new(),
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query contacts: {}", e)))?;

        let mut contacts = Vec::new();
        for row in rows {
            let mut contact = row
                .map_err(|e| Error::DatabaseError(format!("Failed to read contact: {}", e)))?;
            contact.keys = keys.remove(&contact.uid).unwrap_or_default();
            contacts.push(contact);
        }

        Ok(contacts)
    }

    fn delete_contact(&self, uid: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM contacts WHERE uid = ?", params![uid])
            .map_err(|e| Error::DatabaseError(format!("Failed to remove contact: {}", e)))?;

        Ok(rows > 0)
    }

    fn set_contact_key(&self, uid: &str, device: Uuid, blob: &str) -> Result<()> {
        let conn = self.conn.lock();
        if !Self::contact_exists(&conn, uid)? {
            return Err(Error::ContactNotFound(uid.to_string()));
        }

        conn.execute(
            "INSERT INTO contact_keys (contact_uid, device_id, key_blob) VALUES (?, ?, ?)
             ON CONFLICT(contact_uid, device_id) DO UPDATE SET key_blob = excluded.key_blob",
            params![uid, device.to_string(), blob],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to store contact key: {}", e)))?;

        Ok(())
    }

    // ========================================================================
    // CHAT HISTORY OPERATIONS
    // ========================================================================

    fn append_history(&self, record: &ChatHistoryRecord) -> Result<()> {
        let conn = self.conn.lock();
        if let Some(uid) = record.contact_uid.as_deref() {
            if !Self::contact_exists(&conn, uid)? {
                return Err(Error::ContactNotFound(uid.to_string()));
            }
        }

        conn.execute(
            "INSERT INTO chat_history (id, contact_uid, content, content_type, is_receive, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.id.to_string(),
                record.contact_uid,
                record.content,
                record.content_type.as_str(),
                record.is_receive,
                record.timestamp,
            ],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to store history entry: {}", e)))?;

        Ok(())
    }

    fn history_for_contact(&self, contact_uid: Option<&str>) -> Result<Vec<ChatHistoryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, contact_uid, content, content_type, is_receive, timestamp
                 FROM chat_history WHERE contact_uid IS ? ORDER BY timestamp, rowid",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![contact_uid], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query history: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, contact_uid, content, content_type, is_receive, timestamp) = row?;
            entries.push(ChatHistoryRecord {
                id: parse_uuid(&id)?,
                contact_uid,
                content,
                content_type: content_type
                    .parse()
                    .map_err(|e: Error| Error::StorageCorrupted(e.to_string()))?,
                is_receive,
                timestamp,
            });
        }

        Ok(entries)
    }

    // ========================================================================
    // LOCAL USER OPERATIONS
    // ========================================================================

    fn save_local_user(&self, user: &LocalUser) -> Result<()> {
        let conn = self.conn.lock();
        let friend_list = serde_json::to_string(&user.friend_list)?;

        conn.execute(
            "INSERT OR REPLACE INTO local_users (uid, username, password_digest, friend_list)
             VALUES (?, ?, ?, ?)",
            params![user.uid, user.username, user.password_digest(), friend_list],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to save user: {}", e)))?;

        Ok(())
    }

    fn load_local_user(&self, uid: &str) -> Result<Option<LocalUser>> {
        let conn = self.conn.lock();

        let result = conn
            .query_row(
                "SELECT uid, username, password_digest, friend_list FROM local_users WHERE uid = ?",
                params![uid],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| Error::DatabaseError(format!("Failed to get user: {}", e)))?;

        match result {
            Some((uid, username, digest, friend_list)) => {
                let friend_list: Vec<String> = serde_json::from_str(&friend_list)
                    .map_err(|e| Error::StorageCorrupted(format!("Bad friend list: {}", e)))?;
                Ok(Some(LocalUser::from_digest(uid, username, digest, friend_list)))
            }
            None => Ok(None),
        }
    }
}

fn read_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let table_exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !table_exists {
        return Ok(None);
    }

    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Move identity rows from the v1 `devices` table into `device_identity`
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::MIGRATE_V1_TO_V2)
        .map_err(|e| Error::DatabaseError(format!("Migration v1→v2 failed: {}", e)))?;

    let rows: Vec<(String, String, String)> = {
        let mut stmt =
            conn.prepare("SELECT identifier, public_key, private_key FROM devices ORDER BY rowid")?;
        let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let collected = mapped.collect::<rusqlite::Result<Vec<_>>>()?;
        collected
    };

    if rows.len() > 1 {
        tracing::warn!(
            "Found {} device identities in v1 data, keeping the first",
            rows.len()
        );
    }

    if let Some((identifier, public_key, private_key)) = rows.into_iter().next() {
        let identifier = parse_uuid(&identifier)?;
        let public_key = decode_legacy_key(&public_key)?;
        let private_key = zeroize::Zeroizing::new(decode_legacy_key(&private_key)?);
        let now = crate::time::now_timestamp();

        conn.execute(
            "INSERT INTO device_identity
             (slot, identifier, public_key, private_key, created_at, updated_at)
             VALUES (1, ?, ?, ?, ?, ?)",
            params![
                identifier.to_string(),
                public_key,
                private_key.as_slice(),
                now,
                now
            ],
        )?;
    }

    conn.execute_batch("DROP TABLE devices;")?;
    Ok(())
}

fn decode_legacy_key(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| Error::StorageCorrupted(format!("Legacy key is not base64: {}", e)))
}

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text)
        .map_err(|e| Error::StorageCorrupted(format!("Invalid UUID {:?}: {}", text, e)))
}

// ============================================================================
// TESTS
// ============================================================================
