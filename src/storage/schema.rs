//! # Database Schema
//!
//! SQL schema definitions for the vChat database.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐    ┌─────────────────┐      ┌─────────────────┐    │
//! │  │ device_identity │    │    contacts     │      │  chat_history   │    │
//! │  ├─────────────────┤    ├─────────────────┤      ├─────────────────┤    │
//! │  │ slot (= 1)      │    │ uid             │◄─────│ contact_uid     │    │
//! │  │ identifier      │    │ username        │      │ id              │    │
//! │  │ public_key  BLOB│    │ nickname        │      │ content    BLOB │    │
//! │  │ private_key BLOB│    └────────▲────────┘      │ content_type    │    │
//! │  │ created_at      │             │               │ is_receive      │    │
//! │  │ updated_at      │    ┌────────┴────────┐      │ timestamp       │    │
//! │  └─────────────────┘    │  contact_keys   │      └─────────────────┘    │
//! │                         ├─────────────────┤                             │
//! │  ┌─────────────────┐    │ contact_uid     │                             │
//! │  │   local_users   │    │ device_id       │                             │
//! │  ├─────────────────┤    │ key_blob        │                             │
//! │  │ uid             │    └─────────────────┘                             │
//! │  │ username        │                                                    │
//! │  │ password_digest │                                                    │
//! │  │ friend_list     │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Versions
//!
//! | Version | Change |
//! |---------|--------|
//! | 1 | `devices` table holding base64-text keys, any number of rows |
//! | 2 | `device_identity` single-slot table holding DER BLOBs |

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Device identity
-- The CHECK on slot allows at most one row, so INSERT OR IGNORE is an
-- atomic insert-if-absent.
CREATE TABLE IF NOT EXISTS device_identity (
    slot INTEGER PRIMARY KEY CHECK (slot = 1),
    -- UUID v4, never changes
    identifier TEXT NOT NULL UNIQUE,
    -- PKCS#1 DER
    public_key BLOB NOT NULL,
    -- PKCS#1 DER
    private_key BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Contacts
CREATE TABLE IF NOT EXISTS contacts (
    uid TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    nickname TEXT
);

-- Exchanged-key blobs, one per contact device
CREATE TABLE IF NOT EXISTS contact_keys (
    contact_uid TEXT NOT NULL REFERENCES contacts(uid) ON DELETE CASCADE,
    -- UUID of the contact's device
    device_id TEXT NOT NULL,
    -- base64 RSA-OAEP ciphertext of a symmetric key
    key_blob TEXT NOT NULL,
    PRIMARY KEY (contact_uid, device_id)
);

-- Chat history
CREATE TABLE IF NOT EXISTS chat_history (
    id TEXT PRIMARY KEY,
    -- Cleared when the contact is deleted
    contact_uid TEXT REFERENCES contacts(uid) ON DELETE SET NULL,
    content BLOB NOT NULL,
    content_type TEXT NOT NULL CHECK (content_type IN ('text', 'image', 'audio')),
    is_receive INTEGER NOT NULL,
    -- Unix milliseconds
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_history_contact ON chat_history(contact_uid, timestamp);

-- Local user accounts
CREATE TABLE IF NOT EXISTS local_users (
    uid TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    -- SHA-256 hex of the password
    password_digest TEXT NOT NULL,
    -- JSON array of contact uids
    friend_list TEXT NOT NULL DEFAULT '[]'
);
"#;

/// Version 1 layout, kept so migrations can be exercised
#[cfg(test)]
pub const CREATE_TABLES_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS devices (
    identifier TEXT PRIMARY KEY,
    public_key TEXT NOT NULL,
    private_key TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS contacts (
    uid TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    nickname TEXT
);
CREATE TABLE IF NOT EXISTS contact_keys (
    contact_uid TEXT NOT NULL REFERENCES contacts(uid) ON DELETE CASCADE,
    device_id TEXT NOT NULL,
    key_blob TEXT NOT NULL,
    PRIMARY KEY (contact_uid, device_id)
);
CREATE TABLE IF NOT EXISTS chat_history (
    id TEXT PRIMARY KEY,
    contact_uid TEXT REFERENCES contacts(uid) ON DELETE SET NULL,
    content BLOB NOT NULL,
    content_type TEXT NOT NULL CHECK (content_type IN ('text', 'image', 'audio')),
    is_receive INTEGER NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS local_users (
    uid TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    password_digest TEXT NOT NULL,
    friend_list TEXT NOT NULL DEFAULT '[]'
);
INSERT INTO schema_version (version) VALUES (1);
"#;

/// Migration from v1 to v2: tables only
///
/// Row conversion from `devices` (base64 text) into `device_identity` (DER
/// BLOBs) happens in Rust, since it has to decode base64.
pub const MIGRATE_V1_TO_V2: &str = r#"
CREATE TABLE IF NOT EXISTS device_identity (
    slot INTEGER PRIMARY KEY CHECK (slot = 1),
    identifier TEXT NOT NULL UNIQUE,
    public_key BLOB NOT NULL,
    private_key BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_history_contact ON chat_history(contact_uid, timestamp);
"#;
