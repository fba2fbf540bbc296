//! # Local User
//!
//! The account stored on this device. Only a SHA-256 digest of the
//! password is kept.

use serde::{Deserialize, Serialize};

use crate::crypto::sha256_hex;

/// A user account stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUser {
    /// User identifier, unique per store
    pub uid: String,
    /// Name chosen by the user
    pub username: String,
    /// SHA-256 hex of the password
    password_digest: String,
    /// Contact uids
    #[serde(default)]
    pub friend_list: Vec<String>,
}

impl LocalUser {
    /// Create a user, digesting `password`
    pub fn new(uid: impl Into<String>, username: impl Into<String>, password: &str) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
            password_digest: sha256_hex(password),
            friend_list: Vec::new(),
        }
    }

    /// Rebuild from a stored digest
    pub fn from_digest(
        uid: impl Into<String>,
        username: impl Into<String>,
        password_digest: impl Into<String>,
        friend_list: Vec<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
            password_digest: password_digest.into(),
            friend_list,
        }
    }

    /// The stored password digest
    pub fn password_digest(&self) -> &str {
        &self.password_digest
    }

    /// Check a candidate password against the stored digest
    pub fn verify_password(&self, candidate: &str) -> bool {
        let matches = sha256_hex(candidate) == self.password_digest;
        if !matches {
            tracing::debug!(uid = %self.uid, "Password check failed");
        }
        matches
    }

    /// Replace the password
    pub fn set_password(&mut self, password: &str) {
        self.password_digest = sha256_hex(password);
    }

    /// Add a contact uid; returns false if it was already listed
    pub fn add_friend(&mut self, uid: impl Into<String>) -> bool {
        let uid = uid.into();
        if self.friend_list.contains(&uid) {
            return false;
        }
        self.friend_list.push(uid);
        true
    }

    /// Remove a contact uid; returns false if it was not listed
    pub fn remove_friend(&mut self, uid: &str) -> bool {
        let before = self.friend_list.len();
        self.friend_list.retain(|f| f != uid);
        self.friend_list.len() != before
    }
}
