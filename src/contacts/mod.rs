//! # Contacts Module
//!
//! Contacts and the symmetric keys exchanged with each of their devices.
//!
//! ## Key Map
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CONTACT KEY MAP                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ContactRecord { uid: "bob", username: "Bob", nickname: None }          │
//! │                                                                         │
//! │    keys:                                                                │
//! │    ┌──────────────────────────────┬──────────────────────────────────┐  │
//! │    │ device id (UUID)             │ exchanged-key blob (base64)      │  │
//! │    ├──────────────────────────────┼──────────────────────────────────┤  │
//! │    │ 6f1c…  (Bob's phone)         │ RSA-OAEP(phone public, AES key)  │  │
//! │    │ a93e…  (Bob's laptop)        │ RSA-OAEP(laptop public, AES key) │  │
//! │    └──────────────────────────────┴──────────────────────────────────┘  │
//! │                                                                         │
//! │  One entry per device; setting a device again replaces its blob.        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{
    open_exchanged_key, seal_key_for_device, PrivateKeyMaterial, PublicKeyMaterial,
    SymmetricKey,
};
use crate::error::Result;

/// Device id → exchanged-key blob
pub type ContactKeyMap = BTreeMap<Uuid, String>;

/// A contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Contact identifier, unique per store
    pub uid: String,
    /// Name chosen by the contact
    pub username: String,
    /// Local nickname
    #[serde(default)]
    pub nickname: Option<String>,
    /// Exchanged-key blobs per device
    #[serde(default)]
    pub keys: ContactKeyMap,
}

impl ContactRecord {
    /// Create a contact with an empty key map
    pub fn new(
        uid: impl Into<String>,
        username: impl Into<String>,
        nickname: Option<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
            nickname,
            keys: ContactKeyMap::new(),
        }
    }

    /// Nickname if set, otherwise the username
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }

    /// Store a blob for `device`, returning the blob it replaced
    pub fn set_exchanged_key(&mut self, device: Uuid, blob: impl Into<String>) -> Option<String> {
        self.keys.insert(device, blob.into())
    }

    /// The blob stored for `device`
    pub fn exchanged_key(&self, device: Uuid) -> Option<&str> {
        self.keys.get(&device).map(String::as_str)
    }

    /// Forget `device`, returning its blob
    pub fn remove_device(&mut self, device: Uuid) -> Option<String> {
        self.keys.remove(&device)
    }

    /// Known device ids in ascending order
    pub fn devices(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.keys.keys().copied()
    }

    /// Seal `key` to a device's public key and store the resulting blob
    pub fn seal_key_for(
        &mut self,
        device: Uuid,
        key: &SymmetricKey,
        device_public: &PublicKeyMaterial,
    ) -> Result<String> {
        let blob = seal_key_for_device(key, device_public)?;
        self.keys.insert(device, blob.clone());
        Ok(blob)
    }

    /// Open the blob stored for `device` with our private key
    ///
    /// Returns `Ok(None)` when no blob is stored for that device.
    pub fn open_key_for(
        &self,
        device: Uuid,
        private: &PrivateKeyMaterial,
    ) -> Result<Option<SymmetricKey>> {
        self.exchanged_key(device)
            .map(|blob| open_exchanged_key(blob, private))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_key_pair, KeyLength};

    #[test]
    fn test_display_name() {
        let mut contact = ContactRecord::new("bob", "Bob", None);
        assert_eq!(contact.display_name(), "Bob");
        contact.nickname = Some("Bobby".into());
        assert_eq!(contact.display_name(), "Bobby");
    }

    #[test]
    fn test_key_map_replace_and_remove() {
        let mut contact = ContactRecord::new("bob", "Bob", None);
        let device = Uuid::new_v4();

        assert_eq!(contact.set_exchanged_key(device, "first"), None);
        assert_eq!(
            contact.set_exchanged_key(device, "second"),
            Some("first".to_string())
        );
        assert_eq!(contact.keys.len(), 1);
        assert_eq!(contact.exchanged_key(device), Some("second"));

        assert_eq!(contact.remove_device(device), Some("second".to_string()));
        assert_eq!(contact.exchanged_key(device), None);
    }

    #[test]
    fn test_seal_and_open_for_device() {
        let (private, public) = generate_key_pair(1024).unwrap();
        let device = Uuid::new_v4();
        let key = SymmetricKey::generate(KeyLength::Aes256);

        let mut contact = ContactRecord::new("bob", "Bob", None);
        contact.seal_key_for(device, &key, &public).unwrap();

        assert_eq!(contact.open_key_for(device, &private).unwrap(), Some(key));
        assert_eq!(contact.open_key_for(Uuid::new_v4(), &private).unwrap(), None);
    }

    #[test]
    fn test_serde_keys_as_uuid_strings() {
        let mut contact = ContactRecord::new("bob", "Bob", Some("B".into()));
        let device = Uuid::new_v4();
        contact.set_exchanged_key(device, "blob");

        let json = serde_json::to_string(&contact).unwrap();
        assert!(json.contains(&device.to_string()));
        let restored: ContactRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, contact);
    }

    #[test]
    fn test_devices_sorted() {
        let mut contact = ContactRecord::new("bob", "Bob", None);
        let mut ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            contact.set_exchanged_key(*id, "x");
        }
        ids.sort();
        assert_eq!(contact.devices().collect::<Vec<_>>(), ids);
    }
}
