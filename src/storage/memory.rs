//! # Memory Store
//!
//! A [`RecordStore`] held entirely in memory behind one `RwLock`. Each
//! trait method takes the lock once, so every method is atomic.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use uuid::Uuid;

use super::{InsertOutcome, RecordStore};
use crate::contacts::ContactRecord;
use crate::error::{Error, Result};
use crate::identity::{IdentityRecord, LocalUser};
use crate::messaging::ChatHistoryRecord;

#[derive(Default)]
struct State {
    identity: Option<IdentityRecord>,
    contacts: BTreeMap<String, ContactRecord>,
    history: Vec<ChatHistoryRecord>,
    users: HashMap<String, LocalUser>,
}

/// In-memory record store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn identity_count(&self) -> Result<usize> {
        Ok(usize::from(self.state.read().identity.is_some()))
    }

    fn load_identity(&self) -> Result<Option<IdentityRecord>> {
        Ok(self.state.read().identity.clone())
    }

    fn insert_identity_if_absent(&self, record: &IdentityRecord) -> Result<InsertOutcome> {
        let mut state = self.state.write();
        if state.identity.is_some() {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        state.identity = Some(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn replace_identity_keys(&self, record: &IdentityRecord) -> Result<()> {
        let mut state = self.state.write();
        let current = state.identity.as_mut().ok_or(Error::NoIdentity)?;
        if current.identifier() != record.identifier() {
            return Err(Error::IdentityMismatch(format!(
                "Stored identity is {}, not {}",
                current.identifier(),
                record.identifier()
            )));
        }
        *current = record.clone();
        Ok(())
    }

    fn insert_contact(&self, contact: &ContactRecord) -> Result<()> {
        let mut state = self.state.write();
        if state.contacts.contains_key(&contact.uid) {
            return Err(Error::ContactExists(contact.uid.clone()));
        }
        state.contacts.insert(contact.uid.clone(), contact.clone());
        Ok(())
    }

    fn update_contact(&self, contact: &ContactRecord) -> Result<()> {
        let mut state = self.state.write();
        match state.contacts.get_mut(&contact.uid) {
            Some(existing) => {
                *existing = contact.clone();
                Ok(())
            }
            None => Err(Error::ContactNotFound(contact.uid.clone())),
        }
    }

    fn load_contact(&self, uid: &str) -> Result<Option<ContactRecord>> {
        Ok(self.state.read().contacts.get(uid).cloned())
    }

    fn list_contacts(&self) -> Result<Vec<ContactRecord>> {
        Ok(self.state.read().contacts.values().cloned().collect())
    }

    fn delete_contact(&self, uid: &str) -> Result<bool> {
        let mut state = self.state.write();
        if state.contacts.remove(uid).is_none() {
            return Ok(false);
        }
        for entry in state.history.iter_mut() {
            if entry.contact_uid.as_deref() == Some(uid) {
                entry.contact_uid = None;
            }
        }
        Ok(true)
    }

    fn set_contact_key(&self, uid: &str, device: Uuid, blob: &str) -> Result<()> {
        let mut state = self.state.write();
        let contact = state
            .contacts
            .get_mut(uid)
            .ok_or_else(|| Error::ContactNotFound(uid.to_string()))?;
        contact.set_exchanged_key(device, blob);
        Ok(())
    }

    fn append_history(&self, record: &ChatHistoryRecord) -> Result<()> {
        let mut state = self.state.write();
        if let Some(uid) = record.contact_uid.as_deref() {
            if !state.contacts.contains_key(uid) {
                return Err(Error::ContactNotFound(uid.to_string()));
            }
        }
        state.history.push(record.clone());
        Ok(())
    }

    fn history_for_contact(&self, contact_uid: Option<&str>) -> Result<Vec<ChatHistoryRecord>> {
        let state = self.state.read();
        let mut entries: Vec<ChatHistoryRecord> = state
            .history
            .iter()
            .filter(|e| e.contact_uid.as_deref() == contact_uid)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    fn save_local_user(&self, user: &LocalUser) -> Result<()> {
        self.state
            .write()
            .users
            .insert(user.uid.clone(), user.clone());
        Ok(())
    }

    fn load_local_user(&self, uid: &str) -> Result<Option<LocalUser>> {
        Ok(self.state.read().users.get(uid).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ContentType;

    #[test]
    fn test_contact_crud() {
        let store = MemoryStore::new();
        let contact = ContactRecord::new("bob", "Bob", None);
        store.insert_contact(&contact).unwrap();
        assert!(matches!(
            store.insert_contact(&contact),
            Err(Error::ContactExists(_))
        ));

        let mut updated = contact.clone();
        updated.nickname = Some("Bobby".into());
        store.update_contact(&updated).unwrap();
        assert_eq!(store.load_contact("bob").unwrap(), Some(updated));

        assert!(matches!(
            store.update_contact(&ContactRecord::new("carol", "Carol", None)),
            Err(Error::ContactNotFound(_))
        ));

        assert!(store.delete_contact("bob").unwrap());
        assert!(!store.delete_contact("bob").unwrap());
        assert!(store.list_contacts().unwrap().is_empty());
    }

    #[test]
    fn test_set_contact_key() {
        let store = MemoryStore::new();
        store
            .insert_contact(&ContactRecord::new("bob", "Bob", None))
            .unwrap();
        let device = Uuid::new_v4();
        store.set_contact_key("bob", device, "blob").unwrap();

        let loaded = store.load_contact("bob").unwrap().unwrap();
        assert_eq!(loaded.exchanged_key(device), Some("blob"));

        assert!(matches!(
            store.set_contact_key("nobody", device, "blob"),
            Err(Error::ContactNotFound(_))
        ));
    }

    #[test]
    fn test_history_unlinked_on_delete() {
        let store = MemoryStore::new();
        store
            .insert_contact(&ContactRecord::new("bob", "Bob", None))
            .unwrap();
        let entry = ChatHistoryRecord::new(b"hi".to_vec(), ContentType::Text, Some("bob".into()), true);
        store.append_history(&entry).unwrap();
        assert_eq!(store.history_for_contact(Some("bob")).unwrap().len(), 1);

        store.delete_contact("bob").unwrap();
        assert!(store.history_for_contact(Some("bob")).unwrap().is_empty());
        let orphaned = store.history_for_contact(None).unwrap();
        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].id, entry.id);
    }

    #[test]
    fn test_history_requires_known_contact() {
        let store = MemoryStore::new();
        let entry = ChatHistoryRecord::from_text("hi", Some("ghost".into()), false);
        assert!(matches!(
            store.append_history(&entry),
            Err(Error::ContactNotFound(_))
        ));
    }

    #[test]
    fn test_local_user() {
        let store = MemoryStore::new();
        let user = LocalUser::new("u1", "alice", "pw");
        store.save_local_user(&user).unwrap();
        assert_eq!(store.load_local_user("u1").unwrap(), Some(user));
        assert_eq!(store.load_local_user("u2").unwrap(), None);
    }
}
