//! # Messaging Module
//!
//! Chat history entries and the encryption of their content.
//!
//! ## Content Encryption
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CONTENT ENCRYPTION                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  seal_content(plaintext, key)                                           │
//! │    iv      = 16 random bytes                                            │
//! │    content = iv ‖ AES-CBC-PKCS7(key, iv, plaintext)                     │
//! │                                                                         │
//! │  open_content(content, key)                                             │
//! │    split off the first 16 bytes as the IV, decrypt the rest             │
//! │                                                                         │
//! │  The key comes from a password or from a contact's exchanged-key blob. │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::symmetric::{self, CipherOptions};
use crate::crypto::{
    CiphertextBuffer, InitializationVector, PlaintextBuffer, SymmetricKey, IV_SIZE,
};
use crate::error::{Error, Result};

/// What a history entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// UTF-8 text
    Text,
    /// Encoded image
    Image,
    /// Encoded audio clip
    Audio,
}

impl ContentType {
    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Audio => "audio",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            "audio" => Ok(ContentType::Audio),
            other => Err(Error::DecodeFailure(format!(
                "Unknown content type: {}",
                other
            ))),
        }
    }
}

/// One entry in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryRecord {
    /// Entry id
    pub id: Uuid,
    /// Contact the entry belongs to; cleared when the contact is deleted
    pub contact_uid: Option<String>,
    /// Content bytes, usually the output of [`seal_content`]
    pub content: Vec<u8>,
    /// What `content` holds
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// True for inbound entries
    pub is_receive: bool,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl ChatHistoryRecord {
    /// Create an entry stamped with the current time
    pub fn new(
        content: Vec<u8>,
        content_type: ContentType,
        contact_uid: Option<String>,
        is_receive: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            contact_uid,
            content,
            content_type,
            is_receive,
            timestamp: crate::time::now_timestamp_millis(),
        }
    }

    /// Plain text entry
    pub fn from_text(text: &str, contact_uid: Option<String>, is_receive: bool) -> Self {
        Self::new(
            text.as_bytes().to_vec(),
            ContentType::Text,
            contact_uid,
            is_receive,
        )
    }

    /// Text entry whose content is sealed under `key`
    pub fn sealed_text(
        text: &str,
        key: &SymmetricKey,
        contact_uid: Option<String>,
        is_receive: bool,
    ) -> Result<Self> {
        let content = seal_content(&PlaintextBuffer::from_text(text), key)?;
        Ok(Self::new(content, ContentType::Text, contact_uid, is_receive))
    }

    /// Content as UTF-8 text
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.content.clone()).map_err(|_| Error::InvalidUtf8)
    }

    /// Decrypt sealed content
    pub fn open(&self, key: &SymmetricKey) -> Result<PlaintextBuffer> {
        open_content(&self.content, key)
    }

    /// Decrypt sealed text content
    pub fn open_text(&self, key: &SymmetricKey) -> Result<String> {
        self.open(key)?.to_utf8()
    }
}

/// Encrypt content with a fresh IV and prefix the IV
pub fn seal_content(plaintext: &PlaintextBuffer, key: &SymmetricKey) -> Result<Vec<u8>> {
    let iv = InitializationVector::random();
    let ciphertext = symmetric::encrypt(plaintext, key, &iv, CipherOptions::default())?;

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(iv.as_bytes());
    out.extend_from_slice(ciphertext.as_bytes());
    Ok(out)
}

/// Reverse [`seal_content`]
pub fn open_content(content: &[u8], key: &SymmetricKey) -> Result<PlaintextBuffer> {
    if content.len() <= IV_SIZE {
        return Err(Error::InvalidLength {
            expected: "IV followed by at least one block",
            actual: content.len(),
        });
    }
    let (iv, body) = content.split_at(IV_SIZE);
    let iv = InitializationVector::from_bytes(iv)?;
    symmetric::decrypt(
        &CiphertextBuffer::from_bytes(body),
        key,
        &iv,
        CipherOptions::default(),
    )
}
