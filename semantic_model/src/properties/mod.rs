//! Property bags and the reserved system namespace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{KbError, KbResult};

/// Prefix of every key the store writes for its own bookkeeping.
pub const SYSTEM_KEY_PREFIX: &str = "kb:";

/// Keys in the system namespace.
pub mod system_keys {
    pub const CONTENT_TYPE: &str = "kb:info_content_type";
    pub const CREATION_TIME: &str = "kb:info_creation_time";
    pub const LAST_MODIFIED: &str = "kb:info_last_modified";
    pub const INFO_NAME: &str = "kb:info_name";
    pub const INFO_ID: &str = "kb:info_id";
    pub const PEER_ADDRESSES: &str = "kb:peer_addresses";
}

/// Whether the key belongs to the system namespace.
pub fn is_system_key(key: &str) -> bool {
    key.starts_with(SYSTEM_KEY_PREFIX)
}

/// Reject keys user code must not write.
pub fn check_user_key(key: &str) -> KbResult<()> {
    if is_system_key(key) {
        Err(KbError::ReservedKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Names are used as path segments during serialization.
pub fn validate_name(name: &str) -> KbResult<()> {
    if name.contains('/') || name.contains('\\') {
        Err(KbError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

/// String to string mapping attached to tags and information items.
///
/// Keys iterate in lexical order so both backends enumerate identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBag {
    entries: BTreeMap<String, String>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, system keys included.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Keys outside the system namespace.
    pub fn user_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().filter(|k| !is_system_key(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every entry of `other` whose key is not present here. Values
    /// already held win on conflict.
    pub fn merge_missing(&mut self, other: &PropertyBag) {
        for (k, v) in other.iter() {
            self.entries
                .entry(k.to_string())
                .or_insert_with(|| v.to_string());
        }
    }
}
