//! Error taxonomy shared by every backend.

use thiserror::Error;

/// Result alias used across the knowledge store.
pub type KbResult<T> = Result<T, KbError>;

/// Every failure the knowledge store reports to its callers.
///
/// Lookup misses are not errors: absence is an `Ok(None)` or an empty
/// sequence. `NotFound` is reserved for operations that need an existing
/// object, such as removing a tag that has vanished.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KbError {
    /// Malformed identity, e.g. a tag without subject identifiers.
    #[error("invalid tag: {0}")]
    InvalidTag(String),

    /// A subject identifier already belongs to another tag.
    #[error("duplicate subject identifier: {0}")]
    DuplicateIdentifier(String),

    /// Reparenting would make a tag its own ancestor.
    #[error("moving '{node}' under '{new_super}' would create a cycle")]
    CycleDetected { node: String, new_super: String },

    /// An operation required an object that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store connection has been released.
    #[error("store is closed")]
    ClosedStore,

    /// Any fault from the underlying storage, carrying its diagnostic.
    #[error("storage fault: {0}")]
    StorageFault(String),

    /// Names must not contain path separators.
    #[error("invalid name '{0}': path separators are not allowed")]
    InvalidName(String),

    /// User code tried to write a key from the system namespace.
    #[error("property key '{0}' is reserved for system use")]
    ReservedKey(String),
}

impl KbError {
    /// Wrap any displayable fault as a storage fault.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        KbError::StorageFault(err.to_string())
    }
}

impl From<serde_json::Error> for KbError {
    fn from(err: serde_json::Error) -> Self {
        KbError::storage(err)
    }
}

impl From<std::io::Error> for KbError {
    fn from(err: std::io::Error) -> Self {
        KbError::storage(err)
    }
}
