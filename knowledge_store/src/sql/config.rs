//! Connection settings for the relational backend.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use semantic_model::{KbError, KbResult};

/// Where and how to open the SQLite database.
///
/// Can be built in code or read from TOML:
///
/// ```toml
/// path = "knowledge.db"
/// busy_timeout_ms = 2000
/// journal_mode = "WAL"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStoreConfig {
    /// Database file. `:memory:` opens a private in-memory database.
    pub path: PathBuf,

    /// How long a statement waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// SQLite journal mode, e.g. `WAL`, `DELETE` or `MEMORY`.
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,

    /// Create the database file when it does not exist yet.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_create_if_missing() -> bool {
    true
}

impl SqlStoreConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
            create_if_missing: default_create_if_missing(),
        }
    }

    /// A private, non-persistent database. Useful in tests.
    pub fn in_memory() -> Self {
        Self::new(":memory:").with_journal_mode("MEMORY")
    }

    pub fn from_toml_str(source: &str) -> KbResult<Self> {
        let config: Self = toml::from_str(source).map_err(KbError::storage)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    pub fn with_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = mode.into();
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Journal modes are spliced into a PRAGMA, so only letters pass.
    pub fn validate(&self) -> KbResult<()> {
        if self.journal_mode.is_empty()
            || !self.journal_mode.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(KbError::StorageFault(format!(
                "unsupported journal mode '{}'",
                self.journal_mode
            )));
        }
        Ok(())
    }
}
