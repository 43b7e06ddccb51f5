//! The single connection shared by every handle of a relational store.

use std::cell::RefCell;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use semantic_model::{IdIssuer, KbError, KbResult};

use super::schema;
use super::SqlStoreConfig;

/// Connection slot plus the settings to reopen it.
///
/// `None` in the slot means the store was closed; every access then fails
/// with `ClosedStore`.
pub(crate) struct SqlDb {
    config: SqlStoreConfig,
    conn: RefCell<Option<Connection>>,
    issuer: Box<dyn IdIssuer>,
}

impl SqlDb {
    pub fn open(config: SqlStoreConfig, issuer: Box<dyn IdIssuer>) -> KbResult<Self> {
        let conn = connect(&config)?;
        Ok(Self {
            config,
            conn: RefCell::new(Some(conn)),
            issuer,
        })
    }

    pub fn config(&self) -> &SqlStoreConfig {
        &self.config
    }

    pub fn issue_id(&self) -> String {
        self.issuer.issue().to_string()
    }

    pub fn is_closed(&self) -> bool {
        self.conn.try_borrow().map_or(false, |slot| slot.is_none())
    }

    /// Run `f` against the open connection, mapping driver errors to
    /// `StorageFault`.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> KbResult<T> {
        let slot = self.conn.borrow();
        let conn = slot.as_ref().ok_or(KbError::ClosedStore)?;
        f(conn).map_err(KbError::storage)
    }

    /// Run `f` inside a transaction. Nested calls join the outer one, so only
    /// the outermost call commits.
    pub fn atomically<T>(&self, f: impl FnOnce() -> KbResult<T>) -> KbResult<T> {
        let slot = self.conn.borrow();
        let conn = slot.as_ref().ok_or(KbError::ClosedStore)?;
        if !conn.is_autocommit() {
            return f();
        }

        let tx = conn.unchecked_transaction().map_err(KbError::storage)?;
        match f() {
            Ok(value) => {
                tx.commit().map_err(KbError::storage)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(target: "kb::sql", error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Release the connection. Closing twice is a no-op.
    pub fn close(&self) -> KbResult<()> {
        let mut slot = self
            .conn
            .try_borrow_mut()
            .map_err(|_| KbError::StorageFault("store is busy".into()))?;
        if let Some(conn) = slot.take() {
            if let Err((_, err)) = conn.close() {
                tracing::warn!(target: "kb::sql", error = %err, "closing connection failed");
                return Err(KbError::storage(err));
            }
            tracing::info!(target: "kb::sql", path = %self.config.path.display(), "closed store");
        }
        Ok(())
    }

    /// Open a fresh connection, closing the current one first.
    pub fn reconnect(&self) -> KbResult<()> {
        self.close()?;
        let conn = connect(&self.config)?;
        let mut slot = self
            .conn
            .try_borrow_mut()
            .map_err(|_| KbError::StorageFault("store is busy".into()))?;
        *slot = Some(conn);
        Ok(())
    }
}

fn connect(config: &SqlStoreConfig) -> KbResult<Connection> {
    config.validate()?;

    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if config.create_if_missing {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }

    let conn = Connection::open_with_flags(&config.path, flags).map_err(|err| {
        tracing::warn!(target: "kb::sql", path = %config.path.display(), error = %err, "open failed");
        KbError::storage(err)
    })?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(KbError::storage)?;
    let journal: String = conn
        .pragma_update_and_check(None, "journal_mode", config.journal_mode.as_str(), |row| {
            row.get(0)
        })
        .map_err(KbError::storage)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(KbError::storage)?;
    schema::bootstrap(&conn).map_err(KbError::storage)?;

    tracing::info!(target: "kb::sql", path = %config.path.display(), %journal, "opened store");
    Ok(conn)
}
