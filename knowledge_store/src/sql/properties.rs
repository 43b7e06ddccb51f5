//! Property rows shared by tags and information.

use rusqlite::{params, OptionalExtension};

use semantic_model::{KbError, KbResult};

use super::connection::SqlDb;

pub(crate) fn read(db: &SqlDb, owner: i64, key: &str) -> KbResult<Option<String>> {
    let row: Option<Option<String>> = db.with_conn(|conn| {
        conn.prepare_cached(
            "SELECT p.value
               FROM property_holders h
               LEFT JOIN properties p ON p.owner_id = h.id AND p.key = ?2
              WHERE h.id = ?1",
        )?
        .query_row(params![owner, key], |row| row.get(0))
        .optional()
    })?;
    row.ok_or_else(|| vanished(owner))
}

pub(crate) fn write(db: &SqlDb, owner: i64, key: &str, value: Option<&str>) -> KbResult<()> {
    db.atomically(|| {
        ensure_holder(db, owner)?;
        db.with_conn(|conn| match value {
            Some(value) => conn.execute(
                "INSERT INTO properties(owner_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(owner_id, key) DO UPDATE SET value = excluded.value",
                params![owner, key, value],
            ),
            None => conn.execute(
                "DELETE FROM properties WHERE owner_id = ?1 AND key = ?2",
                params![owner, key],
            ),
        })?;
        Ok(())
    })
}

pub(crate) fn keys(db: &SqlDb, owner: i64) -> KbResult<Vec<String>> {
    let keys = db.with_conn(|conn| {
        let mut stmt =
            conn.prepare_cached("SELECT key FROM properties WHERE owner_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map([owner], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
    })?;
    if keys.is_empty() {
        ensure_holder(db, owner)?;
    }
    Ok(keys)
}

pub(crate) fn ensure_holder(db: &SqlDb, owner: i64) -> KbResult<()> {
    let found: Option<i64> = db.with_conn(|conn| {
        conn.query_row(
            "SELECT id FROM property_holders WHERE id = ?1",
            [owner],
            |row| row.get(0),
        )
        .optional()
    })?;
    found.map(|_| ()).ok_or_else(|| vanished(owner))
}

pub(crate) fn vanished(id: i64) -> KbError {
    KbError::NotFound(format!("row {}", id))
}
