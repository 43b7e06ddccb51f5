//! Relational tag handle: a row id plus the shared connection.

use std::fmt;
use std::rc::Rc;

use rusqlite::{params, OptionalExtension};

use semantic_model::{
    system_keys, validate_name, KbError, KbResult, TagKind, TagType, TimeSpan,
};

use super::connection::SqlDb;
use super::properties;
use crate::knowledge_base::algebra::ensure_no_cycle;
use crate::knowledge_base::{PropertyHolder, SemanticTag, SnSemanticTag, TxSemanticTag};

/// Handle to a tag row. Holds no tag state; every accessor reads the
/// database.
#[derive(Clone)]
pub struct SqlTag {
    db: Rc<SqlDb>,
    id: i64,
}

impl SqlTag {
    pub(crate) fn new(db: Rc<SqlDb>, id: i64) -> Self {
        Self { db, id }
    }

    /// Row id of the tag.
    pub fn id(&self) -> i64 {
        self.id
    }

    fn sibling(&self, id: i64) -> Self {
        Self::new(Rc::clone(&self.db), id)
    }

    fn siblings(&self, ids: Vec<i64>) -> Vec<Self> {
        ids.into_iter().map(|id| self.sibling(id)).collect()
    }

    fn ensure_exists(&self) -> KbResult<()> {
        let found: Option<i64> = self.db.with_conn(|conn| {
            conn.prepare_cached("SELECT id FROM tags WHERE id = ?1")?
                .query_row([self.id], |row| row.get(0))
                .optional()
        })?;
        found.map(|_| ()).ok_or_else(|| properties::vanished(self.id))
    }

    fn ensure_same_store(&self, other: &Self) -> KbResult<()> {
        if Rc::ptr_eq(&self.db, &other.db) {
            Ok(())
        } else {
            Err(KbError::NotFound(format!(
                "tag {} belongs to another store",
                other.id
            )))
        }
    }

    fn ids(&self, sql: &str, predicate: Option<&str>) -> KbResult<Vec<i64>> {
        let ids = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let read = |row: &rusqlite::Row<'_>| row.get::<_, i64>(0);
            let rows = match predicate {
                Some(p) => stmt.query_map(params![self.id, p], read)?,
                None => stmt.query_map(params![self.id], read)?,
            };
            rows.collect::<rusqlite::Result<Vec<i64>>>()
        })?;
        if ids.is_empty() {
            self.ensure_exists()?;
        }
        Ok(ids)
    }

    fn strings(&self, sql: &str) -> KbResult<Vec<String>> {
        let values = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map([self.id], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<String>>>()
        })?;
        if values.is_empty() {
            self.ensure_exists()?;
        }
        Ok(values)
    }

    /// `Ok(true)` when this tag already owns `si`; `DuplicateIdentifier`
    /// when any other tag in the store does.
    fn si_owned(&self, si: &str) -> KbResult<bool> {
        if si.trim().is_empty() {
            return Err(KbError::InvalidTag("blank subject identifier".into()));
        }
        let owner: Option<i64> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT tag_id FROM subject_identifiers WHERE si = ?1",
                [si],
                |row| row.get(0),
            )
            .optional()
        })?;
        match owner {
            Some(owner) if owner == self.id => Ok(true),
            Some(_) => Err(KbError::DuplicateIdentifier(si.to_string())),
            None => {
                self.ensure_exists()?;
                Ok(false)
            }
        }
    }

    fn update(&self, sql: &str, value: impl rusqlite::ToSql) -> KbResult<()> {
        let changed = self
            .db
            .with_conn(|conn| conn.execute(sql, params![self.id, value]))?;
        if changed == 0 {
            return Err(properties::vanished(self.id));
        }
        Ok(())
    }
}

impl fmt::Debug for SqlTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTag").field("id", &self.id).finish()
    }
}

impl PropertyHolder for SqlTag {
    fn property(&self, key: &str) -> KbResult<Option<String>> {
        properties::read(&self.db, self.id, key)
    }

    fn write_property(&self, key: &str, value: Option<&str>) -> KbResult<()> {
        properties::write(&self.db, self.id, key, value)
    }

    fn all_property_keys(&self) -> KbResult<Vec<String>> {
        properties::keys(&self.db, self.id)
    }
}

impl SemanticTag for SqlTag {
    fn si(&self) -> KbResult<Vec<String>> {
        self.strings("SELECT si FROM subject_identifiers WHERE tag_id = ?1 ORDER BY position")
    }

    fn add_si(&self, si: &str) -> KbResult<()> {
        self.db.atomically(|| {
            if self.si_owned(si)? {
                return Ok(());
            }
            self.db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO subject_identifiers(si, tag_id, position)
                     VALUES (?1, ?2, (SELECT COALESCE(MAX(position), -1) + 1
                                        FROM subject_identifiers WHERE tag_id = ?2))",
                    params![si, self.id],
                )
            })?;
            Ok(())
        })
    }

    fn check_si_free(&self, si: &str) -> KbResult<()> {
        self.si_owned(si).map(|_| ())
    }

    fn write_atomically(&self, apply: &mut dyn FnMut() -> KbResult<()>) -> KbResult<()> {
        self.db.atomically(|| apply())
    }

    fn remove_si(&self, si: &str) -> KbResult<()> {
        self.db.atomically(|| {
            let sis = self.si()?;
            if !sis.iter().any(|s| s == si) {
                return Ok(());
            }
            if sis.len() == 1 {
                return Err(KbError::InvalidTag(format!(
                    "cannot remove '{}', the last subject identifier",
                    si
                )));
            }
            self.db.with_conn(|conn| {
                conn.execute(
                    "DELETE FROM subject_identifiers WHERE si = ?1 AND tag_id = ?2",
                    params![si, self.id],
                )
            })?;
            Ok(())
        })
    }

    fn name(&self) -> KbResult<Option<String>> {
        let row: Option<Option<String>> = self.db.with_conn(|conn| {
            conn.prepare_cached("SELECT name FROM tags WHERE id = ?1")?
                .query_row([self.id], |row| row.get(0))
                .optional()
        })?;
        row.ok_or_else(|| properties::vanished(self.id))
    }

    fn set_name(&self, name: Option<&str>) -> KbResult<()> {
        if let Some(name) = name {
            validate_name(name)?;
        }
        self.update("UPDATE tags SET name = ?2 WHERE id = ?1", name)
    }

    fn is_hidden(&self) -> KbResult<bool> {
        let row: Option<bool> = self.db.with_conn(|conn| {
            conn.prepare_cached("SELECT hidden FROM tags WHERE id = ?1")?
                .query_row([self.id], |row| row.get(0))
                .optional()
        })?;
        row.ok_or_else(|| properties::vanished(self.id))
    }

    fn set_hidden(&self, hidden: bool) -> KbResult<()> {
        self.update("UPDATE tags SET hidden = ?2 WHERE id = ?1", hidden)
    }

    fn kind(&self) -> KbResult<TagKind> {
        type Row = (i64, Option<String>, Option<i64>, Option<i64>);
        let row: Option<Row> = self.db.with_conn(|conn| {
            conn.prepare_cached("SELECT type, ewkt, start_time, duration FROM tags WHERE id = ?1")?
                .query_row([self.id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })
                .optional()
        })?;
        let (code, ewkt, start, duration) = row.ok_or_else(|| properties::vanished(self.id))?;

        Ok(match TagType::from_code(code)? {
            TagType::Semantic => TagKind::Semantic,
            TagType::Peer => {
                let addresses = match self.property(system_keys::PEER_ADDRESSES)? {
                    Some(json) => serde_json::from_str(&json)?,
                    None => Vec::new(),
                };
                TagKind::Peer { addresses }
            }
            TagType::Spatial => TagKind::Spatial {
                ewkt: ewkt.unwrap_or_default(),
            },
            TagType::Time => TagKind::Time(TimeSpan::new(
                start.unwrap_or(TimeSpan::FIRST_MILLISECOND_EVER),
                duration.unwrap_or(TimeSpan::FOREVER),
            )),
        })
    }

    fn set_kind(&self, kind: TagKind) -> KbResult<()> {
        self.db.atomically(|| {
            self.kind()?.ensure_same_type(&kind)?;
            write_kind(&self.db, self.id, &kind)
        })
    }
}

/// Persist the payload columns, and peer addresses as a system property.
pub(crate) fn write_kind(db: &SqlDb, id: i64, kind: &TagKind) -> KbResult<()> {
    let (ewkt, start, duration) = match kind {
        TagKind::Spatial { ewkt } => (Some(ewkt.as_str()), None, None),
        TagKind::Time(span) => (None, Some(span.start), Some(span.duration)),
        TagKind::Semantic | TagKind::Peer { .. } => (None, None, None),
    };
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE tags SET ewkt = ?2, start_time = ?3, duration = ?4 WHERE id = ?1",
            params![id, ewkt, start, duration],
        )
    })?;
    if let TagKind::Peer { addresses } = kind {
        let json = serde_json::to_string(addresses)?;
        properties::write(db, id, system_keys::PEER_ADDRESSES, Some(&json))?;
    }
    Ok(())
}

impl TxSemanticTag for SqlTag {
    fn super_tag(&self) -> KbResult<Option<Self>> {
        let row: Option<Option<i64>> = self.db.with_conn(|conn| {
            conn.prepare_cached(
                "SELECT e.parent_id
                   FROM tags t
                   LEFT JOIN taxonomy_edges e ON e.child_id = t.id
                  WHERE t.id = ?1",
            )?
            .query_row([self.id], |row| row.get(0))
            .optional()
        })?;
        let parent = row.ok_or_else(|| properties::vanished(self.id))?;
        Ok(parent.map(|id| self.sibling(id)))
    }

    fn sub_tags(&self) -> KbResult<Vec<Self>> {
        let ids = self.ids(
            "SELECT child_id FROM taxonomy_edges WHERE parent_id = ?1 ORDER BY child_id",
            None,
        )?;
        Ok(self.siblings(ids))
    }

    fn move_to(&self, new_super: Option<&Self>) -> KbResult<()> {
        self.db.atomically(|| {
            self.ensure_exists()?;
            match new_super {
                Some(parent) => {
                    self.ensure_same_store(parent)?;
                    parent.ensure_exists()?;
                    ensure_no_cycle(self, parent)?;
                    self.db.with_conn(|conn| {
                        conn.execute(
                            "INSERT INTO taxonomy_edges(child_id, parent_id) VALUES (?1, ?2)
                             ON CONFLICT(child_id) DO UPDATE SET parent_id = excluded.parent_id",
                            params![self.id, parent.id],
                        )
                    })?;
                }
                None => {
                    self.db.with_conn(|conn| {
                        conn.execute("DELETE FROM taxonomy_edges WHERE child_id = ?1", [self.id])
                    })?;
                }
            }
            Ok(())
        })
    }
}

impl SnSemanticTag for SqlTag {
    fn set_predicate(&self, predicate: &str, target: &Self) -> KbResult<()> {
        self.ensure_same_store(target)?;
        self.db.atomically(|| {
            self.ensure_exists()?;
            target.ensure_exists()?;
            self.db.with_conn(|conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO net_edges(source_id, predicate, target_id)
                     VALUES (?1, ?2, ?3)",
                    params![self.id, predicate, target.id],
                )
            })?;
            Ok(())
        })
    }

    fn remove_predicate(&self, predicate: &str, target: &Self) -> KbResult<()> {
        self.ensure_same_store(target)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM net_edges WHERE source_id = ?1 AND predicate = ?2 AND target_id = ?3",
                params![self.id, predicate, target.id],
            )
        })?;
        Ok(())
    }

    fn target_tags(&self, predicate: &str) -> KbResult<Vec<Self>> {
        let ids = self.ids(
            "SELECT target_id FROM net_edges
              WHERE source_id = ?1 AND predicate = ?2 ORDER BY rowid",
            Some(predicate),
        )?;
        Ok(self.siblings(ids))
    }

    fn source_tags(&self, predicate: &str) -> KbResult<Vec<Self>> {
        let ids = self.ids(
            "SELECT source_id FROM net_edges
              WHERE target_id = ?1 AND predicate = ?2 ORDER BY source_id",
            Some(predicate),
        )?;
        Ok(self.siblings(ids))
    }

    fn predicate_names(&self) -> KbResult<Vec<String>> {
        self.strings(
            "SELECT DISTINCT predicate FROM net_edges WHERE source_id = ?1 ORDER BY predicate",
        )
    }

    fn incoming_predicate_names(&self) -> KbResult<Vec<String>> {
        self.strings(
            "SELECT DISTINCT predicate FROM net_edges WHERE target_id = ?1 ORDER BY predicate",
        )
    }
}
