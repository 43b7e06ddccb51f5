//! Relational information and context points.

use std::fmt;
use std::rc::Rc;

use rusqlite::{params, OptionalExtension};

use semantic_model::{
    now_millis, system_keys, CommDirection, ContextCoordinates, KbError, KbResult,
};

use super::connection::SqlDb;
use super::properties;
use super::schema::HOLDER_INFORMATION;
use crate::knowledge_base::{ContextPoint, Information, PropertyHolder};

/// Handle to an information row.
#[derive(Clone)]
pub struct SqlInformation {
    db: Rc<SqlDb>,
    id: i64,
}

impl SqlInformation {
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Debug for SqlInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlInformation").field("id", &self.id).finish()
    }
}

impl PropertyHolder for SqlInformation {
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

impl Information for SqlInformation {
    fn content_as_bytes(&self) -> KbResult<Vec<u8>> {
        let content: Option<Vec<u8>> = self.db.with_conn(|conn| {
            conn.prepare_cached("SELECT content FROM information WHERE id = ?1")?
                .query_row([self.id], |row| row.get(0))
                .optional()
        })?;
        content.ok_or_else(|| properties::vanished(self.id))
    }

    fn content_length(&self) -> KbResult<u64> {
        let length: Option<i64> = self.db.with_conn(|conn| {
            conn.prepare_cached("SELECT length(content) FROM information WHERE id = ?1")?
                .query_row([self.id], |row| row.get(0))
                .optional()
        })?;
        length
            .map(|len| len as u64)
            .ok_or_else(|| properties::vanished(self.id))
    }

    fn write_content(&self, content: &[u8], modified_at: i64) -> KbResult<()> {
        self.db.atomically(|| {
            let changed = self.db.with_conn(|conn| {
                conn.execute(
                    "UPDATE information SET content = ?2 WHERE id = ?1",
                    params![self.id, content],
                )
            })?;
            if changed == 0 {
                return Err(properties::vanished(self.id));
            }
            properties::write(
                &self.db,
                self.id,
                system_keys::LAST_MODIFIED,
                Some(&modified_at.to_string()),
            )
        })
    }
}

/// Handle to a context point row.
#[derive(Clone)]
pub struct SqlContextPoint {
    db: Rc<SqlDb>,
    id: i64,
}

impl SqlContextPoint {
    pub(crate) fn new(db: Rc<SqlDb>, id: i64) -> Self {
        Self { db, id }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Debug for SqlContextPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlContextPoint").field("id", &self.id).finish()
    }
}

const FIRST_SI: &str = "(SELECT si FROM subject_identifiers WHERE tag_id = {} ORDER BY position LIMIT 1)";

impl ContextPoint for SqlContextPoint {
    type Info = SqlInformation;

    fn coordinates(&self) -> KbResult<ContextCoordinates> {
        let columns = ["cp.topic_id", "cp.originator_id", "cp.peer_id", "cp.location_id", "cp.time_id"]
            .iter()
            .map(|column| FIRST_SI.replace("{}", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {}, cp.direction FROM context_points cp WHERE cp.id = ?1",
            columns
        );

        let row = self.db.with_conn(|conn| {
            conn.prepare_cached(&sql)?
                .query_row([self.id], |row| {
                    Ok(ContextCoordinates {
                        topic: row.get(0)?,
                        originator: row.get(1)?,
                        peer: row.get(2)?,
                        location: row.get(3)?,
                        time: row.get(4)?,
                        direction: CommDirection::from_code(row.get(5)?),
                    })
                })
                .optional()
        })?;
        row.ok_or_else(|| KbError::NotFound(format!("context point {}", self.id)))
    }

    fn add_information(&self, content: &[u8]) -> KbResult<SqlInformation> {
        let now = now_millis().to_string();
        let unique_id = self.db.issue_id();
        let id = self.db.atomically(|| {
            let id = self.db.with_conn(|conn| {
                let exists: Option<i64> = conn
                    .query_row("SELECT id FROM context_points WHERE id = ?1", [self.id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                if exists.is_none() {
                    return Ok(None);
                }
                conn.execute(
                    "INSERT INTO property_holders(holder_kind) VALUES (?1)",
                    [HOLDER_INFORMATION],
                )?;
                let id = conn.last_insert_rowid();
                conn.execute(
                    "INSERT INTO information(id, cp_id, content) VALUES (?1, ?2, ?3)",
                    params![id, self.id, content],
                )?;
                for (key, value) in [
                    (system_keys::CREATION_TIME, now.as_str()),
                    (system_keys::LAST_MODIFIED, now.as_str()),
                    (system_keys::INFO_ID, unique_id.as_str()),
                ] {
                    conn.execute(
                        "INSERT INTO properties(owner_id, key, value) VALUES (?1, ?2, ?3)",
                        params![id, key, value],
                    )?;
                }
                Ok(Some(id))
            })?;
            id.ok_or_else(|| KbError::NotFound(format!("context point {}", self.id)))
        })?;

        Ok(SqlInformation {
            db: Rc::clone(&self.db),
            id,
        })
    }

    fn information(&self) -> KbResult<Vec<SqlInformation>> {
        let ids = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT id FROM information WHERE cp_id = ?1 ORDER BY id")?;
            let rows = stmt.query_map([self.id], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<i64>>>()
        })?;
        Ok(ids
            .into_iter()
            .map(|id| SqlInformation {
                db: Rc::clone(&self.db),
                id,
            })
            .collect())
    }

    fn remove_information(&self, info: &SqlInformation) -> KbResult<()> {
        if !Rc::ptr_eq(&self.db, &info.db) {
            return Err(KbError::NotFound(format!(
                "information {} belongs to another store",
                info.id
            )));
        }
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM property_holders
                  WHERE id = ?1 AND id IN (SELECT id FROM information WHERE cp_id = ?2)",
                params![info.id, self.id],
            )
        })?;
        if removed == 0 {
            return Err(KbError::NotFound(format!(
                "information {} at context point {}",
                info.id, self.id
            )));
        }
        Ok(())
    }
}

/// Find the point at `coordinates`, creating it when `create` is set.
pub(crate) fn locate_point(
    db: &Rc<SqlDb>,
    coordinates: &ContextCoordinates,
    create: bool,
) -> KbResult<Option<SqlContextPoint>> {
    db.atomically(|| {
        let mut dimensions: [Option<i64>; 5] = [None; 5];
        for (slot, si) in dimensions.iter_mut().zip(coordinates.dimensions()) {
            if let Some(si) = si {
                let owner: Option<i64> = db.with_conn(|conn| {
                    conn.query_row(
                        "SELECT tag_id FROM subject_identifiers WHERE si = ?1",
                        [si],
                        |row| row.get(0),
                    )
                    .optional()
                })?;
                let owner = owner.ok_or_else(|| {
                    KbError::NotFound(format!("no tag with subject identifier '{}'", si))
                })?;
                *slot = Some(owner);
            }
        }
        let [topic, originator, peer, location, time] = dimensions;
        let direction = coordinates.direction.code();

        let existing: Option<i64> = db.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM context_points
                  WHERE topic_id IS ?1 AND originator_id IS ?2 AND peer_id IS ?3
                    AND location_id IS ?4 AND time_id IS ?5 AND direction = ?6
                  ORDER BY id LIMIT 1",
                params![topic, originator, peer, location, time, direction],
                |row| row.get(0),
            )
            .optional()
        })?;

        let id = match existing {
            Some(id) => id,
            None if create => db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO context_points(topic_id, originator_id, peer_id, location_id, time_id, direction)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![topic, originator, peer, location, time, direction],
                )?;
                Ok(conn.last_insert_rowid())
            })?,
            None => return Ok(None),
        };
        Ok(Some(SqlContextPoint::new(Rc::clone(db), id)))
    })
}

/// Remove a point and the information attached to it.
pub(crate) fn remove_point(db: &SqlDb, cp: &SqlContextPoint) -> KbResult<()> {
    db.atomically(|| {
        let removed = db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM property_holders
                  WHERE id IN (SELECT id FROM information WHERE cp_id = ?1)",
                [cp.id],
            )?;
            conn.execute("DELETE FROM context_points WHERE id = ?1", [cp.id])
        })?;
        if removed == 0 {
            return Err(KbError::NotFound(format!("context point {}", cp.id)));
        }
        Ok(())
    })
}

/// Ids of every context point in creation order.
pub(crate) fn point_ids(db: &SqlDb) -> KbResult<Vec<i64>> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare_cached("SELECT id FROM context_points ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<i64>>>()
    })
}
