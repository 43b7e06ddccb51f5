//! Relational tag set views.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use rusqlite::{params, OptionalExtension};

use semantic_model::{normalize_sis, KbError, KbResult, TagSnapshot, TagType};

use super::connection::SqlDb;
use super::schema::HOLDER_TAG;
use super::tag::write_kind;
use super::SqlTag;
use crate::context_assembler::{Flat, FragmentationParameter, Graph, Structure, Tree};
use crate::inmemory::InMemoStSet;
use crate::knowledge_base::algebra;
use crate::knowledge_base::{SemanticNet, SemanticTag, StSet, Taxonomy};

/// A view over the tag rows of one type.
pub struct SqlView<S = Flat> {
    db: Rc<SqlDb>,
    tag_type: TagType,
    show_hidden: Cell<bool>,
    structure: PhantomData<S>,
}

pub type SqlStSet = SqlView<Flat>;
pub type SqlTaxonomy = SqlView<Tree>;
pub type SqlSemanticNet = SqlView<Graph>;

impl<S> SqlView<S> {
    pub(crate) fn new(db: Rc<SqlDb>, tag_type: TagType) -> Self {
        Self {
            db,
            tag_type,
            show_hidden: Cell::new(false),
            structure: PhantomData,
        }
    }

    fn reshape<T>(&self) -> SqlView<T> {
        SqlView::new(Rc::clone(&self.db), self.tag_type)
    }

    pub fn as_set(&self) -> SqlStSet {
        self.reshape()
    }

    pub fn as_taxonomy(&self) -> SqlTaxonomy {
        self.reshape()
    }

    pub fn as_semantic_net(&self) -> SqlSemanticNet {
        self.reshape()
    }

    fn handle(&self, id: i64) -> SqlTag {
        SqlTag::new(Rc::clone(&self.db), id)
    }

    fn find(&self, sis: &[&str]) -> KbResult<Option<i64>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT s.tag_id
                   FROM subject_identifiers s
                   JOIN tags t ON t.id = s.tag_id
                  WHERE s.si = ?1 AND t.type = ?2",
            )?;
            for si in sis {
                let found: Option<i64> = stmt
                    .query_row(params![si, self.tag_type.code()], |row| row.get(0))
                    .optional()?;
                if found.is_some() {
                    return Ok(found);
                }
            }
            Ok(None)
        })
    }

    fn ids(&self, sql: &str, arg: &dyn rusqlite::ToSql) -> KbResult<Vec<i64>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params![self.tag_type.code(), arg], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<i64>>>()
        })
    }

    fn insert(&self, snapshot: &TagSnapshot) -> KbResult<i64> {
        for si in &snapshot.sis {
            let taken: Option<i64> = self.db.with_conn(|conn| {
                conn.query_row(
                    "SELECT tag_id FROM subject_identifiers WHERE si = ?1",
                    [si],
                    |row| row.get(0),
                )
                .optional()
            })?;
            if taken.is_some() {
                return Err(KbError::DuplicateIdentifier(si.clone()));
            }
        }

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO property_holders(holder_kind) VALUES (?1)",
                [HOLDER_TAG],
            )?;
            let id = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO tags(id, name, type, hidden) VALUES (?1, ?2, ?3, ?4)",
                params![id, snapshot.name, self.tag_type.code(), snapshot.hidden],
            )?;
            for (position, si) in snapshot.sis.iter().enumerate() {
                conn.execute(
                    "INSERT INTO subject_identifiers(si, tag_id, position) VALUES (?1, ?2, ?3)",
                    params![si, id, position as i64],
                )?;
            }
            for (key, value) in snapshot.properties.iter() {
                conn.execute(
                    "INSERT INTO properties(owner_id, key, value) VALUES (?1, ?2, ?3)",
                    params![id, key, value],
                )?;
            }
            Ok(id)
        })?;
        write_kind(&self.db, id, &snapshot.kind)?;
        Ok(id)
    }
}

impl<S> Clone for SqlView<S> {
    fn clone(&self) -> Self {
        let view = self.reshape();
        view.show_hidden.set(self.show_hidden.get());
        view
    }
}

impl<S> fmt::Debug for SqlView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlView")
            .field("tag_type", &self.tag_type)
            .field("show_hidden", &self.show_hidden.get())
            .finish()
    }
}

impl<S: Structure> StSet for SqlView<S> {
    type Tag = SqlTag;

    fn tag_type(&self) -> TagType {
        self.tag_type
    }

    fn create_from_snapshot(&self, snapshot: &TagSnapshot) -> KbResult<SqlTag> {
        snapshot.validate()?;
        if snapshot.kind.tag_type() != self.tag_type {
            return Err(KbError::InvalidTag(format!(
                "a {} tag does not belong in a {} set",
                snapshot.kind.tag_type(),
                self.tag_type
            )));
        }
        let snapshot = TagSnapshot {
            sis: normalize_sis(&snapshot.sis)?,
            ..snapshot.clone()
        };
        let id = self.db.atomically(|| self.insert(&snapshot))?;
        tracing::debug!(target: "kb::sql", id, sis = ?snapshot.sis, "created tag");
        Ok(self.handle(id))
    }

    fn get_semantic_tag(&self, sis: &[&str]) -> KbResult<Option<SqlTag>> {
        Ok(self.find(sis)?.map(|id| self.handle(id)))
    }

    fn get_semantic_tag_by_name(&self, pattern: &str) -> KbResult<Vec<SqlTag>> {
        let ids = self.ids(
            "SELECT id FROM tags
              WHERE type = ?1 AND name IS NOT NULL AND instr(name, ?2) > 0
              ORDER BY id",
            &pattern,
        )?;
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    fn remove_semantic_tag(&self, tag: &dyn SemanticTag) -> KbResult<()> {
        let sis = tag.si()?;
        let refs: Vec<&str> = sis.iter().map(String::as_str).collect();
        self.db.atomically(|| {
            let id = self.find(&refs)?.ok_or_else(|| {
                KbError::NotFound(format!("no member with identifiers {:?}", sis))
            })?;
            self.db.with_conn(|conn| {
                conn.execute("DELETE FROM property_holders WHERE id = ?1", [id])
            })?;
            tracing::debug!(target: "kb::sql", id, "removed tag");
            Ok(())
        })
    }

    fn all_tags(&self, include_hidden: bool) -> KbResult<Vec<SqlTag>> {
        let ids = self.ids(
            "SELECT id FROM tags WHERE type = ?1 AND (?2 OR hidden = 0) ORDER BY id",
            &include_hidden,
        )?;
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    fn enumerate_hidden_tags(&self) -> bool {
        self.show_hidden.get()
    }

    fn set_enumerate_hidden_tags(&self, enumerate: bool) {
        self.show_hidden.set(enumerate);
    }

    fn size(&self) -> KbResult<usize> {
        let count: i64 = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM tags WHERE type = ?1",
                [self.tag_type.code()],
                |row| row.get(0),
            )
        })?;
        Ok(count as usize)
    }

    fn merge(&self, tag: &dyn SemanticTag) -> KbResult<SqlTag> {
        self.db.atomically(|| algebra::merge_into_set(self, tag))
    }

    fn context_of(&self, anchor: &SqlTag, params: &FragmentationParameter) -> KbResult<Vec<SqlTag>> {
        S::context_of(anchor, params)
    }

    fn copy_relations(&self, selected: &[SqlTag], into: &InMemoStSet) -> KbResult<()> {
        S::copy_relations(selected, into)
    }
}

impl Taxonomy for SqlTaxonomy {
    fn root_tags(&self) -> KbResult<Vec<SqlTag>> {
        let ids = self.ids(
            "SELECT t.id FROM tags t
              WHERE t.type = ?1 AND (?2 OR t.hidden = 0)
                AND NOT EXISTS (SELECT 1 FROM taxonomy_edges e WHERE e.child_id = t.id)
              ORDER BY t.id",
            &self.enumerate_hidden_tags(),
        )?;
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }
}

impl SemanticNet for SqlSemanticNet {
    fn edges(&self) -> KbResult<Vec<(SqlTag, String, SqlTag)>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT e.source_id, e.predicate, e.target_id
                   FROM net_edges e
                   JOIN tags s ON s.id = e.source_id
                  WHERE s.type = ?1
                  ORDER BY e.source_id, e.predicate, e.rowid",
            )?;
            let rows = stmt.query_map([self.tag_type.code()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        Ok(rows
            .into_iter()
            .map(|(source, predicate, target)| (self.handle(source), predicate, self.handle(target)))
            .collect())
    }
}
