//! Relational backend over SQLite.
//!
//! Handles carry only a row id and a shared connection. Every accessor reads
//! through to the database and every mutation is written immediately, inside
//! a transaction whenever it touches more than one row.
//!
//! # Lifecycle
//!
//! A store starts open. [`SqlKnowledgeBase::close`] releases the connection;
//! from then on every operation on the store or any of its handles fails with
//! `ClosedStore` until [`SqlKnowledgeBase::reconnect`] opens it again.

mod config;
mod connection;
mod information;
mod properties;
mod schema;
mod sets;
mod tag;

pub use config::SqlStoreConfig;
pub use information::{SqlContextPoint, SqlInformation};
pub use sets::*;
pub use tag::SqlTag;

use std::rc::Rc;

use semantic_model::{ContextCoordinates, IdIssuer, KbError, KbResult, RandomIssuer, TagType};

use crate::knowledge_base::KnowledgeBase;
use connection::SqlDb;

/// A knowledge base persisted in a SQLite database.
#[derive(Clone)]
pub struct SqlKnowledgeBase {
    db: Rc<SqlDb>,
}

impl SqlKnowledgeBase {
    /// Open the database described by `config`, creating the schema if it
    /// is missing.
    pub fn open(config: SqlStoreConfig) -> KbResult<Self> {
        Self::open_with_issuer(config, Box::new(RandomIssuer))
    }

    pub fn open_with_issuer(config: SqlStoreConfig, issuer: Box<dyn IdIssuer>) -> KbResult<Self> {
        Ok(Self {
            db: Rc::new(SqlDb::open(config, issuer)?),
        })
    }

    pub fn config(&self) -> &SqlStoreConfig {
        self.db.config()
    }

    pub fn is_closed(&self) -> bool {
        self.db.is_closed()
    }

    /// Release the connection. Closing a closed store is a no-op.
    pub fn close(&self) -> KbResult<()> {
        self.db.close()
    }

    /// Reopen the connection with the stored configuration.
    pub fn reconnect(&self) -> KbResult<()> {
        self.db.reconnect()
    }

    /// Drop every table. The schema is recreated on the next
    /// [`reconnect`](Self::reconnect) or [`open`](Self::open).
    pub fn drop_schema(&self) -> KbResult<()> {
        self.db.with_conn(schema::drop_all)?;
        tracing::info!(target: "kb::sql", "dropped schema");
        Ok(())
    }
}

impl std::fmt::Debug for SqlKnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlKnowledgeBase")
            .field("path", &self.db.config().path)
            .field("closed", &self.db.is_closed())
            .finish()
    }
}

impl KnowledgeBase for SqlKnowledgeBase {
    type Tag = SqlTag;
    type Set = SqlStSet;
    type Taxonomy = SqlTaxonomy;
    type Net = SqlSemanticNet;
    type Info = SqlInformation;
    type ContextPoint = SqlContextPoint;

    fn tag_set(&self, tag_type: TagType) -> SqlStSet {
        SqlView::new(Rc::clone(&self.db), tag_type)
    }

    fn taxonomy(&self, tag_type: TagType) -> SqlTaxonomy {
        SqlView::new(Rc::clone(&self.db), tag_type)
    }

    fn semantic_net(&self, tag_type: TagType) -> SqlSemanticNet {
        SqlView::new(Rc::clone(&self.db), tag_type)
    }

    fn create_context_point(&self, coordinates: &ContextCoordinates) -> KbResult<SqlContextPoint> {
        information::locate_point(&self.db, coordinates, true)?
            .ok_or_else(|| KbError::NotFound("context point".into()))
    }

    fn context_point(&self, coordinates: &ContextCoordinates) -> KbResult<Option<SqlContextPoint>> {
        match information::locate_point(&self.db, coordinates, false) {
            Err(KbError::NotFound(_)) => Ok(None),
            other => other,
        }
    }

    fn context_points(&self) -> KbResult<Vec<SqlContextPoint>> {
        let ids = information::point_ids(&self.db)?;
        Ok(ids
            .into_iter()
            .map(|id| SqlContextPoint::new(Rc::clone(&self.db), id))
            .collect())
    }

    fn remove_context_point(&self, cp: &SqlContextPoint) -> KbResult<()> {
        information::remove_point(&self.db, cp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::{
        merge_tags, ContextPoint, Information, PropertyHolder, SemanticNet, SemanticTag, SnSemanticTag,
        StSet, Taxonomy, TxSemanticTag,
    };
    use semantic_model::{SequentialIssuer, TagKind, TimeSpan};

    fn memory_kb() -> SqlKnowledgeBase {
        SqlKnowledgeBase::open(SqlStoreConfig::in_memory()).unwrap()
    }

    #[test]
    fn test_create_and_read_back() {
        let kb = memory_kb();
        let topics = kb.topic_set();
        let tag = topics
            .create_semantic_tag("Shark", &["http://www.sharksystem.net"])
            .unwrap();
        tag.set_property("p1", "v1").unwrap();

        let found = topics
            .get_semantic_tag(&["http://www.sharksystem.net"])
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), tag.id());
        assert_eq!(found.name().unwrap().as_deref(), Some("Shark"));
        assert_eq!(found.property("p1").unwrap().as_deref(), Some("v1"));
        assert_eq!(found.property_keys().unwrap(), vec!["p1"]);
    }

    #[test]
    fn test_peer_addresses_stay_out_of_user_keys() {
        let kb = memory_kb();
        let alice = kb
            .peer_set()
            .create_peer_tag("Alice", &["urn:alice"], &["tcp://alice:7070", "mail://alice"])
            .unwrap();

        assert_eq!(
            alice.kind().unwrap(),
            TagKind::Peer {
                addresses: vec!["tcp://alice:7070".into(), "mail://alice".into()]
            }
        );
        assert!(alice.property_keys().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_si_rolls_back() {
        let kb = memory_kb();
        let topics = kb.topic_set();
        topics.create_semantic_tag("A", &["urn:a"]).unwrap();

        let err = topics.create_semantic_tag("B", &["urn:b", "urn:a"]).unwrap_err();
        assert!(matches!(err, KbError::DuplicateIdentifier(_)));
        assert_eq!(topics.size().unwrap(), 1);
        assert!(topics.get_semantic_tag(&["urn:b"]).unwrap().is_none());
    }

    #[test]
    fn test_merge_tags_against_peer_si_writes_nothing() {
        let kb = memory_kb();
        let topics = kb.topic_set();
        let a = topics.create_semantic_tag("A", &["urn:a"]).unwrap();
        kb.peer_set()
            .create_peer_tag("P", &["urn:p"], &["tcp://p:7070"])
            .unwrap();

        let other = memory_kb();
        let source = other
            .topic_set()
            .create_semantic_tag("A wide", &["urn:a", "urn:x", "urn:p"])
            .unwrap();
        source.set_property("size", "xl").unwrap();

        let err = merge_tags(&a, &source).unwrap_err();
        assert_eq!(err, KbError::DuplicateIdentifier("urn:p".into()));
        assert_eq!(a.si().unwrap(), vec!["urn:a"]);
        assert!(a.property("size").unwrap().is_none());
    }

    #[test]
    fn test_write_atomically_rolls_back() {
        let kb = memory_kb();
        let a = kb.topic_set().create_semantic_tag("A", &["urn:a"]).unwrap();

        let err = a
            .write_atomically(&mut || {
                a.add_si("urn:x")?;
                a.set_property("size", "xl")?;
                a.add_si("")
            })
            .unwrap_err();
        assert!(matches!(err, KbError::InvalidTag(_)));
        assert_eq!(a.si().unwrap(), vec!["urn:a"]);
        assert!(a.property_keys().unwrap().is_empty());
        assert!(kb.topic_set().get_semantic_tag(&["urn:x"]).unwrap().is_none());
    }

    #[test]
    fn test_cycle_leaves_tree_unchanged() {
        let kb = memory_kb();
        let tx = kb.topics_as_taxonomy();
        let a = tx.create_tx_semantic_tag("A", &["urn:a"]).unwrap();
        let b = tx.create_tx_semantic_tag("B", &["urn:b"]).unwrap();
        b.move_to(Some(&a)).unwrap();

        assert!(matches!(a.move_to(Some(&b)), Err(KbError::CycleDetected { .. })));
        assert!(a.is_root().unwrap());
        assert_eq!(b.super_tag().unwrap().unwrap().id(), a.id());
        assert_eq!(tx.root_tags().unwrap().len(), 1);
    }

    #[test]
    fn test_net_edges() {
        let kb = memory_kb();
        let net = kb.topics_as_semantic_net();
        let a = net.create_semantic_tag("A", &["urn:a"]).unwrap();
        let b = net.create_semantic_tag("B", &["urn:b"]).unwrap();
        let c = net.create_semantic_tag("C", &["urn:c"]).unwrap();
        a.set_predicate("knows", &b).unwrap();
        a.set_predicate("knows", &c).unwrap();
        a.set_predicate("knows", &c).unwrap();

        let targets: Vec<i64> = a.target_tags("knows").unwrap().iter().map(|t| t.id()).collect();
        assert_eq!(targets, vec![b.id(), c.id()]);
        assert!(a.target_tags("unknown").unwrap().is_empty());
        assert_eq!(net.edges().unwrap().len(), 2);

        net.remove_semantic_tag(&c).unwrap();
        assert_eq!(a.target_tags("knows").unwrap().len(), 1);
    }

    #[test]
    fn test_closed_store_rejects_everything() {
        let kb = memory_kb();
        let tag = kb.topic_set().create_semantic_tag("A", &["urn:a"]).unwrap();
        kb.close().unwrap();
        kb.close().unwrap();

        assert!(kb.is_closed());
        assert_eq!(tag.name().unwrap_err(), KbError::ClosedStore);
        assert_eq!(kb.topic_set().size().unwrap_err(), KbError::ClosedStore);
        assert!(matches!(
            kb.create_context_point(&ContextCoordinates::new()),
            Err(KbError::ClosedStore)
        ));
    }

    #[test]
    fn test_drop_schema_then_reconnect_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = SqlStoreConfig::new(dir.path().join("kb.db"));
        let kb = SqlKnowledgeBase::open(config).unwrap();
        kb.topic_set().create_semantic_tag("A", &["urn:a"]).unwrap();

        kb.drop_schema().unwrap();
        kb.reconnect().unwrap();
        assert!(kb.topic_set().is_empty().unwrap());
    }

    #[test]
    fn test_edge_removal_across_stores_rejected() {
        let first = memory_kb();
        let second = memory_kb();
        let a = first.topic_set().create_semantic_tag("A", &["urn:a"]).unwrap();
        let b = first.topic_set().create_semantic_tag("B", &["urn:b"]).unwrap();
        second.topic_set().create_semantic_tag("X", &["urn:x"]).unwrap();
        let y = second.topic_set().create_semantic_tag("Y", &["urn:y"]).unwrap();
        a.set_predicate("knows", &b).unwrap();
        assert_eq!(y.id(), b.id());

        assert!(matches!(
            a.remove_predicate("knows", &y),
            Err(KbError::NotFound(_))
        ));
        assert_eq!(a.target_tags("knows").unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let config = SqlStoreConfig::new(&path)
            .with_create_if_missing(false)
            .with_busy_timeout_ms(100);

        assert!(matches!(
            SqlKnowledgeBase::open(config),
            Err(KbError::StorageFault(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_information_round_trip() {
        let kb = SqlKnowledgeBase::open_with_issuer(
            SqlStoreConfig::in_memory(),
            Box::new(SequentialIssuer::starting_at(7)),
        )
        .unwrap();
        let cp = kb.create_context_point(&ContextCoordinates::new()).unwrap();
        let info = cp.add_information(b"hello").unwrap();
        info.set_content_type("text/plain").unwrap();

        assert_eq!(info.content_as_string().unwrap(), "hello");
        assert_eq!(info.content_type().unwrap(), "text/plain");
        assert!(!info.unique_id().unwrap().is_empty());
        assert!(info.property_keys().unwrap().is_empty());

        let created = info.creation_time().unwrap();
        info.write_content(b"bye", created + 5).unwrap();
        assert_eq!(info.content_length().unwrap(), 3);
        assert_eq!(info.creation_time().unwrap(), created);
        assert_eq!(info.last_modified().unwrap(), created + 5);

        kb.remove_context_point(&cp).unwrap();
        assert!(matches!(info.content_as_bytes(), Err(KbError::NotFound(_))));
    }

    #[test]
    fn test_time_tag_payload() {
        let kb = memory_kb();
        let span = TimeSpan::new(TimeSpan::FIRST_MILLISECOND_EVER, TimeSpan::FOREVER);
        let tag = kb.time_set().create_time_tag(span).unwrap();
        assert_eq!(tag.kind().unwrap(), TagKind::Time(span));
        assert_eq!(tag.si().unwrap(), vec![span.subject_identifier()]);
    }
}
