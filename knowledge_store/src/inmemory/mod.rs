//! In-memory backend.
//!
//! All state sits in one arena shared by every handle and view of a store.
//! Handles are reference counted and not thread-safe; callers wanting to share
//! a store across threads put it behind their own lock.

mod arena;
mod information;
mod sets;
mod tag;

pub use information::{InMemoContextPoint, InMemoInformation};
pub use sets::*;
pub use tag::*;

use std::cell::RefCell;
use std::rc::Rc;

use semantic_model::{ContextCoordinates, IdIssuer, KbError, KbResult, RandomIssuer, TagType};

use crate::knowledge_base::KnowledgeBase;
use arena::Arena;

/// A knowledge base held entirely in process memory.
#[derive(Clone)]
pub struct InMemoKnowledgeBase {
    arena: Rc<RefCell<Arena>>,
}

impl InMemoKnowledgeBase {
    pub fn new() -> Self {
        Self::with_issuer(Box::new(RandomIssuer))
    }

    /// Use `issuer` for object ids, e.g. a [`SequentialIssuer`](semantic_model::SequentialIssuer)
    /// for reproducible runs.
    pub fn with_issuer(issuer: Box<dyn IdIssuer>) -> Self {
        Self {
            arena: Rc::new(RefCell::new(Arena::new(issuer))),
        }
    }
}

impl Default for InMemoKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoKnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoKnowledgeBase").finish_non_exhaustive()
    }
}

impl KnowledgeBase for InMemoKnowledgeBase {
    type Tag = InMemoTag;
    type Set = InMemoStSet;
    type Taxonomy = InMemoTaxonomy;
    type Net = InMemoSemanticNet;
    type Info = InMemoInformation;
    type ContextPoint = InMemoContextPoint;

    fn tag_set(&self, tag_type: TagType) -> InMemoStSet {
        InMemoView::new(Rc::clone(&self.arena), tag_type)
    }

    fn taxonomy(&self, tag_type: TagType) -> InMemoTaxonomy {
        InMemoView::new(Rc::clone(&self.arena), tag_type)
    }

    fn semantic_net(&self, tag_type: TagType) -> InMemoSemanticNet {
        InMemoView::new(Rc::clone(&self.arena), tag_type)
    }

    fn create_context_point(&self, coordinates: &ContextCoordinates) -> KbResult<InMemoContextPoint> {
        information::locate_point(&self.arena, coordinates, true)?
            .ok_or_else(|| KbError::NotFound("context point".into()))
    }

    fn context_point(
        &self,
        coordinates: &ContextCoordinates,
    ) -> KbResult<Option<InMemoContextPoint>> {
        match information::locate_point(&self.arena, coordinates, false) {
            Err(KbError::NotFound(_)) => Ok(None),
            other => other,
        }
    }

    fn context_points(&self) -> KbResult<Vec<InMemoContextPoint>> {
        let ids = self.arena.borrow().point_ids();
        Ok(ids
            .into_iter()
            .map(|id| InMemoContextPoint::new(Rc::clone(&self.arena), id))
            .collect())
    }

    fn remove_context_point(&self, cp: &InMemoContextPoint) -> KbResult<()> {
        self.arena.borrow_mut().remove_point(cp.id())
    }
}
