//! In-memory tag set views.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use semantic_model::{KbError, KbResult, RandomIssuer, TagSnapshot, TagType};

use super::arena::Arena;
use super::InMemoTag;
use crate::context_assembler::{Flat, FragmentationParameter, Graph, Structure, Tree};
use crate::knowledge_base::{
    SemanticNet, SemanticTag, SnSemanticTag, StSet, Taxonomy, TxSemanticTag,
};

/// A view over the tags of one type in an in-memory store.
///
/// The structure parameter decides what fragmentation follows: nothing
/// ([`Flat`]), super/sub links ([`Tree`]) or predicates ([`Graph`]). Views
/// over the same store share all tags.
pub struct InMemoView<S = Flat> {
    arena: Rc<RefCell<Arena>>,
    tag_type: TagType,
    show_hidden: Cell<bool>,
    structure: PhantomData<S>,
}

pub type InMemoStSet = InMemoView<Flat>;
pub type InMemoTaxonomy = InMemoView<Tree>;
pub type InMemoSemanticNet = InMemoView<Graph>;

impl<S> InMemoView<S> {
    pub(crate) fn new(arena: Rc<RefCell<Arena>>, tag_type: TagType) -> Self {
        Self {
            arena,
            tag_type,
            show_hidden: Cell::new(false),
            structure: PhantomData,
        }
    }

    /// An empty set with a store of its own.
    pub fn standalone(tag_type: TagType) -> Self {
        Self::new(Rc::new(RefCell::new(Arena::new(Box::new(RandomIssuer)))), tag_type)
    }

    fn reshape<T>(&self) -> InMemoView<T> {
        InMemoView::new(Rc::clone(&self.arena), self.tag_type)
    }

    pub fn as_set(&self) -> InMemoStSet {
        self.reshape()
    }

    pub fn as_taxonomy(&self) -> InMemoTaxonomy {
        self.reshape()
    }

    pub fn as_semantic_net(&self) -> InMemoSemanticNet {
        self.reshape()
    }

    fn handle(&self, id: semantic_model::ObjectId) -> InMemoTag {
        InMemoTag::new(Rc::clone(&self.arena), id)
    }
}

impl<S> Clone for InMemoView<S> {
    fn clone(&self) -> Self {
        let view = self.reshape();
        view.show_hidden.set(self.show_hidden.get());
        view
    }
}

impl<S> fmt::Debug for InMemoView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoView")
            .field("tag_type", &self.tag_type)
            .field("show_hidden", &self.show_hidden.get())
            .finish()
    }
}

impl<S: Structure> StSet for InMemoView<S> {
    type Tag = InMemoTag;

    fn tag_type(&self) -> TagType {
        self.tag_type
    }

    fn create_from_snapshot(&self, snapshot: &TagSnapshot) -> KbResult<InMemoTag> {
        snapshot.validate()?;
        if snapshot.kind.tag_type() != self.tag_type {
            return Err(KbError::InvalidTag(format!(
                "a {} tag does not belong in a {} set",
                snapshot.kind.tag_type(),
                self.tag_type
            )));
        }
        let id = self.arena.borrow_mut().insert_tag(snapshot)?;
        tracing::debug!(target: "kb::inmemory", %id, sis = ?snapshot.sis, "created tag");
        Ok(self.handle(id))
    }

    fn get_semantic_tag(&self, sis: &[&str]) -> KbResult<Option<InMemoTag>> {
        let found = self.arena.borrow().find(sis, self.tag_type);
        Ok(found.map(|id| self.handle(id)))
    }

    fn get_semantic_tag_by_name(&self, pattern: &str) -> KbResult<Vec<InMemoTag>> {
        let arena = self.arena.borrow();
        let ids = arena.tag_ids(self.tag_type, true);
        Ok(ids
            .into_iter()
            .filter(|id| {
                arena.tag(*id).map_or(false, |node| {
                    node.name.as_deref().map_or(false, |name| name.contains(pattern))
                })
            })
            .map(|id| self.handle(id))
            .collect())
    }

    fn remove_semantic_tag(&self, tag: &dyn SemanticTag) -> KbResult<()> {
        let sis = tag.si()?;
        let refs: Vec<&str> = sis.iter().map(String::as_str).collect();
        let mut arena = self.arena.borrow_mut();
        let id = arena
            .find(&refs, self.tag_type)
            .ok_or_else(|| KbError::NotFound(format!("no member with identifiers {:?}", sis)))?;
        arena.remove_tag(id)?;
        tracing::debug!(target: "kb::inmemory", %id, "removed tag");
        Ok(())
    }

    fn all_tags(&self, include_hidden: bool) -> KbResult<Vec<InMemoTag>> {
        let ids = self.arena.borrow().tag_ids(self.tag_type, include_hidden);
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    fn enumerate_hidden_tags(&self) -> bool {
        self.show_hidden.get()
    }

    fn set_enumerate_hidden_tags(&self, enumerate: bool) {
        self.show_hidden.set(enumerate);
    }

    fn size(&self) -> KbResult<usize> {
        Ok(self.arena.borrow().tag_ids(self.tag_type, true).len())
    }

    fn context_of(
        &self,
        anchor: &InMemoTag,
        params: &FragmentationParameter,
    ) -> KbResult<Vec<InMemoTag>> {
        S::context_of(anchor, params)
    }

    fn copy_relations(&self, selected: &[InMemoTag], into: &InMemoStSet) -> KbResult<()> {
        S::copy_relations(selected, into)
    }
}

impl Taxonomy for InMemoTaxonomy {
    fn root_tags(&self) -> KbResult<Vec<InMemoTag>> {
        let mut roots = Vec::new();
        for tag in self.tags()? {
            if tag.is_root()? {
                roots.push(tag);
            }
        }
        Ok(roots)
    }
}

impl SemanticNet for InMemoSemanticNet {
    fn edges(&self) -> KbResult<Vec<(InMemoTag, String, InMemoTag)>> {
        let mut edges = Vec::new();
        for source in self.all_tags(true)? {
            for predicate in source.predicate_names()? {
                for target in source.target_tags(&predicate)? {
                    edges.push((source.clone(), predicate.clone(), target));
                }
            }
        }
        Ok(edges)
    }
}
