//! In-memory tag handle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use semantic_model::{validate_name, KbError, KbResult, ObjectId, TagKind};

use super::arena::{Arena, TagNode};
use crate::knowledge_base::algebra::ensure_no_cycle;
use crate::knowledge_base::{PropertyHolder, SemanticTag, SnSemanticTag, TxSemanticTag};

/// Handle to a tag living in an in-memory store.
///
/// Cloning is cheap; every clone refers to the same tag.
#[derive(Clone)]
pub struct InMemoTag {
    arena: Rc<RefCell<Arena>>,
    id: ObjectId,
}

impl InMemoTag {
    pub(crate) fn new(arena: Rc<RefCell<Arena>>, id: ObjectId) -> Self {
        Self { arena, id }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    fn read<T>(&self, f: impl FnOnce(&TagNode) -> T) -> KbResult<T> {
        let arena = self.arena.borrow();
        Ok(f(arena.tag(self.id)?))
    }

    fn write<T>(&self, f: impl FnOnce(&mut TagNode) -> KbResult<T>) -> KbResult<T> {
        let mut arena = self.arena.borrow_mut();
        f(arena.tag_mut(self.id)?)
    }

    fn sibling(&self, id: ObjectId) -> Self {
        Self::new(Rc::clone(&self.arena), id)
    }

    fn siblings(&self, ids: Vec<ObjectId>) -> Vec<Self> {
        ids.into_iter().map(|id| self.sibling(id)).collect()
    }

    fn ensure_same_store(&self, other: &Self) -> KbResult<()> {
        if Rc::ptr_eq(&self.arena, &other.arena) {
            Ok(())
        } else {
            Err(KbError::NotFound(format!(
                "tag {} belongs to another store",
                other.id
            )))
        }
    }
}

impl fmt::Debug for InMemoTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoTag").field("id", &self.id).finish()
    }
}

impl PropertyHolder for InMemoTag {
    fn property(&self, key: &str) -> KbResult<Option<String>> {
        self.read(|node| node.properties.get(key).map(str::to_string))
    }

    fn write_property(&self, key: &str, value: Option<&str>) -> KbResult<()> {
        self.write(|node| {
            match value {
                Some(value) => node.properties.set(key, value),
                None => node.properties.remove(key),
            };
            Ok(())
        })
    }

    fn all_property_keys(&self) -> KbResult<Vec<String>> {
        self.read(|node| node.properties.keys().map(str::to_string).collect())
    }
}

impl SemanticTag for InMemoTag {
    fn si(&self) -> KbResult<Vec<String>> {
        self.read(|node| node.sis.clone())
    }

    fn add_si(&self, si: &str) -> KbResult<()> {
        self.arena.borrow_mut().add_si(self.id, si)
    }

    fn check_si_free(&self, si: &str) -> KbResult<()> {
        self.arena.borrow().check_si(self.id, si).map(|_| ())
    }

    fn remove_si(&self, si: &str) -> KbResult<()> {
        self.arena.borrow_mut().remove_si(self.id, si)
    }

    fn name(&self) -> KbResult<Option<String>> {
        self.read(|node| node.name.clone())
    }

    fn set_name(&self, name: Option<&str>) -> KbResult<()> {
        if let Some(name) = name {
            validate_name(name)?;
        }
        self.write(|node| {
            node.name = name.map(str::to_string);
            Ok(())
        })
    }

    fn is_hidden(&self) -> KbResult<bool> {
        self.read(|node| node.hidden)
    }

    fn set_hidden(&self, hidden: bool) -> KbResult<()> {
        self.write(|node| {
            node.hidden = hidden;
            Ok(())
        })
    }

    fn kind(&self) -> KbResult<TagKind> {
        self.read(|node| node.kind.clone())
    }

    fn set_kind(&self, kind: TagKind) -> KbResult<()> {
        self.write(|node| {
            node.kind.ensure_same_type(&kind)?;
            node.kind = kind;
            Ok(())
        })
    }
}

impl TxSemanticTag for InMemoTag {
    fn super_tag(&self) -> KbResult<Option<Self>> {
        let parent = self.read(|node| node.super_tag)?;
        Ok(parent.map(|id| self.sibling(id)))
    }

    fn sub_tags(&self) -> KbResult<Vec<Self>> {
        let ids = self.arena.borrow().children(self.id)?;
        Ok(self.siblings(ids))
    }

    fn move_to(&self, new_super: Option<&Self>) -> KbResult<()> {
        if let Some(parent) = new_super {
            self.ensure_same_store(parent)?;
            self.arena.borrow().tag(parent.id)?;
            ensure_no_cycle(self, parent)?;
        }
        let parent = new_super.map(|p| p.id);
        self.write(|node| {
            node.super_tag = parent;
            Ok(())
        })
    }
}

impl SnSemanticTag for InMemoTag {
    fn set_predicate(&self, predicate: &str, target: &Self) -> KbResult<()> {
        self.ensure_same_store(target)?;
        self.arena.borrow().tag(target.id)?;
        self.write(|node| {
            let targets = node.predicates.entry(predicate.to_string()).or_default();
            if !targets.contains(&target.id) {
                targets.push(target.id);
            }
            Ok(())
        })
    }

    fn remove_predicate(&self, predicate: &str, target: &Self) -> KbResult<()> {
        self.ensure_same_store(target)?;
        self.write(|node| {
            if let Some(targets) = node.predicates.get_mut(predicate) {
                targets.retain(|t| *t != target.id);
                if targets.is_empty() {
                    node.predicates.remove(predicate);
                }
            }
            Ok(())
        })
    }

    fn target_tags(&self, predicate: &str) -> KbResult<Vec<Self>> {
        let ids = self.read(|node| node.predicates.get(predicate).cloned().unwrap_or_default())?;
        Ok(self.siblings(ids))
    }

    fn source_tags(&self, predicate: &str) -> KbResult<Vec<Self>> {
        let ids = self.arena.borrow().sources(self.id, predicate)?;
        Ok(self.siblings(ids))
    }

    fn predicate_names(&self) -> KbResult<Vec<String>> {
        self.read(|node| node.predicates.keys().cloned().collect())
    }

    fn incoming_predicate_names(&self) -> KbResult<Vec<String>> {
        self.arena.borrow().incoming_predicates(self.id)
    }
}
