//! In-memory information and context points.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use semantic_model::{
    now_millis, system_keys, CommDirection, ContextCoordinates, KbError, KbResult, ObjectId,
};

use super::arena::Arena;
use crate::knowledge_base::{ContextPoint, Information, PropertyHolder};

/// Handle to an information object in an in-memory store.
#[derive(Clone)]
pub struct InMemoInformation {
    arena: Rc<RefCell<Arena>>,
    id: ObjectId,
}

impl InMemoInformation {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl fmt::Debug for InMemoInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoInformation").field("id", &self.id).finish()
    }
}

impl PropertyHolder for InMemoInformation {
    fn property(&self, key: &str) -> KbResult<Option<String>> {
        let arena = self.arena.borrow();
        Ok(arena.info(self.id)?.properties.get(key).map(str::to_string))
    }

    fn write_property(&self, key: &str, value: Option<&str>) -> KbResult<()> {
        let mut arena = self.arena.borrow_mut();
        let info = arena.info_mut(self.id)?;
        match value {
            Some(value) => info.properties.set(key, value),
            None => info.properties.remove(key),
        };
        Ok(())
    }

    fn all_property_keys(&self) -> KbResult<Vec<String>> {
        let arena = self.arena.borrow();
        Ok(arena.info(self.id)?.properties.keys().map(str::to_string).collect())
    }
}

impl Information for InMemoInformation {
    fn content_as_bytes(&self) -> KbResult<Vec<u8>> {
        Ok(self.arena.borrow().info(self.id)?.content.clone())
    }

    fn content_length(&self) -> KbResult<u64> {
        Ok(self.arena.borrow().info(self.id)?.content.len() as u64)
    }

    fn write_content(&self, content: &[u8], modified_at: i64) -> KbResult<()> {
        let mut arena = self.arena.borrow_mut();
        let info = arena.info_mut(self.id)?;
        info.content = content.to_vec();
        info.properties
            .set(system_keys::LAST_MODIFIED, modified_at.to_string());
        Ok(())
    }
}

/// Handle to a context point in an in-memory store.
#[derive(Clone)]
pub struct InMemoContextPoint {
    arena: Rc<RefCell<Arena>>,
    id: ObjectId,
}

impl InMemoContextPoint {
    pub(crate) fn new(arena: Rc<RefCell<Arena>>, id: ObjectId) -> Self {
        Self { arena, id }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl fmt::Debug for InMemoContextPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoContextPoint").field("id", &self.id).finish()
    }
}

impl ContextPoint for InMemoContextPoint {
    type Info = InMemoInformation;

    fn coordinates(&self) -> KbResult<ContextCoordinates> {
        let arena = self.arena.borrow();
        let point = arena.point(self.id)?;
        let [topic, originator, peer, location, time] = point.dimensions;
        Ok(ContextCoordinates {
            topic: arena.first_si(topic),
            originator: arena.first_si(originator),
            peer: arena.first_si(peer),
            location: arena.first_si(location),
            time: arena.first_si(time),
            direction: point.direction,
        })
    }

    fn add_information(&self, content: &[u8]) -> KbResult<InMemoInformation> {
        let id = self
            .arena
            .borrow_mut()
            .insert_info(self.id, content, now_millis())?;
        Ok(InMemoInformation {
            arena: Rc::clone(&self.arena),
            id,
        })
    }

    fn information(&self) -> KbResult<Vec<InMemoInformation>> {
        let arena = self.arena.borrow();
        Ok(arena
            .point(self.id)?
            .infos
            .iter()
            .map(|id| InMemoInformation {
                arena: Rc::clone(&self.arena),
                id: *id,
            })
            .collect())
    }

    fn remove_information(&self, info: &InMemoInformation) -> KbResult<()> {
        if !Rc::ptr_eq(&self.arena, &info.arena) {
            return Err(KbError::NotFound(format!(
                "information {} belongs to another store",
                info.id
            )));
        }
        self.arena.borrow_mut().remove_info(self.id, info.id)
    }
}

/// Shared by the knowledge base: find or create the point at `coordinates`.
pub(crate) fn locate_point(
    arena: &Rc<RefCell<Arena>>,
    coordinates: &ContextCoordinates,
    create: bool,
) -> KbResult<Option<InMemoContextPoint>> {
    let dimensions = arena.borrow().resolve(coordinates)?;
    let direction: CommDirection = coordinates.direction;

    let existing = arena.borrow().find_point(&dimensions, direction);
    let id = match existing {
        Some(id) => id,
        None if create => arena.borrow_mut().insert_point(dimensions, direction),
        None => return Ok(None),
    };
    Ok(Some(InMemoContextPoint::new(Rc::clone(arena), id)))
}
