//! The in-process state every in-memory handle points into.

use std::collections::{BTreeMap, HashMap};

use semantic_model::{
    normalize_sis, system_keys, CommDirection, ContextCoordinates, IdIssuer, KbError, KbResult,
    ObjectId, PropertyBag, TagKind, TagSnapshot, TagType,
};

/// Stored state of one tag.
#[derive(Debug, Clone)]
pub(crate) struct TagNode {
    pub sis: Vec<String>,
    pub name: Option<String>,
    pub properties: PropertyBag,
    pub hidden: bool,
    pub kind: TagKind,
    pub super_tag: Option<ObjectId>,
    /// Outgoing edges; targets keep insertion order.
    pub predicates: BTreeMap<String, Vec<ObjectId>>,
}

#[derive(Debug, Clone)]
pub(crate) struct InfoNode {
    pub point: ObjectId,
    pub content: Vec<u8>,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone)]
pub(crate) struct PointNode {
    pub dimensions: [Option<ObjectId>; 5],
    pub direction: CommDirection,
    pub infos: Vec<ObjectId>,
}

/// Tags, information and context points of one in-memory store.
pub(crate) struct Arena {
    issuer: Box<dyn IdIssuer>,
    tags: HashMap<ObjectId, TagNode>,
    tag_order: Vec<ObjectId>,
    si_index: HashMap<String, ObjectId>,
    infos: HashMap<ObjectId, InfoNode>,
    points: HashMap<ObjectId, PointNode>,
    point_order: Vec<ObjectId>,
}

impl Arena {
    pub fn new(issuer: Box<dyn IdIssuer>) -> Self {
        Self {
            issuer,
            tags: HashMap::new(),
            tag_order: Vec::new(),
            si_index: HashMap::new(),
            infos: HashMap::new(),
            points: HashMap::new(),
            point_order: Vec::new(),
        }
    }

    pub fn tag(&self, id: ObjectId) -> KbResult<&TagNode> {
        self.tags
            .get(&id)
            .ok_or_else(|| KbError::NotFound(format!("tag {}", id)))
    }

    pub fn tag_mut(&mut self, id: ObjectId) -> KbResult<&mut TagNode> {
        self.tags
            .get_mut(&id)
            .ok_or_else(|| KbError::NotFound(format!("tag {}", id)))
    }

    pub fn insert_tag(&mut self, snapshot: &TagSnapshot) -> KbResult<ObjectId> {
        let sis = normalize_sis(&snapshot.sis)?;
        if let Some(taken) = sis.iter().find(|si| self.si_index.contains_key(*si)) {
            return Err(KbError::DuplicateIdentifier(taken.clone()));
        }

        let id = self.issuer.issue();
        for si in &sis {
            self.si_index.insert(si.clone(), id);
        }
        self.tags.insert(
            id,
            TagNode {
                sis,
                name: snapshot.name.clone(),
                properties: snapshot.properties.clone(),
                hidden: snapshot.hidden,
                kind: snapshot.kind.clone(),
                super_tag: None,
                predicates: BTreeMap::new(),
            },
        );
        self.tag_order.push(id);
        Ok(id)
    }

    pub fn owner_of(&self, si: &str) -> Option<ObjectId> {
        self.si_index.get(si).copied()
    }

    /// The tag of `tag_type` owning any of `sis`.
    pub fn find(&self, sis: &[&str], tag_type: TagType) -> Option<ObjectId> {
        sis.iter()
            .filter_map(|si| self.owner_of(si))
            .find(|id| {
                self.tags
                    .get(id)
                    .map_or(false, |node| node.kind.tag_type() == tag_type)
            })
    }

    /// Tag ids of one type in creation order.
    pub fn tag_ids(&self, tag_type: TagType, include_hidden: bool) -> Vec<ObjectId> {
        self.tag_order
            .iter()
            .copied()
            .filter(|id| {
                self.tags.get(id).map_or(false, |node| {
                    node.kind.tag_type() == tag_type && (include_hidden || !node.hidden)
                })
            })
            .collect()
    }

    /// Whether `si` could be given to `id`: `Ok(true)` when `id` already owns it.
    pub fn check_si(&self, id: ObjectId, si: &str) -> KbResult<bool> {
        if si.trim().is_empty() {
            return Err(KbError::InvalidTag("blank subject identifier".into()));
        }
        self.tag(id)?;
        match self.owner_of(si) {
            Some(owner) if owner == id => Ok(true),
            Some(_) => Err(KbError::DuplicateIdentifier(si.to_string())),
            None => Ok(false),
        }
    }

    pub fn add_si(&mut self, id: ObjectId, si: &str) -> KbResult<()> {
        if self.check_si(id, si)? {
            return Ok(());
        }
        self.tag_mut(id)?.sis.push(si.to_string());
        self.si_index.insert(si.to_string(), id);
        Ok(())
    }

    pub fn remove_si(&mut self, id: ObjectId, si: &str) -> KbResult<()> {
        let node = self.tag_mut(id)?;
        if !node.sis.iter().any(|s| s == si) {
            return Ok(());
        }
        if node.sis.len() == 1 {
            return Err(KbError::InvalidTag(format!(
                "cannot remove '{}', the last subject identifier",
                si
            )));
        }
        node.sis.retain(|s| s != si);
        self.si_index.remove(si);
        Ok(())
    }

    /// Drop a tag and every reference to it. Its SIs become free again.
    pub fn remove_tag(&mut self, id: ObjectId) -> KbResult<()> {
        let node = self
            .tags
            .remove(&id)
            .ok_or_else(|| KbError::NotFound(format!("tag {}", id)))?;
        for si in &node.sis {
            self.si_index.remove(si);
        }
        self.tag_order.retain(|t| *t != id);

        for other in self.tags.values_mut() {
            if other.super_tag == Some(id) {
                other.super_tag = None;
            }
            for targets in other.predicates.values_mut() {
                targets.retain(|t| *t != id);
            }
            other.predicates.retain(|_, targets| !targets.is_empty());
        }
        for point in self.points.values_mut() {
            for dim in point.dimensions.iter_mut() {
                if *dim == Some(id) {
                    *dim = None;
                }
            }
        }
        Ok(())
    }

    pub fn children(&self, id: ObjectId) -> KbResult<Vec<ObjectId>> {
        self.tag(id)?;
        Ok(self
            .tag_order
            .iter()
            .copied()
            .filter(|child| {
                self.tags
                    .get(child)
                    .map_or(false, |node| node.super_tag == Some(id))
            })
            .collect())
    }

    pub fn sources(&self, id: ObjectId, predicate: &str) -> KbResult<Vec<ObjectId>> {
        self.tag(id)?;
        Ok(self
            .tag_order
            .iter()
            .copied()
            .filter(|source| {
                self.tags.get(source).map_or(false, |node| {
                    node.predicates
                        .get(predicate)
                        .map_or(false, |targets| targets.contains(&id))
                })
            })
            .collect())
    }

    pub fn incoming_predicates(&self, id: ObjectId) -> KbResult<Vec<String>> {
        self.tag(id)?;
        let mut names: Vec<String> = self
            .tags
            .values()
            .flat_map(|node| {
                node.predicates
                    .iter()
                    .filter(|(_, targets)| targets.contains(&id))
                    .map(|(name, _)| name.clone())
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Resolve every named dimension to the tag owning that SI.
    pub fn resolve(&self, coordinates: &ContextCoordinates) -> KbResult<[Option<ObjectId>; 5]> {
        let mut out = [None; 5];
        for (slot, si) in out.iter_mut().zip(coordinates.dimensions()) {
            if let Some(si) = si {
                let owner = self.owner_of(si).ok_or_else(|| {
                    KbError::NotFound(format!("no tag with subject identifier '{}'", si))
                })?;
                *slot = Some(owner);
            }
        }
        Ok(out)
    }

    pub fn find_point(
        &self,
        dimensions: &[Option<ObjectId>; 5],
        direction: CommDirection,
    ) -> Option<ObjectId> {
        self.point_order.iter().copied().find(|id| {
            self.points
                .get(id)
                .map_or(false, |p| p.dimensions == *dimensions && p.direction == direction)
        })
    }

    pub fn insert_point(
        &mut self,
        dimensions: [Option<ObjectId>; 5],
        direction: CommDirection,
    ) -> ObjectId {
        let id = self.issuer.issue();
        self.points.insert(
            id,
            PointNode {
                dimensions,
                direction,
                infos: Vec::new(),
            },
        );
        self.point_order.push(id);
        id
    }

    pub fn point(&self, id: ObjectId) -> KbResult<&PointNode> {
        self.points
            .get(&id)
            .ok_or_else(|| KbError::NotFound(format!("context point {}", id)))
    }

    pub fn point_ids(&self) -> Vec<ObjectId> {
        self.point_order.clone()
    }

    pub fn remove_point(&mut self, id: ObjectId) -> KbResult<()> {
        let point = self
            .points
            .remove(&id)
            .ok_or_else(|| KbError::NotFound(format!("context point {}", id)))?;
        for info in point.infos {
            self.infos.remove(&info);
        }
        self.point_order.retain(|p| *p != id);
        Ok(())
    }

    /// First SI of a tag, `None` once the tag is gone.
    pub fn first_si(&self, id: Option<ObjectId>) -> Option<String> {
        id.and_then(|id| self.tags.get(&id))
            .and_then(|node| node.sis.first().cloned())
    }

    pub fn info(&self, id: ObjectId) -> KbResult<&InfoNode> {
        self.infos
            .get(&id)
            .ok_or_else(|| KbError::NotFound(format!("information {}", id)))
    }

    pub fn info_mut(&mut self, id: ObjectId) -> KbResult<&mut InfoNode> {
        self.infos
            .get_mut(&id)
            .ok_or_else(|| KbError::NotFound(format!("information {}", id)))
    }

    pub fn insert_info(&mut self, point: ObjectId, content: &[u8], now: i64) -> KbResult<ObjectId> {
        self.point(point)?;
        let id = self.issuer.issue();

        let mut properties = PropertyBag::new();
        properties.set(system_keys::CREATION_TIME, now.to_string());
        properties.set(system_keys::LAST_MODIFIED, now.to_string());
        properties.set(system_keys::INFO_ID, id.to_string());

        self.infos.insert(
            id,
            InfoNode {
                point,
                content: content.to_vec(),
                properties,
            },
        );
        if let Some(p) = self.points.get_mut(&point) {
            p.infos.push(id);
        }
        Ok(id)
    }

    pub fn remove_info(&mut self, point: ObjectId, info: ObjectId) -> KbResult<()> {
        let attached = self.infos.get(&info).map_or(false, |node| node.point == point);
        if !attached {
            return Err(KbError::NotFound(format!(
                "information {} at context point {}",
                info, point
            )));
        }
        self.infos.remove(&info);
        if let Some(p) = self.points.get_mut(&point) {
            p.infos.retain(|i| *i != info);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semantic_model::SequentialIssuer;

    fn arena() -> Arena {
        Arena::new(Box::new(SequentialIssuer::new()))
    }

    #[test]
    fn test_insert_rejects_taken_si() {
        let mut arena = arena();
        arena.insert_tag(&TagSnapshot::new("urn:a")).unwrap();
        let err = arena
            .insert_tag(&TagSnapshot::new("urn:b").with_si("urn:a"))
            .unwrap_err();
        assert_eq!(err, KbError::DuplicateIdentifier("urn:a".into()));
        assert!(arena.owner_of("urn:b").is_none());
    }

    #[test]
    fn test_remove_tag_frees_sis_and_detaches() {
        let mut arena = arena();
        let parent = arena.insert_tag(&TagSnapshot::new("urn:p")).unwrap();
        let child = arena.insert_tag(&TagSnapshot::new("urn:c")).unwrap();
        arena.tag_mut(child).unwrap().super_tag = Some(parent);
        arena
            .tag_mut(child)
            .unwrap()
            .predicates
            .insert("likes".into(), vec![parent]);

        arena.remove_tag(parent).unwrap();

        assert!(arena.owner_of("urn:p").is_none());
        let node = arena.tag(child).unwrap();
        assert_eq!(node.super_tag, None);
        assert!(node.predicates.is_empty());
        assert!(matches!(arena.remove_tag(parent), Err(KbError::NotFound(_))));
    }

    #[test]
    fn test_remove_last_si_rejected() {
        let mut arena = arena();
        let id = arena.insert_tag(&TagSnapshot::new("urn:a")).unwrap();
        assert!(matches!(arena.remove_si(id, "urn:a"), Err(KbError::InvalidTag(_))));
        arena.add_si(id, "urn:b").unwrap();
        arena.remove_si(id, "urn:a").unwrap();
        assert_eq!(arena.tag(id).unwrap().sis, vec!["urn:b"]);
        assert_eq!(arena.owner_of("urn:a"), None);
    }

    #[test]
    fn test_tag_order_is_creation_order() {
        let mut arena = arena();
        let a = arena.insert_tag(&TagSnapshot::new("urn:a")).unwrap();
        let b = arena
            .insert_tag(&TagSnapshot::new("urn:b").with_hidden(true))
            .unwrap();
        let c = arena.insert_tag(&TagSnapshot::new("urn:c")).unwrap();

        assert_eq!(arena.tag_ids(TagType::Semantic, true), vec![a, b, c]);
        assert_eq!(arena.tag_ids(TagType::Semantic, false), vec![a, c]);
        assert!(arena.tag_ids(TagType::Peer, true).is_empty());
    }
}
