//! Tag capabilities: property holders, semantic tags and their taxonomy and
//! semantic net extensions.

use semantic_model::{
    check_user_key, is_system_key, KbResult, PropertyBag, TagKind, TagSnapshot, TagType,
};

/// Anything carrying a string-to-string property map.
///
/// Keys starting with `kb:` belong to the store itself. The checked setters
/// reject them; backends write them through [`write_property`](Self::write_property).
pub trait PropertyHolder {
    /// Read one property. Absent keys read as `None`.
    fn property(&self, key: &str) -> KbResult<Option<String>>;

    /// Write or, with `None`, delete a property without checking the key.
    fn write_property(&self, key: &str, value: Option<&str>) -> KbResult<()>;

    /// Every key including the system namespace, in lexical order.
    fn all_property_keys(&self) -> KbResult<Vec<String>>;

    /// Set a user property, replacing any previous value.
    fn set_property(&self, key: &str, value: &str) -> KbResult<()> {
        check_user_key(key)?;
        self.write_property(key, Some(value))
    }

    /// Remove a user property. Removing an absent key is a no-op.
    fn remove_property(&self, key: &str) -> KbResult<()> {
        check_user_key(key)?;
        self.write_property(key, None)
    }

    /// User property keys, in lexical order.
    fn property_keys(&self) -> KbResult<Vec<String>> {
        Ok(self
            .all_property_keys()?
            .into_iter()
            .filter(|key| !is_system_key(key))
            .collect())
    }

    /// Copy the user properties out.
    fn properties(&self) -> KbResult<PropertyBag> {
        let mut bag = PropertyBag::new();
        for key in self.property_keys()? {
            if let Some(value) = self.property(&key)? {
                bag.set(key, value);
            }
        }
        Ok(bag)
    }
}

/// A concept identified by one or more subject identifiers.
///
/// Handles stay valid only as long as the tag exists in its store. Once the
/// tag is removed, every accessor reports `NotFound`.
pub trait SemanticTag: PropertyHolder {
    /// Subject identifiers in the order they were added. Never empty.
    fn si(&self) -> KbResult<Vec<String>>;

    /// Add a subject identifier. Adding one the tag already has is a no-op;
    /// one owned by another tag fails with `DuplicateIdentifier`.
    fn add_si(&self, si: &str) -> KbResult<()>;

    /// Fail the way [`add_si`](Self::add_si) would, without writing: `si` must
    /// be non-blank and either unowned anywhere in the store or already ours.
    fn check_si_free(&self, si: &str) -> KbResult<()>;

    /// Run `apply` so that its writes land together or not at all.
    ///
    /// Backends without rollback run it directly; callers then validate
    /// everything that can fail before the first write.
    fn write_atomically(&self, apply: &mut dyn FnMut() -> KbResult<()>) -> KbResult<()> {
        apply()
    }

    /// Remove a subject identifier. Removing the last one fails with
    /// `InvalidTag`.
    fn remove_si(&self, si: &str) -> KbResult<()>;

    fn name(&self) -> KbResult<Option<String>>;

    /// Set or clear the display name. Names must not contain `/` or `\`.
    fn set_name(&self, name: Option<&str>) -> KbResult<()>;

    fn is_hidden(&self) -> KbResult<bool>;

    fn set_hidden(&self, hidden: bool) -> KbResult<()>;

    /// Type-specific payload: peer addresses, geometry or time span.
    fn kind(&self) -> KbResult<TagKind>;

    /// Replace the payload. The tag type itself never changes.
    fn set_kind(&self, kind: TagKind) -> KbResult<()>;

    fn tag_type(&self) -> KbResult<TagType> {
        Ok(self.kind()?.tag_type())
    }

    /// Copy this tag's state into a detached value.
    fn snapshot(&self) -> KbResult<TagSnapshot> {
        Ok(TagSnapshot {
            sis: self.si()?,
            name: self.name()?,
            properties: self.properties()?,
            hidden: self.is_hidden()?,
            kind: self.kind()?,
        })
    }
}

/// A tag placed in a taxonomy: at most one super tag, any number of sub tags.
pub trait TxSemanticTag: SemanticTag + Clone {
    fn super_tag(&self) -> KbResult<Option<Self>>;

    fn sub_tags(&self) -> KbResult<Vec<Self>>;

    /// Reattach this tag under `new_super`, or make it a root with `None`.
    /// Fails with `CycleDetected` if `new_super` is this tag or one of its
    /// descendants, leaving the tree untouched.
    fn move_to(&self, new_super: Option<&Self>) -> KbResult<()>;

    fn is_root(&self) -> KbResult<bool> {
        Ok(self.super_tag()?.is_none())
    }
}

/// A tag placed in a semantic net: named, directed edges to other tags.
pub trait SnSemanticTag: SemanticTag + Clone {
    /// Add an edge. Adding an existing edge is a no-op.
    fn set_predicate(&self, predicate: &str, target: &Self) -> KbResult<()>;

    /// Remove an edge. Removing an absent edge is a no-op.
    fn remove_predicate(&self, predicate: &str, target: &Self) -> KbResult<()>;

    /// Targets of outgoing edges with this predicate, in insertion order.
    fn target_tags(&self, predicate: &str) -> KbResult<Vec<Self>>;

    /// Sources of incoming edges with this predicate.
    fn source_tags(&self, predicate: &str) -> KbResult<Vec<Self>>;

    /// Predicates of outgoing edges, sorted.
    fn predicate_names(&self) -> KbResult<Vec<String>>;

    /// Predicates of incoming edges, sorted.
    fn incoming_predicate_names(&self) -> KbResult<Vec<String>>;
}
