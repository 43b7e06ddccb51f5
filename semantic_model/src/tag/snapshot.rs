//! Detached tag values and the value-level tag algebra.

use serde::{Deserialize, Serialize};

use super::TagKind;
use crate::{normalize_sis, sis_intersect, validate_name, KbError, KbResult, PropertyBag};

/// A tag's state copied out of its backend.
///
/// Snapshots are what travels between independent store instances: they carry
/// no row id or arena slot, only the data the algebra looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSnapshot {
    /// Subject identifiers, in the order they were added.
    pub sis: Vec<String>,

    /// Optional display label.
    pub name: Option<String>,

    /// User properties (system keys never appear here).
    pub properties: PropertyBag,

    /// Visibility flag honoured by enumeration.
    pub hidden: bool,

    /// Type-specific payload.
    pub kind: TagKind,
}

impl TagSnapshot {
    /// Create a plain semantic tag with one subject identifier.
    pub fn new(si: impl Into<String>) -> Self {
        Self {
            sis: vec![si.into()],
            name: None,
            properties: PropertyBag::new(),
            hidden: false,
            kind: TagKind::Semantic,
        }
    }

    /// Add a subject identifier.
    pub fn with_si(mut self, si: impl Into<String>) -> Self {
        let si = si.into();
        if !self.sis.contains(&si) {
            self.sis.push(si);
        }
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set a user property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Set the type-specific payload.
    pub fn with_kind(mut self, kind: TagKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark the tag hidden.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Check the snapshot can be stored: at least one SI, a valid name.
    pub fn validate(&self) -> KbResult<()> {
        normalize_sis(&self.sis)?;
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        Ok(())
    }

    /// Two tags are identical iff their SI sets intersect. Names and
    /// properties play no part.
    pub fn identical(&self, other: &TagSnapshot) -> bool {
        sis_intersect(&self.sis, &other.sis)
    }

    /// Merge `other` into a copy of `self` (the receiving side).
    ///
    /// Identical inputs yield the SI union, the receiver's name unless it has
    /// none, and the property union with the receiver winning conflicts.
    /// Unrelated inputs return the receiver unchanged.
    pub fn merge(&self, other: &TagSnapshot) -> KbResult<TagSnapshot> {
        if self.sis.is_empty() || other.sis.is_empty() {
            return Err(KbError::InvalidTag(
                "cannot merge a tag without subject identifiers".into(),
            ));
        }

        let mut merged = self.clone();
        if !self.identical(other) {
            return Ok(merged);
        }

        for si in &other.sis {
            if !merged.sis.contains(si) {
                merged.sis.push(si.clone());
            }
        }
        if merged.name.is_none() {
            merged.name = other.name.clone();
        }
        merged.properties.merge_missing(&other.properties);
        Ok(merged)
    }

    /// Structural equality: same SI set (order ignored), name, properties,
    /// visibility and payload.
    pub fn same(&self, other: &TagSnapshot) -> bool {
        let mut a = self.sis.clone();
        let mut b = other.sis.clone();
        a.sort();
        b.sort();
        a == b
            && self.name == other.name
            && self.properties == other.properties
            && self.hidden == other.hidden
            && self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TagType, TimeSpan};
    use proptest::prelude::*;

    #[test]
    fn test_snapshot_builder() {
        let tag = TagSnapshot::new("http://a.de")
            .with_si("http://a.org")
            .with_si("http://a.de")
            .with_name("A")
            .with_property("p1", "v1");

        assert_eq!(tag.sis, vec!["http://a.de", "http://a.org"]);
        assert_eq!(tag.name.as_deref(), Some("A"));
        assert_eq!(tag.properties.get("p1"), Some("v1"));
        assert_eq!(tag.kind.tag_type(), TagType::Semantic);
    }

    #[test]
    fn test_identical_ignores_name() {
        let a = TagSnapshot::new("http://a.de").with_name("A");
        let b = TagSnapshot::new("http://a.de").with_name("Other");
        let c = TagSnapshot::new("http://c.de").with_name("A");

        assert!(a.identical(&b));
        assert!(!a.identical(&c));
    }

    #[test]
    fn test_identical_after_shared_si() {
        let a = TagSnapshot::new("http://a.de");
        let b = TagSnapshot::new("http://b.de");
        assert!(!a.identical(&b));

        let b = b.with_si("http://a.de");
        assert!(a.identical(&b));
    }

    #[test]
    fn test_merge_prefers_receiver() {
        let receiver = TagSnapshot::new("http://a.de")
            .with_property("p1", "mine");
        let incoming = TagSnapshot::new("http://a.de")
            .with_si("http://a2.de")
            .with_name("Incoming")
            .with_property("p1", "theirs")
            .with_property("p2", "v2");

        let merged = receiver.merge(&incoming).unwrap();
        assert_eq!(merged.sis, vec!["http://a.de", "http://a2.de"]);
        assert_eq!(merged.name.as_deref(), Some("Incoming"));
        assert_eq!(merged.properties.get("p1"), Some("mine"));
        assert_eq!(merged.properties.get("p2"), Some("v2"));

        let named = receiver.clone().with_name("Mine");
        assert_eq!(named.merge(&incoming).unwrap().name.as_deref(), Some("Mine"));
    }

    #[test]
    fn test_merge_unrelated_is_noop() {
        let a = TagSnapshot::new("http://a.de").with_name("A");
        let b = TagSnapshot::new("http://b.de").with_property("p", "v");

        let merged = a.merge(&b).unwrap();
        assert!(merged.same(&a));
    }

    #[test]
    fn test_merge_rejects_empty_identity() {
        let a = TagSnapshot::new("http://a.de");
        let mut broken = TagSnapshot::new("x");
        broken.sis.clear();

        assert!(matches!(a.merge(&broken), Err(KbError::InvalidTag(_))));
        assert!(matches!(broken.merge(&a), Err(KbError::InvalidTag(_))));
    }

    #[test]
    fn test_same_ignores_si_order() {
        let a = TagSnapshot::new("x").with_si("y");
        let b = TagSnapshot::new("y").with_si("x");
        assert!(a.same(&b));

        let c = b.clone().with_kind(TagKind::Time(TimeSpan::always()));
        assert!(!a.same(&c));
    }

    #[test]
    fn test_validate() {
        assert!(TagSnapshot::new("http://a.de").validate().is_ok());
        assert!(matches!(
            TagSnapshot::new("http://a.de").with_name("a/b").validate(),
            Err(KbError::InvalidName(_))
        ));
    }

    fn snapshot_strategy() -> impl Strategy<Value = TagSnapshot> {
        (
            prop::collection::vec("[a-e]", 1..4),
            prop::option::of("[A-Z][a-z]{0,4}"),
            prop::collection::btree_map("[p-r]", "[0-9]", 0..3),
        )
            .prop_map(|(sis, name, props)| {
                let mut tag = TagSnapshot::new(format!("si:{}", sis[0]));
                for si in &sis[1..] {
                    tag = tag.with_si(format!("si:{}", si));
                }
                tag.name = name;
                for (k, v) in props {
                    tag = tag.with_property(k, v);
                }
                tag
            })
    }

    proptest! {
        #[test]
        fn prop_identical_is_symmetric(a in snapshot_strategy(), b in snapshot_strategy()) {
            prop_assert_eq!(a.identical(&b), b.identical(&a));
        }

        #[test]
        fn prop_merge_is_union_and_idempotent(a in snapshot_strategy(), b in snapshot_strategy()) {
            prop_assume!(a.identical(&b));

            let once = a.merge(&b).unwrap();
            for si in a.sis.iter().chain(b.sis.iter()) {
                prop_assert!(once.sis.contains(si));
            }
            prop_assert!(once.sis.iter().all(|si| a.sis.contains(si) || b.sis.contains(si)));

            let twice = once.merge(&b).unwrap();
            prop_assert!(twice.same(&once));
        }
    }
}
