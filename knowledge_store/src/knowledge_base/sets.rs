//! Tag set capabilities and the knowledge base that hands them out.

use std::fmt;

use semantic_model::{
    normalize_sis, ContextCoordinates, KbResult, PropertyBag, TagKind, TagSnapshot, TagType,
    TimeSpan,
};

use super::algebra;
use super::{ContextPoint, Information, SemanticTag, SnSemanticTag, TxSemanticTag};
use crate::context_assembler::{self, FragmentationParameter};
use crate::inmemory::InMemoStSet;

/// A collection of tags of one type.
///
/// Every set of a knowledge base is a view over one shared tag space, so a
/// subject identifier belongs to at most one tag store-wide.
pub trait StSet {
    type Tag: SemanticTag + Clone;

    /// Type of the tags this set holds.
    fn tag_type(&self) -> TagType;

    /// Store a new tag built from `snapshot`.
    ///
    /// Fails with `InvalidTag` for an empty SI list or a payload of another
    /// tag type, and with `DuplicateIdentifier` if any SI is already taken.
    fn create_from_snapshot(&self, snapshot: &TagSnapshot) -> KbResult<Self::Tag>;

    /// The member owning any of `sis`, if one exists.
    fn get_semantic_tag(&self, sis: &[&str]) -> KbResult<Option<Self::Tag>>;

    /// Members whose name contains `pattern`, case-sensitive, in creation order.
    fn get_semantic_tag_by_name(&self, pattern: &str) -> KbResult<Vec<Self::Tag>>;

    /// Remove the member identical to `tag`. Its SIs become reusable.
    /// Fails with `NotFound` if no member matches.
    fn remove_semantic_tag(&self, tag: &dyn SemanticTag) -> KbResult<()>;

    /// Members in creation order, hidden ones only when asked for.
    fn all_tags(&self, include_hidden: bool) -> KbResult<Vec<Self::Tag>>;

    /// Whether [`tags`](Self::tags) yields hidden members.
    fn enumerate_hidden_tags(&self) -> bool;

    fn set_enumerate_hidden_tags(&self, enumerate: bool);

    /// Member count, hidden ones included.
    fn size(&self) -> KbResult<usize>;

    fn is_empty(&self) -> KbResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Members honouring the hidden-tag switch.
    fn tags(&self) -> KbResult<Vec<Self::Tag>> {
        self.all_tags(self.enumerate_hidden_tags())
    }

    /// Create a tag of this set's type with its default payload.
    fn create_semantic_tag(&self, name: &str, sis: &[&str]) -> KbResult<Self::Tag> {
        let kind = self.tag_type().default_kind();
        self.create_from_snapshot(&fresh(name, sis, kind)?)
    }

    fn create_peer_tag(&self, name: &str, sis: &[&str], addresses: &[&str]) -> KbResult<Self::Tag> {
        let kind = TagKind::Peer {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
        };
        self.create_from_snapshot(&fresh(name, sis, kind)?)
    }

    fn create_spatial_tag(&self, name: &str, sis: &[&str], ewkt: &str) -> KbResult<Self::Tag> {
        let kind = TagKind::Spatial {
            ewkt: ewkt.to_string(),
        };
        self.create_from_snapshot(&fresh(name, sis, kind)?)
    }

    /// Create a time tag; its SI is derived from the interval.
    fn create_time_tag(&self, span: TimeSpan) -> KbResult<Self::Tag> {
        let si = span.subject_identifier();
        self.create_from_snapshot(&TagSnapshot::new(si).with_kind(TagKind::Time(span)))
    }

    /// Merge a tag from anywhere into this set and return the member that
    /// absorbed it.
    ///
    /// With no identical member a copy is created. With exactly one, the SIs
    /// are unioned, the name is kept unless the member has none, and missing
    /// properties are copied over. SIs spanning two members fail with
    /// `DuplicateIdentifier`.
    fn merge(&self, tag: &dyn SemanticTag) -> KbResult<Self::Tag> {
        algebra::merge_into_set(self, tag)
    }

    /// Members in context of `anchor`. A flat set only knows the anchor.
    fn context_of(
        &self,
        anchor: &Self::Tag,
        _params: &FragmentationParameter,
    ) -> KbResult<Vec<Self::Tag>> {
        Ok(vec![anchor.clone()])
    }

    /// Copy the relations among `selected` into a derived set.
    fn copy_relations(&self, _selected: &[Self::Tag], _into: &InMemoStSet) -> KbResult<()> {
        Ok(())
    }

    /// Derive a new in-memory set holding what is in context of `anchor`.
    /// The source set is not touched.
    fn fragment(
        &self,
        anchor: &dyn SemanticTag,
        params: &FragmentationParameter,
    ) -> KbResult<InMemoStSet> {
        context_assembler::assemble(self, &[anchor], params)
    }

    /// Like [`fragment`](Self::fragment) for several anchors, combined as
    /// configured in `params`.
    fn contextualize(
        &self,
        anchors: &[&dyn SemanticTag],
        params: &FragmentationParameter,
    ) -> KbResult<InMemoStSet> {
        context_assembler::assemble(self, anchors, params)
    }
}

/// A tag set arranged as a forest.
pub trait Taxonomy: StSet {
    /// Create a new root tag.
    fn create_tx_semantic_tag(&self, name: &str, sis: &[&str]) -> KbResult<Self::Tag> {
        self.create_semantic_tag(name, sis)
    }

    /// Members without a super tag.
    fn root_tags(&self) -> KbResult<Vec<Self::Tag>>;
}

/// A tag set arranged as a directed multigraph with named edges.
pub trait SemanticNet: StSet {
    /// Every edge between members as `(source, predicate, target)`.
    fn edges(&self) -> KbResult<Vec<(Self::Tag, String, Self::Tag)>>;
}

/// The entry point of a store: typed tag sets and context points.
pub trait KnowledgeBase {
    type Tag: TxSemanticTag + SnSemanticTag + fmt::Debug;
    type Set: StSet<Tag = Self::Tag>;
    type Taxonomy: Taxonomy<Tag = Self::Tag>;
    type Net: SemanticNet<Tag = Self::Tag>;
    type Info: Information + fmt::Debug;
    type ContextPoint: ContextPoint<Info = Self::Info> + fmt::Debug;

    fn tag_set(&self, tag_type: TagType) -> Self::Set;

    fn taxonomy(&self, tag_type: TagType) -> Self::Taxonomy;

    fn semantic_net(&self, tag_type: TagType) -> Self::Net;

    /// Return the context point at `coordinates`, creating it if needed.
    ///
    /// Every named dimension must resolve to an existing tag; otherwise the
    /// call fails with `NotFound`.
    fn create_context_point(&self, coordinates: &ContextCoordinates)
        -> KbResult<Self::ContextPoint>;

    fn context_point(&self, coordinates: &ContextCoordinates)
        -> KbResult<Option<Self::ContextPoint>>;

    /// Context points in creation order.
    fn context_points(&self) -> KbResult<Vec<Self::ContextPoint>>;

    /// Remove a context point together with its information.
    fn remove_context_point(&self, cp: &Self::ContextPoint) -> KbResult<()>;

    fn topic_set(&self) -> Self::Set {
        self.tag_set(TagType::Semantic)
    }

    fn peer_set(&self) -> Self::Set {
        self.tag_set(TagType::Peer)
    }

    fn spatial_set(&self) -> Self::Set {
        self.tag_set(TagType::Spatial)
    }

    fn time_set(&self) -> Self::Set {
        self.tag_set(TagType::Time)
    }

    fn topics_as_taxonomy(&self) -> Self::Taxonomy {
        self.taxonomy(TagType::Semantic)
    }

    fn topics_as_semantic_net(&self) -> Self::Net {
        self.semantic_net(TagType::Semantic)
    }

    fn peers_as_taxonomy(&self) -> Self::Taxonomy {
        self.taxonomy(TagType::Peer)
    }

    fn peers_as_semantic_net(&self) -> Self::Net {
        self.semantic_net(TagType::Peer)
    }
}

fn fresh(name: &str, sis: &[&str], kind: TagKind) -> KbResult<TagSnapshot> {
    Ok(TagSnapshot {
        sis: normalize_sis(sis)?,
        name: Some(name.to_string()),
        properties: PropertyBag::new(),
        hidden: false,
        kind,
    })
}
