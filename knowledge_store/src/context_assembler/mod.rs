//! Context Assembler - derives sub-collections around anchor tags.
//!
//! Fragmentation works as follows:
//! 1. **Anchoring**: Resolve each anchor to the member sharing one of its SIs
//! 2. **Reach**: Walk the set's structure breadth-first from each anchor
//! 3. **Combination**: Union or intersect the per-anchor selections
//! 4. **Copy**: Copy the selection, and the relations among it, into a fresh
//!    in-memory set
//!
//! The source set is only read.

mod reach;

pub use reach::*;

use std::collections::BTreeSet;

use semantic_model::{sis_intersect, KbError, KbResult};

use crate::inmemory::InMemoStSet;
use crate::knowledge_base::{SemanticTag, SnSemanticTag, StSet, TxSemanticTag};

/// Which way edges are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Taxonomy: towards sub tags. Net: along outgoing edges.
    #[default]
    Forward,
    /// Taxonomy: towards the super tag. Net: along incoming edges.
    Backward,
    Both,
}

/// How the selections of several anchors are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMode {
    #[default]
    Union,
    Intersection,
}

/// Configuration for fragmentation and contextualization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentationParameter {
    pub direction: Direction,

    /// Maximum hop count. `None` follows edges to closure.
    pub depth: Option<usize>,

    /// Net predicates to follow. `None` follows every predicate.
    pub predicates: Option<BTreeSet<String>>,

    pub combine: CombineMode,

    /// Whether the anchor itself is part of its selection.
    pub include_anchor: bool,
}

impl Default for FragmentationParameter {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            depth: None,
            predicates: None,
            combine: CombineMode::Union,
            include_anchor: true,
        }
    }
}

impl FragmentationParameter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Restrict net traversal to `predicate`; may be called repeatedly.
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicates
            .get_or_insert_with(BTreeSet::new)
            .insert(predicate.into());
        self
    }

    pub fn with_combine(mut self, combine: CombineMode) -> Self {
        self.combine = combine;
        self
    }

    pub fn without_anchor(mut self) -> Self {
        self.include_anchor = false;
        self
    }

    fn predicates_or<T, F>(&self, tag: &T, all: F) -> KbResult<Vec<String>>
    where
        F: FnOnce(&T) -> KbResult<Vec<String>>,
    {
        match &self.predicates {
            Some(only) => Ok(only.iter().cloned().collect()),
            None => all(tag),
        }
    }
}

/// How a set view is shaped, and therefore what is "in context".
pub trait Structure {
    fn context_of<T>(anchor: &T, params: &FragmentationParameter) -> KbResult<Vec<T>>
    where
        T: TxSemanticTag + SnSemanticTag;

    fn copy_relations<T>(selected: &[T], into: &InMemoStSet) -> KbResult<()>
    where
        T: TxSemanticTag + SnSemanticTag;
}

/// Plain set: only the anchor is in context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flat;

/// Taxonomy: descendant and/or ancestor closure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tree;

/// Semantic net: tags reachable along edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct Graph;

impl Structure for Flat {
    fn context_of<T>(anchor: &T, _params: &FragmentationParameter) -> KbResult<Vec<T>>
    where
        T: TxSemanticTag + SnSemanticTag,
    {
        Ok(vec![anchor.clone()])
    }

    fn copy_relations<T>(_selected: &[T], _into: &InMemoStSet) -> KbResult<()>
    where
        T: TxSemanticTag + SnSemanticTag,
    {
        Ok(())
    }
}

impl Structure for Tree {
    fn context_of<T>(anchor: &T, params: &FragmentationParameter) -> KbResult<Vec<T>>
    where
        T: TxSemanticTag + SnSemanticTag,
    {
        taxonomy_context(anchor, params)
    }

    fn copy_relations<T>(selected: &[T], into: &InMemoStSet) -> KbResult<()>
    where
        T: TxSemanticTag + SnSemanticTag,
    {
        copy_taxonomy_relations(selected, into)
    }
}

impl Structure for Graph {
    fn context_of<T>(anchor: &T, params: &FragmentationParameter) -> KbResult<Vec<T>>
    where
        T: TxSemanticTag + SnSemanticTag,
    {
        net_context(anchor, params)
    }

    fn copy_relations<T>(selected: &[T], into: &InMemoStSet) -> KbResult<()>
    where
        T: TxSemanticTag + SnSemanticTag,
    {
        copy_net_relations(selected, into)
    }
}

/// Descendants (forward), ancestors (backward) or both of `anchor`.
///
/// `Both` is the union of the two closures; siblings and cousins of the
/// anchor stay out.
pub fn taxonomy_context<T: TxSemanticTag>(anchor: &T, params: &FragmentationParameter) -> KbResult<Vec<T>> {
    let mut reach = Reach::new();
    reach.visit(anchor.clone(), 0)?;
    if matches!(params.direction, Direction::Forward | Direction::Both) {
        reach.absorb(breadth_first(anchor.clone(), params.depth, |tag: &T| tag.sub_tags())?)?;
    }
    if matches!(params.direction, Direction::Backward | Direction::Both) {
        reach.absorb(breadth_first(anchor.clone(), params.depth, |tag: &T| {
            Ok(tag.super_tag()?.into_iter().collect())
        })?)?;
    }
    Ok(reach.into_tags(params.include_anchor))
}

/// Tags reachable from `anchor` along the configured predicates.
pub fn net_context<T: SnSemanticTag>(anchor: &T, params: &FragmentationParameter) -> KbResult<Vec<T>> {
    let reach = breadth_first(anchor.clone(), params.depth, |tag: &T| {
        let mut next = Vec::new();
        if matches!(params.direction, Direction::Forward | Direction::Both) {
            for predicate in params.predicates_or(tag, |t| t.predicate_names())? {
                next.extend(tag.target_tags(&predicate)?);
            }
        }
        if matches!(params.direction, Direction::Backward | Direction::Both) {
            for predicate in params.predicates_or(tag, |t| t.incoming_predicate_names())? {
                next.extend(tag.source_tags(&predicate)?);
            }
        }
        Ok(next)
    })?;
    Ok(reach.into_tags(params.include_anchor))
}

/// Re-create super tag links among `selected` inside `into`.
pub fn copy_taxonomy_relations<T: TxSemanticTag>(selected: &[T], into: &InMemoStSet) -> KbResult<()> {
    for tag in selected {
        let Some(parent) = tag.super_tag()? else {
            continue;
        };
        let Some(parent_copy) = counterpart(into, &parent)? else {
            continue;
        };
        let child_copy = counterpart(into, tag)?
            .ok_or_else(|| KbError::NotFound(format!("copy of {:?}", tag.si().ok())))?;
        child_copy.move_to(Some(&parent_copy))?;
    }
    Ok(())
}

/// Re-create the edges among `selected` inside `into`.
pub fn copy_net_relations<T: SnSemanticTag>(selected: &[T], into: &InMemoStSet) -> KbResult<()> {
    for source in selected {
        let Some(source_copy) = counterpart(into, source)? else {
            continue;
        };
        for predicate in source.predicate_names()? {
            for target in source.target_tags(&predicate)? {
                if let Some(target_copy) = counterpart(into, &target)? {
                    source_copy.set_predicate(&predicate, &target_copy)?;
                }
            }
        }
    }
    Ok(())
}

/// Build the derived set for `anchors`; backs [`StSet::fragment`] and
/// [`StSet::contextualize`].
pub(crate) fn assemble<S>(
    set: &S,
    anchors: &[&dyn SemanticTag],
    params: &FragmentationParameter,
) -> KbResult<InMemoStSet>
where
    S: StSet + ?Sized,
{
    let mut selections = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        let sis = anchor.si()?;
        let refs: Vec<&str> = sis.iter().map(String::as_str).collect();
        let selection = match set.get_semantic_tag(&refs)? {
            Some(member) => set.context_of(&member, params)?,
            None => Vec::new(),
        };
        selections.push(selection);
    }

    let selected = combine(selections, params.combine)?;
    let result = InMemoStSet::standalone(set.tag_type());
    for tag in &selected {
        result.merge(tag)?;
    }
    set.copy_relations(&selected, &result)?;

    tracing::debug!(
        target: "kb::fragment",
        anchors = anchors.len(),
        selected = selected.len(),
        "assembled context"
    );
    Ok(result)
}

fn combine<T: SemanticTag>(selections: Vec<Vec<T>>, mode: CombineMode) -> KbResult<Vec<T>> {
    match mode {
        CombineMode::Union => {
            let mut all = Reach::new();
            for tag in selections.into_iter().flatten() {
                all.visit(tag, 0)?;
            }
            Ok(all.into_tags(true))
        }
        CombineMode::Intersection => {
            let mut iter = selections.into_iter();
            let Some(first) = iter.next() else {
                return Ok(Vec::new());
            };
            let others = iter
                .map(|selection| selection.iter().map(|t| t.si()).collect::<KbResult<Vec<_>>>())
                .collect::<KbResult<Vec<_>>>()?;

            let mut kept = Vec::new();
            for tag in first {
                let sis = tag.si()?;
                let everywhere = others
                    .iter()
                    .all(|selection| selection.iter().any(|other| sis_intersect(other, &sis)));
                if everywhere {
                    kept.push(tag);
                }
            }
            Ok(kept)
        }
    }
}

fn counterpart<T: SemanticTag>(
    into: &InMemoStSet,
    tag: &T,
) -> KbResult<Option<<InMemoStSet as StSet>::Tag>> {
    let sis = tag.si()?;
    let refs: Vec<&str> = sis.iter().map(String::as_str).collect();
    into.get_semantic_tag(&refs)
}
