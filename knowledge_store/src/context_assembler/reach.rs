//! Breadth-first reach state for fragmentation.

use std::collections::HashSet;

use semantic_model::KbResult;

use crate::knowledge_base::SemanticTag;

/// Tags reached from an anchor, each with its hop distance.
///
/// Tags are keyed by their first subject identifier, so a tag reached along
/// several paths is recorded once at its shortest distance.
#[derive(Debug, Clone)]
pub struct Reach<T> {
    seen: HashSet<String>,
    reached: Vec<(T, usize)>,
}

impl<T> Default for Reach<T> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            reached: Vec::new(),
        }
    }
}

impl<T: SemanticTag> Reach<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tag` at `depth`. Returns `false` if it was already reached.
    pub fn visit(&mut self, tag: T, depth: usize) -> KbResult<bool> {
        let key = tag.si()?.into_iter().next().unwrap_or_default();
        if !self.seen.insert(key) {
            return Ok(false);
        }
        self.reached.push((tag, depth));
        Ok(true)
    }

    /// Fold another walk into this one, keeping the first distance seen.
    pub fn absorb(&mut self, other: Reach<T>) -> KbResult<()> {
        for (tag, depth) in other.reached {
            self.visit(tag, depth)?;
        }
        Ok(())
    }

    /// Reached tags in visiting order, optionally without the anchor.
    pub fn into_tags(self, include_anchor: bool) -> Vec<T> {
        self.reached
            .into_iter()
            .filter(|(_, depth)| include_anchor || *depth > 0)
            .map(|(tag, _)| tag)
            .collect()
    }
}

/// Walk outward from `anchor` level by level, stopping after `max_depth`
/// hops, or at closure when `max_depth` is `None`.
pub fn breadth_first<T, F>(anchor: T, max_depth: Option<usize>, mut neighbors: F) -> KbResult<Reach<T>>
where
    T: SemanticTag + Clone,
    F: FnMut(&T) -> KbResult<Vec<T>>,
{
    let mut reach = Reach::new();
    reach.visit(anchor.clone(), 0)?;

    let mut frontier = vec![anchor];
    let mut depth = 0;
    while !frontier.is_empty() && max_depth.map_or(true, |max| depth < max) {
        depth += 1;
        let mut next = Vec::new();
        for tag in &frontier {
            for neighbor in neighbors(tag)? {
                if reach.visit(neighbor.clone(), depth)? {
                    next.push(neighbor);
                }
            }
        }
        frontier = next;
    }

    Ok(reach)
}
