//! Identity primitives: subject identifiers and issued object ids.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::{KbError, KbResult};

/// Identifier of an object held by a backend (an in-memory arena slot or an
/// information item). Never part of tag identity; that is the SI set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of fresh object ids, threaded through backend construction so id
/// assignment can be made deterministic.
pub trait IdIssuer {
    fn issue(&self) -> ObjectId;
}

/// Issues random (v4) UUIDs. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIssuer;

impl IdIssuer for RandomIssuer {
    fn issue(&self) -> ObjectId {
        ObjectId(Uuid::new_v4())
    }
}

/// Issues 1, 2, 3, ... encoded as UUIDs.
#[derive(Debug, Default)]
pub struct SequentialIssuer {
    next: AtomicU64,
}

impl SequentialIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start issuing at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.saturating_sub(1)),
        }
    }
}

impl IdIssuer for SequentialIssuer {
    fn issue(&self) -> ObjectId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        ObjectId(Uuid::from_u128(n as u128))
    }
}

/// Validate and normalize a list of subject identifiers.
///
/// Rejects an empty list and blank identifiers; duplicates collapse while the
/// first-seen order is kept.
pub fn normalize_sis<S: AsRef<str>>(sis: &[S]) -> KbResult<Vec<String>> {
    if sis.is_empty() {
        return Err(KbError::InvalidTag(
            "a tag needs at least one subject identifier".into(),
        ));
    }

    let mut out: Vec<String> = Vec::with_capacity(sis.len());
    for si in sis {
        let si = si.as_ref();
        if si.trim().is_empty() {
            return Err(KbError::InvalidTag("blank subject identifier".into()));
        }
        if !out.iter().any(|s| s == si) {
            out.push(si.to_string());
        }
    }
    Ok(out)
}

/// True iff the two identifier lists share at least one entry.
pub fn sis_intersect<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    a.iter()
        .any(|x| b.iter().any(|y| x.as_ref() == y.as_ref()))
}
