//! Tag types and their specializations.

mod snapshot;

pub use snapshot::*;

use serde::{Deserialize, Serialize};

use crate::{KbError, KbResult};

/// Discriminant stored with every tag. The numeric values are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagType {
    Semantic = 0,
    Peer = 1,
    Spatial = 2,
    Time = 3,
}

impl TagType {
    /// Decode a persisted discriminant.
    pub fn from_code(code: i64) -> KbResult<Self> {
        match code {
            0 => Ok(TagType::Semantic),
            1 => Ok(TagType::Peer),
            2 => Ok(TagType::Spatial),
            3 => Ok(TagType::Time),
            other => Err(KbError::StorageFault(format!(
                "unknown tag type discriminant {}",
                other
            ))),
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    /// Default payload for a freshly created tag of this type.
    pub fn default_kind(self) -> TagKind {
        match self {
            TagType::Semantic => TagKind::Semantic,
            TagType::Peer => TagKind::Peer {
                addresses: Vec::new(),
            },
            TagType::Spatial => TagKind::Spatial {
                ewkt: String::new(),
            },
            TagType::Time => TagKind::Time(TimeSpan::always()),
        }
    }
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TagType::Semantic => "semantic",
            TagType::Peer => "peer",
            TagType::Spatial => "spatial",
            TagType::Time => "time",
        };
        write!(f, "{}", s)
    }
}

/// Type-specific payload of a tag. A tag's type never changes after
/// creation, only the payload inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagKind {
    /// Plain topic tag.
    Semantic,

    /// A peer; addresses are opaque network endpoints.
    Peer { addresses: Vec<String> },

    /// A location as extended well-known text.
    Spatial { ewkt: String },

    /// A time interval.
    Time(TimeSpan),
}

impl TagKind {
    pub fn tag_type(&self) -> TagType {
        match self {
            TagKind::Semantic => TagType::Semantic,
            TagKind::Peer { .. } => TagType::Peer,
            TagKind::Spatial { .. } => TagType::Spatial,
            TagKind::Time(_) => TagType::Time,
        }
    }

    /// Check that `next` may replace `self` on an existing tag.
    pub fn ensure_same_type(&self, next: &TagKind) -> KbResult<()> {
        if self.tag_type() == next.tag_type() {
            Ok(())
        } else {
            Err(KbError::InvalidTag(format!(
                "cannot turn a {} tag into a {} tag",
                self.tag_type(),
                next.tag_type()
            )))
        }
    }
}

/// Time interval in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: i64,
    pub duration: i64,
}

impl TimeSpan {
    /// Sentinel start: the first instant ever.
    pub const FIRST_MILLISECOND_EVER: i64 = 0;

    /// Sentinel duration: no end bound.
    pub const FOREVER: i64 = -1;

    pub fn new(start: i64, duration: i64) -> Self {
        Self { start, duration }
    }

    /// The unbounded interval.
    pub fn always() -> Self {
        Self::new(Self::FIRST_MILLISECOND_EVER, Self::FOREVER)
    }

    pub fn is_forever(&self) -> bool {
        self.duration == Self::FOREVER
    }

    /// Exclusive end, `None` when unbounded.
    pub fn end(&self) -> Option<i64> {
        if self.is_forever() {
            None
        } else {
            Some(self.start.saturating_add(self.duration))
        }
    }

    /// Whether the instant lies inside the interval.
    pub fn contains(&self, instant: i64) -> bool {
        instant >= self.start && self.end().map_or(true, |end| instant < end)
    }

    /// Stable subject identifier derived from the interval.
    pub fn subject_identifier(&self) -> String {
        format!("urn:time:{}/{}", self.start, self.duration)
    }
}
