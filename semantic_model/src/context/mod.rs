//! Context coordinates: the tag tuple a context point is addressed by.

use serde::{Deserialize, Serialize};

/// Direction of a communication a context point describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CommDirection {
    In = 0,
    Out = 1,
    #[default]
    InOut = 2,
    NoDirection = 3,
}

impl CommDirection {
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Decode a persisted direction; unknown codes read as `NoDirection`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => CommDirection::In,
            1 => CommDirection::Out,
            2 => CommDirection::InOut,
            _ => CommDirection::NoDirection,
        }
    }
}

/// Coordinates of a context point. Each dimension names a tag by one of its
/// subject identifiers; `None` leaves the dimension unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ContextCoordinates {
    pub topic: Option<String>,
    pub originator: Option<String>,
    pub peer: Option<String>,
    pub location: Option<String>,
    pub time: Option<String>,
    pub direction: CommDirection,
}

impl ContextCoordinates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, si: impl Into<String>) -> Self {
        self.topic = Some(si.into());
        self
    }

    pub fn with_originator(mut self, si: impl Into<String>) -> Self {
        self.originator = Some(si.into());
        self
    }

    pub fn with_peer(mut self, si: impl Into<String>) -> Self {
        self.peer = Some(si.into());
        self
    }

    pub fn with_location(mut self, si: impl Into<String>) -> Self {
        self.location = Some(si.into());
        self
    }

    pub fn with_time(mut self, si: impl Into<String>) -> Self {
        self.time = Some(si.into());
        self
    }

    pub fn with_direction(mut self, direction: CommDirection) -> Self {
        self.direction = direction;
        self
    }

    /// The tag dimensions in a fixed order: topic, originator, peer,
    /// location, time.
    pub fn dimensions(&self) -> [Option<&str>; 5] {
        [
            self.topic.as_deref(),
            self.originator.as_deref(),
            self.peer.as_deref(),
            self.location.as_deref(),
            self.time.as_deref(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_builder() {
        let cc = ContextCoordinates::new()
            .with_topic("http://topic.de")
            .with_peer("http://alice.de")
            .with_direction(CommDirection::Out);

        assert_eq!(
            cc.dimensions(),
            [Some("http://topic.de"), None, Some("http://alice.de"), None, None]
        );
        assert_eq!(cc.direction, CommDirection::Out);
    }

    #[test]
    fn test_direction_codes() {
        for d in [
            CommDirection::In,
            CommDirection::Out,
            CommDirection::InOut,
            CommDirection::NoDirection,
        ] {
            assert_eq!(CommDirection::from_code(d.code()), d);
        }
        assert_eq!(CommDirection::from_code(42), CommDirection::NoDirection);
    }
}
