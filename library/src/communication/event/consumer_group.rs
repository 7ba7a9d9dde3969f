use super::TopicLocation;
use std::fmt;

/// Definition of a consumer group
///
/// Each message of a topic is delivered to only one consumer within a group. A newly created group
/// starts at the given [`TopicLocation`], an existing group resumes where it left off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupDescriptor {
    identifier: String,
    start: TopicLocation,
}

impl ConsumerGroupDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(identifier: impl Into<String>, start: TopicLocation) -> Self {
        Self {
            identifier: identifier.into(),
            start,
        }
    }

    /// Unique identifier of the group
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Location from where a new group begins to consume
    ///
    /// Not honored if the group already exists.
    pub fn start(&self) -> TopicLocation {
        self.start
    }
}

impl fmt::Display for ConsumerGroupDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)
    }
}
