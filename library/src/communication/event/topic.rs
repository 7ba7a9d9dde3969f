/// Describes a topic and its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescriptor {
    key: String,
    limit: usize,
}

impl TopicDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(key: impl Into<String>, limit: usize) -> Self {
        Self {
            key: key.into(),
            limit,
        }
    }

    /// Value used by transports to identify the topic
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Approximate number of messages retained by the broker
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Location within a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicLocation {
    /// Oldest retained message
    Head,
    /// End of the topic, exclusive of the last message
    Tail,
}
