use super::Classify;
use crate::communication::event::KnownMessage;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Result state of a [`Collection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome<K> {
    /// One message of every expected kind has been collected
    Complete,
    /// Some but not all kinds have been collected
    Partial {
        /// Kinds that did not arrive in time
        missing: Vec<K>,
    },
    /// Nothing has been collected
    Empty,
}

/// Messages collected for one correlation key
#[derive(Debug)]
pub struct Collection<V: Classify> {
    key: String,
    expected: HashSet<V::Kind>,
    messages: HashMap<V::Kind, KnownMessage<V>>,
    received_key: Option<String>,
    elapsed: Duration,
}

impl<V: Classify + Clone> Collection<V> {
    pub(super) fn new(key: &str, expected: HashSet<V::Kind>) -> Self {
        Self {
            key: key.to_owned(),
            expected,
            messages: HashMap::new(),
            received_key: None,
            elapsed: Duration::default(),
        }
    }

    /// Adds a message unless one of the same kind has been collected already
    pub(super) fn offer(&mut self, kind: V::Kind, message: &KnownMessage<V>) {
        if !self.expected.contains(&kind) {
            return;
        }

        if self.received_key.is_none() {
            self.received_key = Some(message.key.clone());
        }

        self.messages.entry(kind).or_insert_with(|| message.clone());
    }

    pub(super) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// Correlation key that was requested
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Correlation key of the first collected message
    pub fn received_key(&self) -> Option<&str> {
        self.received_key.as_deref()
    }

    /// Whether all expected kinds have been collected
    pub fn is_complete(&self) -> bool {
        self.expected
            .iter()
            .all(|kind| self.messages.contains_key(kind))
    }

    /// Kinds that have not been collected
    pub fn missing(&self) -> Vec<V::Kind> {
        self.expected
            .iter()
            .filter(|kind| !self.messages.contains_key(*kind))
            .cloned()
            .collect()
    }

    /// Summary of what has been collected
    pub fn outcome(&self) -> CollectionOutcome<V::Kind> {
        if self.messages.is_empty() {
            CollectionOutcome::Empty
        } else if self.is_complete() {
            CollectionOutcome::Complete
        } else {
            CollectionOutcome::Partial {
                missing: self.missing(),
            }
        }
    }

    /// Number of collected messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been collected
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Collected message of a given kind
    pub fn get(&self, kind: &V::Kind) -> Option<&KnownMessage<V>> {
        self.messages.get(kind)
    }

    /// Removes and returns the message of a given kind
    pub fn take(&mut self, kind: &V::Kind) -> Option<KnownMessage<V>> {
        self.messages.remove(kind)
    }

    /// Time spent collecting
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
