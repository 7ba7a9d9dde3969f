//! In-process broker for tests
//!
//! Mirrors the semantics of the Redis transport closely enough to exercise consume loops and
//! publishers without a running broker: topics are append-only logs, consumer groups share a
//! cursor and new groups start at the head or tail of a topic. Failures can be injected.

mod broker;

pub use broker::{MemoryBroker, MemoryEntry, PublishBehaviour};
