//! Publish/subscribe primitives
//!
//! A [`TopicDescriptor`] names a topic. Producers send [`KnownMessage`]s to it using a
//! [`MessagePublisher`] and consumers join a [consumer group](ConsumerGroupDescriptor) through a
//! [`TopicProvider`]. Within a group each message is delivered to exactly one member, which allows
//! horizontal scaling of workers, while distinct groups each receive every message.
//!
//! The [`ConsumerExt::consume_topic`] loop drives a [`Consumer`] from a topic and reports whether it
//! is running through a status callback.

mod consumer;
mod consumer_group;
mod message;
mod provider;
mod publisher;
mod topic;

pub use consumer::*;
pub use consumer_group::*;
pub use message::*;
pub use provider::*;
pub use publisher::*;
pub use topic::*;
