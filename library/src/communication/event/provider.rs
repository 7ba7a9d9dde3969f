use super::{ConsumerGroupDescriptor, KnownMessage, MessageCodec, RawMessage, TopicDescriptor};
use super::CodecError;
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

/// Failure while receiving from a topic
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// The transport can no longer deliver messages, consumption has to stop
    #[error("topic can no longer be consumed")]
    Fatal(#[source] BoxedError),
    /// A single entry could not be read, later entries are unaffected
    #[error("received malformed entry")]
    Malformed(#[source] BoxedError),
    /// The underlying stream ended
    #[error("topic stream closed")]
    Closed,
}

impl ConsumeError {
    /// Whether consumption has to stop after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ConsumeError::Malformed(_))
    }
}

/// Entry retrieved from a topic
#[async_trait]
pub trait TopicEntry {
    /// Wire message contained in the entry
    fn message(&self) -> &RawMessage;

    /// Marks the entry as processed for the consumer group
    async fn acknowledge(&mut self) -> EmptyResult;
}

/// Helpers available on all [`TopicEntry`] implementations
pub trait TopicEntryExt: TopicEntry {
    /// Decodes the contained message
    fn parse<V: MessageCodec>(&self) -> Result<KnownMessage<V>, CodecError> {
        KnownMessage::decode(self.message())
    }
}

impl<E: TopicEntry + ?Sized> TopicEntryExt for E {}

/// Allows consumption of topics using [consumer groups](ConsumerGroupDescriptor)
#[async_trait]
pub trait TopicProvider {
    /// Type of [`TopicEntry`] returned by the provider
    type Entry: TopicEntry + Send + Sync;

    /// Subscribes to a topic joining the given consumer group, creating it if required
    ///
    /// Messages which have been delivered to this consumer before but were never acknowledged are
    /// replayed first. Afterwards the stream blocks waiting for new messages.
    async fn consume(
        &self,
        topic: &TopicDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        batch_size: usize,
        idle_timeout: Option<Duration>,
    ) -> Result<BoxStream<'static, Result<Self::Entry, ConsumeError>>, BoxedError>;
}
