use super::{KnownMessage, MessageCodec, RawMessage, TopicDescriptor};
use crate::BoxedError;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Whether the broker confirmed that a message has been stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStatus {
    /// The broker acknowledged the write
    Persisted,
    /// The message may or may not have reached the broker
    NotPersisted,
}

/// Outcome of a publish operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Key of the published message
    pub key: String,
    /// Broker confirmation
    pub status: PersistenceStatus,
    /// Broker assigned position of the message, if persisted
    pub offset: Option<String>,
}

impl DeliveryReport {
    /// Whether the broker confirmed persistence
    pub fn is_persisted(&self) -> bool {
        self.status == PersistenceStatus::Persisted
    }
}

/// Structure which allows publishing of serialized messages to a topic
#[async_trait]
pub trait RawMessagePublisher {
    /// Sends a wire message to the given topic
    async fn publish_raw(
        &self,
        topic: &TopicDescriptor,
        message: RawMessage,
    ) -> Result<DeliveryReport, BoxedError>;
}

/// Publisher for [`KnownMessage`]s
#[async_trait]
pub trait MessagePublisher {
    /// Encodes and publishes a message, returning the delivery report of the broker
    async fn publish<V: MessageCodec + Send + Sync>(
        &self,
        topic: &TopicDescriptor,
        message: &KnownMessage<V>,
    ) -> Result<DeliveryReport, BoxedError>;
}

#[async_trait]
impl<P> MessagePublisher for P
where
    P: RawMessagePublisher + Send + Sync,
{
    async fn publish<V: MessageCodec + Send + Sync>(
        &self,
        topic: &TopicDescriptor,
        message: &KnownMessage<V>,
    ) -> Result<DeliveryReport, BoxedError> {
        let raw = message.encode()?;
        let message_type = raw.header.message_type.clone();
        let report = self.publish_raw(topic, raw).await?;

        match report.status {
            PersistenceStatus::Persisted => debug!(
                key = %report.key,
                topic = topic.key(),
                %message_type,
                offset = ?report.offset,
                "Message delivered"
            ),
            PersistenceStatus::NotPersisted => warn!(
                key = %report.key,
                topic = topic.key(),
                %message_type,
                "Message was not persisted by the broker"
            ),
        }

        Ok(report)
    }
}
