use super::{RedisConnectionVariant, RedisFactory};
use super::{FIELD_KEY, FIELD_PAYLOAD, FIELD_TRACE_ID, FIELD_TYPE, STREAM_ID_NEW};
use crate::communication::event::{
    DeliveryReport, PersistenceStatus, RawMessage, RawMessagePublisher, TopicDescriptor,
};
use crate::BoxedError;
use async_trait::async_trait;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;

/// [`RawMessagePublisher`] implementation using [`XADD`](https://redis.io/commands/xadd)
///
/// A message counts as persisted once redis returned the id of the new stream entry.
#[derive(Clone)]
pub struct RedisPublisher<F: RedisFactory> {
    factory: F,
}

impl<F: RedisFactory> RedisPublisher<F> {
    /// Creates a new instance using connections from the given factory
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> RawMessagePublisher for RedisPublisher<F>
where
    F: RedisFactory + Send + Sync,
{
    async fn publish_raw(
        &self,
        topic: &TopicDescriptor,
        message: RawMessage,
    ) -> Result<DeliveryReport, BoxedError> {
        let limit = StreamMaxlen::Approx(topic.limit());

        let mut fields: Vec<(&str, &[u8])> = vec![
            (FIELD_KEY, message.key.as_bytes()),
            (FIELD_TYPE, message.header.message_type.as_bytes()),
            (FIELD_PAYLOAD, message.payload.as_slice()),
        ];

        if let Some(trace_id) = &message.header.trace_id {
            fields.push((FIELD_TRACE_ID, trace_id.as_bytes()));
        }

        let mut con = self
            .factory
            .connection(RedisConnectionVariant::Multiplexed)
            .await?;

        let id: Option<String> = con
            .xadd_maxlen(topic.key(), limit, STREAM_ID_NEW, fields.as_slice())
            .await?;

        let status = match id {
            Some(_) => PersistenceStatus::Persisted,
            None => PersistenceStatus::NotPersisted,
        };

        Ok(DeliveryReport {
            key: message.key,
            status,
            offset: id,
        })
    }
}
