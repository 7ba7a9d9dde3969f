use super::{FIELD_KEY, FIELD_PAYLOAD, FIELD_TRACE_ID, FIELD_TYPE};
use crate::communication::event::{MessageHeader, RawMessage, TopicEntry};
use crate::EmptyResult;
use async_trait::async_trait;
use redis::aio::ConnectionLike;
use redis::streams::StreamId;
use redis::AsyncCommands;

/// Redis based implementation of the [`TopicEntry`] trait
///
/// Absent fields are left empty so that the entry fails to decode and is dropped by the consume loop
/// instead of being redelivered forever.
pub struct RedisTopicEntry<C> {
    con: C,
    id: String,
    stream: String,
    group: String,
    message: RawMessage,
}

impl<C> RedisTopicEntry<C>
where
    C: ConnectionLike + Send + Sync,
{
    pub(super) fn new(con: C, entry: StreamId, stream: String, group: String) -> Self {
        let message = RawMessage {
            key: entry.get(FIELD_KEY).unwrap_or_default(),
            header: MessageHeader {
                message_type: entry.get(FIELD_TYPE).unwrap_or_default(),
                trace_id: entry.get(FIELD_TRACE_ID),
            },
            payload: entry.get(FIELD_PAYLOAD).unwrap_or_default(),
        };

        Self {
            con,
            id: entry.id,
            stream,
            group,
            message,
        }
    }
}

#[async_trait]
impl<C> TopicEntry for RedisTopicEntry<C>
where
    C: ConnectionLike + Send + Sync,
{
    fn message(&self) -> &RawMessage {
        &self.message
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.con
            .xack::<_, _, _, ()>(&self.stream, &self.group, &[&self.id])
            .await?;

        Ok(())
    }
}
