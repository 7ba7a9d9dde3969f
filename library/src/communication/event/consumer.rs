use super::{
    ConsumeError, ConsumerGroupDescriptor, KnownMessage, MessageCodec, TopicDescriptor,
    TopicEntry, TopicEntryExt, TopicProvider,
};
use crate::EmptyResult;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, error, warn};

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_IDLE_TIMEOUT: Option<Duration> = None;

/// Whether a consume loop is currently processing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerLoopStatus {
    /// Subscribed and waiting for or processing messages
    Running,
    /// Exited, either due to a fatal error or cancellation
    Stopped,
}

/// Entity which may consume and process [`KnownMessage`]s
#[async_trait]
pub trait Consumer {
    /// Payload union carried on the consumed topic
    type Message: MessageCodec + Send + Sync;

    /// Processes a message. Errors are logged and leave the message unacknowledged.
    async fn consume(&self, message: KnownMessage<Self::Message>) -> EmptyResult;
}

/// Reports `Stopped` once dropped, so cancelled loops are reported as well
struct StatusGuard<'a, S: Fn(ConsumerLoopStatus)>(&'a S);

impl<'a, S: Fn(ConsumerLoopStatus)> Drop for StatusGuard<'a, S> {
    fn drop(&mut self) {
        (self.0)(ConsumerLoopStatus::Stopped);
    }
}

/// Helper functions to drive a [`Consumer`]
#[async_trait]
pub trait ConsumerExt {
    /// Consumes a topic one message at a time until a fatal error occurs
    ///
    /// Entries that fail to decode are logged and acknowledged so they are not redelivered.
    /// Successfully processed entries are acknowledged. The `status` callback is invoked with
    /// [`ConsumerLoopStatus::Running`] once subscribed and with [`ConsumerLoopStatus::Stopped`]
    /// when the loop exits for any reason.
    async fn consume_topic<Q, S>(
        &self,
        provider: &Q,
        topic: &TopicDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        status: S,
    ) -> EmptyResult
    where
        Q: TopicProvider + Send + Sync,
        S: Fn(ConsumerLoopStatus) + Send + Sync;
}

#[async_trait]
impl<C> ConsumerExt for C
where
    C: Consumer + Send + Sync,
{
    async fn consume_topic<Q, S>(
        &self,
        provider: &Q,
        topic: &TopicDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        status: S,
    ) -> EmptyResult
    where
        Q: TopicProvider + Send + Sync,
        S: Fn(ConsumerLoopStatus) + Send + Sync,
    {
        let _guard = StatusGuard(&status);

        let mut stream = provider
            .consume(topic, group, consumer, DEFAULT_BATCH_SIZE, DEFAULT_IDLE_TIMEOUT)
            .await?;

        status(ConsumerLoopStatus::Running);
        debug!(topic = topic.key(), %group, consumer, "Consume loop started");

        while let Some(item) = stream.next().await {
            let mut entry = match item {
                Ok(entry) => entry,
                Err(e) if e.is_fatal() => {
                    error!(topic = topic.key(), error = ?e, "Consume loop encountered a fatal error");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(topic = topic.key(), error = ?e, "Skipping unreadable entry");
                    continue;
                }
            };

            let message = match entry.parse::<C::Message>() {
                Ok(message) => message,
                Err(e) => {
                    warn!(
                        topic = topic.key(),
                        key = %entry.message().key,
                        error = %e,
                        "Dropping message that could not be decoded"
                    );
                    acknowledge(&mut entry, topic).await;
                    continue;
                }
            };

            let key = message.key.clone();
            match self.consume(message).await {
                Ok(()) => acknowledge(&mut entry, topic).await,
                Err(e) => warn!(topic = topic.key(), %key, error = %e, "Failed to consume message"),
            }
        }

        warn!(topic = topic.key(), "Topic stream ended");
        Err(ConsumeError::Closed.into())
    }
}

async fn acknowledge<E: TopicEntry + Send>(entry: &mut E, topic: &TopicDescriptor) {
    if let Err(e) = entry.acknowledge().await {
        warn!(topic = topic.key(), error = %e, "Failed to acknowledge message");
    }
}
