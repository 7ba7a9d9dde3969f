use super::{RedisConnectionVariant, RedisFactory, RedisTopicEntry};
use super::{STREAM_ID_ADDITIONS, STREAM_ID_HEAD, STREAM_ID_TAIL};
use crate::communication::event::{
    ConsumeError, ConsumerGroupDescriptor, TopicDescriptor, TopicLocation, TopicProvider,
};
use crate::BoxedError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use redis::aio::ConnectionLike;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use std::convert::TryInto;
use std::time::Duration;
use tracing::{debug, error};

/// Topic provider implementation using redis consumer groups
pub struct RedisTopicProvider<F> {
    factory: F,
}

impl<F> RedisTopicProvider<F> {
    /// Creates a new instance with a given [`RedisFactory`]
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> TopicProvider for RedisTopicProvider<F>
where
    F: RedisFactory + Clone + Send + Sync + 'static,
{
    type Entry = RedisTopicEntry<F::Connection>;

    /// Consumes a redis stream using the following steps:
    ///
    /// 1. Create the stream and/or consumer group if it does not exist
    /// 2. Stream entries from the pending entries list until it is drained
    /// 3. Wait for and stream new entries in a blocking manner
    async fn consume(
        &self,
        topic: &TopicDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        batch_size: usize,
        idle_timeout: Option<Duration>,
    ) -> Result<BoxStream<'static, Result<Self::Entry, ConsumeError>>, BoxedError> {
        let key = topic.key().to_owned();

        let mut con = self
            .factory
            .connection(RedisConnectionVariant::Owned)
            .await?;

        create_consumer_group(&mut con, &key, group).await;

        let block_duration = idle_timeout
            .map(|d| d.as_millis().try_into().unwrap_or_default())
            .unwrap_or_default();

        let read_options = StreamReadOptions::default()
            .group(group.identifier(), consumer)
            .count(batch_size)
            .block(block_duration);

        let entries = xread_stream(con, read_options, key.clone());
        let ack_connections = shared_connections(self.factory.clone());
        let group = group.identifier().to_owned();

        let stream = entries
            .zip(ack_connections)
            .map(move |(entry, con)| -> Result<Self::Entry, ConsumeError> {
                let entry = entry.map_err(|e| ConsumeError::Fatal(e.into()))?;
                let con = con.map_err(ConsumeError::Fatal)?;

                Ok(RedisTopicEntry::new(con, entry, key.clone(), group.clone()))
            })
            .boxed();

        Ok(stream)
    }
}

async fn create_consumer_group<C: ConnectionLike + Send>(
    con: &mut C,
    key: &str,
    group: &ConsumerGroupDescriptor,
) {
    let start_id = match group.start() {
        TopicLocation::Head => STREAM_ID_HEAD,
        TopicLocation::Tail => STREAM_ID_TAIL,
    };

    // Fails with BUSYGROUP if the group exists which is expected
    if let Err(error) = con
        .xgroup_create_mkstream::<_, _, _, ()>(key, group.identifier(), start_id)
        .await
    {
        debug!(%error, key, %group, "Consumer group not created");
    }
}

fn shared_connections<F>(factory: F) -> BoxStream<'static, Result<F::Connection, BoxedError>>
where
    F: RedisFactory + Clone + Send + Sync + 'static,
{
    stream::repeat_with(move || {
        let factory = factory.clone();
        async move {
            factory
                .connection(RedisConnectionVariant::Multiplexed)
                .await
        }
    })
    .then(|connection| connection)
    .boxed()
}

struct ReadState<C> {
    con: C,
    options: StreamReadOptions,
    id: String,
    failed: bool,
}

fn xread_stream<C>(
    con: C,
    options: StreamReadOptions,
    key: String,
) -> BoxStream<'static, Result<StreamId, RedisError>>
where
    C: ConnectionLike + Send + Sync + 'static,
{
    let state = ReadState {
        con,
        options,
        id: STREAM_ID_HEAD.to_owned(),
        failed: false,
    };

    let batches = stream::unfold(state, move |mut state| {
        let key = key.clone();

        async move {
            if state.failed {
                return None;
            }

            let result = state
                .con
                .xread_options::<_, _, StreamReadReply>(&[&key], &[&state.id], &state.options)
                .await;

            match result {
                Ok(mut reply) => {
                    let ids = reply
                        .keys
                        .pop()
                        .map(|stream| stream.ids)
                        .unwrap_or_default();

                    // Pending entries are replayed by id until the list is drained, then switch to new entries
                    if state.id != STREAM_ID_ADDITIONS {
                        state.id = match ids.last() {
                            Some(entry) => entry.id.clone(),
                            None => STREAM_ID_ADDITIONS.to_owned(),
                        };
                    }

                    Some((Ok(ids), state))
                }
                Err(e) => {
                    error!(error = ?e, %key, "Failed to read from redis stream");
                    state.failed = true;
                    Some((Err(e), state))
                }
            }
        }
    });

    batches
        .flat_map(|batch| match batch {
            Ok(ids) => stream::iter(ids).map(Ok).boxed(),
            Err(e) => stream::once(async { Err(e) }).boxed(),
        })
        .boxed()
}
