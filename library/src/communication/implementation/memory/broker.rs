use crate::communication::event::{
    ConsumeError, ConsumerGroupDescriptor, DeliveryReport, PersistenceStatus, RawMessage,
    RawMessagePublisher, TopicDescriptor, TopicEntry, TopicLocation, TopicProvider,
};
use crate::communication::CommunicationFactory;
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// How the broker reacts to publish requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishBehaviour {
    /// Store the message and confirm persistence
    Persist,
    /// Drop the message and report it as not persisted
    Drop,
    /// Fail the publish call with an error
    Fail,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<RawMessage>>,
    cursors: HashMap<(String, String), usize>,
    failed_topics: HashSet<String>,
}

struct Shared {
    state: Mutex<BrokerState>,
    behaviour: Mutex<PublishBehaviour>,
    signal: watch::Sender<u64>,
    signal_rx: watch::Receiver<u64>,
    acknowledged: Arc<AtomicUsize>,
}

/// In-memory implementation of [`RawMessagePublisher`] and [`TopicProvider`]
#[derive(Clone)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        let (signal, signal_rx) = watch::channel(0);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState::default()),
                behaviour: Mutex::new(PublishBehaviour::Persist),
                signal,
                signal_rx,
                acknowledged: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }
}

impl MemoryBroker {
    /// Creates an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.shared.signal.send_modify(|version| *version += 1);
    }

    /// Changes how subsequent publish calls behave
    pub fn set_publish_behaviour(&self, behaviour: PublishBehaviour) {
        *self
            .shared
            .behaviour
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = behaviour;
    }

    /// Makes every consumer of the topic receive a fatal error
    pub fn fail_topic(&self, topic: &TopicDescriptor) {
        self.state().failed_topics.insert(topic.key().to_owned());
        self.notify();
    }

    /// All messages stored in a topic so far
    pub fn messages(&self, topic: &TopicDescriptor) -> Vec<RawMessage> {
        self.state()
            .topics
            .get(topic.key())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of entries acknowledged by consumers
    pub fn acknowledged(&self) -> usize {
        self.shared.acknowledged.load(Ordering::SeqCst)
    }

    fn next_entry(
        &self,
        topic: &str,
        cursor_key: &(String, String),
    ) -> Option<Result<MemoryEntry, ConsumeError>> {
        let mut state = self.state();

        if state.failed_topics.contains(topic) {
            return Some(Err(ConsumeError::Fatal("topic failed".into())));
        }

        let position = state.cursors.get(cursor_key).copied().unwrap_or_default();
        let message = state.topics.get(topic)?.get(position)?.clone();
        state.cursors.insert(cursor_key.clone(), position + 1);

        Some(Ok(MemoryEntry {
            message,
            acknowledged: self.shared.acknowledged.clone(),
        }))
    }
}

#[async_trait]
impl RawMessagePublisher for MemoryBroker {
    async fn publish_raw(
        &self,
        topic: &TopicDescriptor,
        message: RawMessage,
    ) -> Result<DeliveryReport, BoxedError> {
        let behaviour = *self
            .shared
            .behaviour
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let key = message.key.clone();

        match behaviour {
            PublishBehaviour::Fail => Err("broker unavailable".into()),
            PublishBehaviour::Drop => Ok(DeliveryReport {
                key,
                status: PersistenceStatus::NotPersisted,
                offset: None,
            }),
            PublishBehaviour::Persist => {
                let offset = {
                    let mut state = self.state();
                    let log = state.topics.entry(topic.key().to_owned()).or_default();
                    log.push(message);
                    log.len() - 1
                };

                self.notify();

                Ok(DeliveryReport {
                    key,
                    status: PersistenceStatus::Persisted,
                    offset: Some(offset.to_string()),
                })
            }
        }
    }
}

#[async_trait]
impl TopicProvider for MemoryBroker {
    type Entry = MemoryEntry;

    async fn consume(
        &self,
        topic: &TopicDescriptor,
        group: &ConsumerGroupDescriptor,
        _consumer: &str,
        _batch_size: usize,
        _idle_timeout: Option<Duration>,
    ) -> Result<BoxStream<'static, Result<Self::Entry, ConsumeError>>, BoxedError> {
        let topic = topic.key().to_owned();
        let cursor_key = (topic.clone(), group.identifier().to_owned());

        {
            let mut state = self.state();
            let length = state.topics.get(&topic).map(Vec::len).unwrap_or_default();
            let start = match group.start() {
                TopicLocation::Head => 0,
                TopicLocation::Tail => length,
            };
            state.cursors.entry(cursor_key.clone()).or_insert(start);
        }

        let broker = self.clone();
        let signal = self.shared.signal_rx.clone();

        let stream = stream::unfold(
            (broker, topic, cursor_key, signal, false),
            |(broker, topic, cursor_key, mut signal, failed)| async move {
                if failed {
                    return None;
                }

                loop {
                    match broker.next_entry(&topic, &cursor_key) {
                        Some(Err(e)) => return Some((Err(e), (broker, topic, cursor_key, signal, true))),
                        Some(Ok(entry)) => {
                            return Some((Ok(entry), (broker, topic, cursor_key, signal, false)))
                        }
                        None => {
                            if signal.changed().await.is_err() {
                                return None;
                            }
                        }
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

impl CommunicationFactory for MemoryBroker {
    type TopicProvider = MemoryBroker;
    type MessagePublisher = MemoryBroker;

    fn topic_provider(&self) -> Self::TopicProvider {
        self.clone()
    }

    fn message_publisher(&self) -> Self::MessagePublisher {
        self.clone()
    }
}

/// Entry delivered by the [`MemoryBroker`]
pub struct MemoryEntry {
    message: RawMessage,
    acknowledged: Arc<AtomicUsize>,
}

#[async_trait]
impl TopicEntry for MemoryEntry {
    fn message(&self) -> &RawMessage {
        &self.message
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
