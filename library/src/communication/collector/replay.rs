use super::{Classify, Collection, CollectorError};
use crate::communication::event::KnownMessage;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

struct Retained {
    received_at: Instant,
    key: String,
}

/// Sequence number and message
type Indexed<V> = (u64, Arc<KnownMessage<V>>);

struct LogState<V> {
    /// Arrival order of retained messages, used for eviction
    order: VecDeque<Retained>,
    /// Retained messages per correlation key in arrival order
    by_key: HashMap<String, VecDeque<Indexed<V>>>,
    /// Sequence number of the oldest retained entry
    first_sequence: u64,
    completed: bool,
}

impl<V> LogState<V> {
    fn next_sequence(&self) -> u64 {
        self.first_sequence + self.order.len() as u64
    }

    fn append(&mut self, message: KnownMessage<V>, now: Instant) {
        let sequence = self.next_sequence();

        self.order.push_back(Retained {
            received_at: now,
            key: message.key.clone(),
        });
        self.by_key
            .entry(message.key.clone())
            .or_default()
            .push_back((sequence, Arc::new(message)));
    }

    /// Messages for a key starting at a sequence number
    fn matching(&self, key: &str, from: u64) -> Vec<Arc<KnownMessage<V>>> {
        self.by_key
            .get(key)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|(sequence, _)| *sequence >= from)
                    .map(|(_, message)| message.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn evict_older_than(&mut self, retention: Duration, now: Instant) {
        while let Some(entry) = self.order.front() {
            if now.duration_since(entry.received_at) < retention {
                break;
            }

            if let Some(retained) = self.order.pop_front() {
                let drained = match self.by_key.get_mut(&retained.key) {
                    Some(messages) => {
                        messages.pop_front();
                        messages.is_empty()
                    }
                    None => false,
                };

                if drained {
                    self.by_key.remove(&retained.key);
                }
            }

            self.first_sequence += 1;
        }
    }
}

struct Shared<V> {
    log: RwLock<LogState<V>>,
    retention: Duration,
    signal: watch::Sender<u64>,
    signal_rx: watch::Receiver<u64>,
}

/// Retention bounded, append-only log of received messages with keyed collection
pub struct ReplayCollector<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for ReplayCollector<V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V> ReplayCollector<V>
where
    V: Classify + Clone + Send + Sync,
{
    /// Creates an empty log retaining messages for the given duration
    pub fn new(retention: Duration) -> Self {
        let (signal, signal_rx) = watch::channel(0);

        Self {
            shared: Arc::new(Shared {
                log: RwLock::new(LogState {
                    order: VecDeque::new(),
                    by_key: HashMap::new(),
                    first_sequence: 0,
                    completed: false,
                }),
                retention,
                signal,
                signal_rx,
            }),
        }
    }

    /// Appends a message and wakes all waiting collections
    ///
    /// Messages published after [`complete`](Self::complete) are discarded and `false` is returned.
    pub async fn publish(&self, message: KnownMessage<V>) -> bool {
        {
            let mut log = self.shared.log.write().await;

            if log.completed {
                warn!(key = %message.key, "Discarding message received after completion");
                return false;
            }

            let now = Instant::now();
            log.evict_older_than(self.shared.retention, now);
            log.append(message, now);

            trace!(retained = log.order.len(), "Appended message to replay log");
        }

        self.shared.signal.send_modify(|version| *version += 1);
        true
    }

    /// Marks the feeding stream as ended
    ///
    /// Running collections return what they gathered so far, new ones fail immediately.
    pub async fn complete(&self) {
        self.shared.log.write().await.completed = true;
        self.shared.signal.send_modify(|version| *version += 1);
        debug!("Replay log completed");
    }

    /// Whether [`complete`](Self::complete) has been called
    pub async fn is_completed(&self) -> bool {
        self.shared.log.read().await.completed
    }

    /// Number of retained messages
    pub async fn retained(&self) -> usize {
        self.shared.log.read().await.order.len()
    }

    /// Collects the first message of each expected kind for a correlation key
    ///
    /// Considers retained messages as well as those arriving until all kinds have been seen,
    /// the deadline passes or the log completes. Running into the deadline is not an error,
    /// the returned [`Collection`] then holds whatever arrived in time.
    pub async fn collect(
        &self,
        key: &str,
        expected: &HashSet<V::Kind>,
        deadline: Duration,
    ) -> Result<Collection<V>, CollectorError> {
        let started = Instant::now();
        let deadline_at = started + deadline;

        // Subscribe before the first scan so appends in between are not missed
        let mut signal = self.shared.signal_rx.clone();

        let mut cursor = {
            let log = self.shared.log.read().await;
            if log.completed {
                return Err(CollectorError::Completed);
            }
            log.first_sequence
        };

        let mut collection = Collection::new(key, expected.clone());
        let sleep = sleep_until(deadline_at);
        tokio::pin!(sleep);

        loop {
            // Only messages of this key are copied out, the lock is never held while offering
            let (arrived, completed) = {
                let log = self.shared.log.read().await;
                let arrived = log.matching(key, cursor);
                cursor = log.next_sequence();
                (arrived, log.completed)
            };

            for message in arrived {
                if let Some(kind) = message.value.kind() {
                    collection.offer(kind, &message);
                }
            }

            if collection.is_complete() || completed {
                break;
            }

            tokio::select! {
                changed = signal.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = &mut sleep => break,
            }
        }

        collection.set_elapsed(started.elapsed());
        trace!(key, collected = collection.len(), elapsed = ?collection.elapsed(), "Collection finished");

        Ok(collection)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::communication::collector::CollectionOutcome;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    enum Part {
        Request,
        Left(u32),
        Right(u32),
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Side {
        Left,
        Right,
    }

    impl Classify for Part {
        type Kind = Side;

        fn kind(&self) -> Option<Side> {
            match self {
                Part::Request => None,
                Part::Left(_) => Some(Side::Left),
                Part::Right(_) => Some(Side::Right),
            }
        }
    }

    fn both() -> HashSet<Side> {
        [Side::Left, Side::Right].into_iter().collect()
    }

    fn message(key: &str, part: Part) -> KnownMessage<Part> {
        KnownMessage {
            key: key.into(),
            trace_id: None,
            value: part,
        }
    }

    #[tokio::test]
    async fn keep_the_first_message_of_each_kind() {
        let collector = ReplayCollector::new(Duration::from_secs(60));
        collector.publish(message("k", Part::Left(1))).await;
        collector.publish(message("k", Part::Left(2))).await;
        collector.publish(message("k", Part::Request)).await;
        collector.publish(message("other", Part::Right(9))).await;
        collector.publish(message("k", Part::Right(3))).await;

        let collection = collector
            .collect("k", &both(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(collection.outcome(), CollectionOutcome::Complete);
        assert_eq!(collection.get(&Side::Left).unwrap().value, Part::Left(1));
        assert_eq!(collection.get(&Side::Right).unwrap().value, Part::Right(3));
    }

    #[tokio::test]
    async fn wait_for_messages_arriving_later() {
        let collector = ReplayCollector::new(Duration::from_secs(60));
        collector.publish(message("k", Part::Right(1))).await;

        let feeder = collector.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            feeder.publish(message("k", Part::Left(2))).await;
        });

        let collection = collector
            .collect("k", &both(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(collection.is_complete());
        assert_eq!(collection.received_key(), Some("k"));
        assert!(collection.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn return_empty_after_the_deadline() {
        let collector = ReplayCollector::<Part>::new(Duration::from_secs(60));
        let deadline = Duration::from_millis(100);

        let collection = collector.collect("k", &both(), deadline).await.unwrap();

        assert_eq!(collection.outcome(), CollectionOutcome::Empty);
        assert_eq!(collection.received_key(), None);
        assert!(collection.elapsed() >= deadline);
        assert!(collection.elapsed() < deadline + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn return_partial_results_after_the_deadline() {
        let collector = ReplayCollector::new(Duration::from_secs(60));
        collector.publish(message("k", Part::Left(1))).await;

        let collection = collector
            .collect("k", &both(), Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(
            collection.outcome(),
            CollectionOutcome::Partial {
                missing: vec![Side::Right]
            }
        );
    }

    #[tokio::test]
    async fn serve_concurrent_keys_independently() {
        let collector = ReplayCollector::new(Duration::from_secs(60));

        let waiters: Vec<_> = (0..8)
            .map(|i| {
                let collector = collector.clone();
                tokio::spawn(async move {
                    collector
                        .collect(&format!("k{}", i), &both(), Duration::from_secs(5))
                        .await
                })
            })
            .collect();

        // Publish in reverse order and interleaved across keys
        for i in (0..8u32).rev() {
            collector.publish(message(&format!("k{}", i), Part::Right(i))).await;
        }
        for i in 0..8u32 {
            collector.publish(message(&format!("k{}", i), Part::Left(i))).await;
        }

        for (i, waiter) in waiters.into_iter().enumerate() {
            let collection = waiter.await.unwrap().unwrap();
            assert!(collection.is_complete());
            assert_eq!(collection.get(&Side::Left).unwrap().value, Part::Left(i as u32));
        }
    }

    #[tokio::test]
    async fn finish_running_and_reject_new_collections_after_completion() {
        let collector = ReplayCollector::new(Duration::from_secs(60));
        collector.publish(message("k", Part::Left(1))).await;

        let waiter = {
            let collector = collector.clone();
            tokio::spawn(async move { collector.collect("k", &both(), Duration::from_secs(30)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        collector.complete().await;

        let collection = waiter.await.unwrap().unwrap();
        assert_eq!(collection.len(), 1);

        assert_eq!(
            collector.collect("k", &both(), Duration::from_secs(1)).await.err(),
            Some(CollectorError::Completed)
        );
        assert!(!collector.publish(message("k", Part::Right(2))).await);
    }

    #[tokio::test]
    async fn evict_messages_beyond_retention() {
        let collector = ReplayCollector::new(Duration::from_millis(20));
        collector.publish(message("old", Part::Left(1))).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        collector.publish(message("new", Part::Left(2))).await;

        assert_eq!(collector.retained().await, 1);

        let collection = collector
            .collect("old", &both(), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn collect_again_after_a_key_has_been_evicted() {
        let collector = ReplayCollector::new(Duration::from_millis(20));
        collector.publish(message("k", Part::Left(1))).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        collector.publish(message("k", Part::Right(2))).await;

        let collection = collector
            .collect("k", &both(), Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(collector.retained().await, 1);
        assert_eq!(
            collection.outcome(),
            CollectionOutcome::Partial {
                missing: vec![Side::Left]
            }
        );
    }

    #[tokio::test]
    async fn keep_accepting_messages_while_many_collections_wait() {
        let collector = ReplayCollector::new(Duration::from_secs(60));
        for i in 0..20_000u32 {
            collector.publish(message(&format!("noise{}", i), Part::Left(i))).await;
        }

        let waiters: Vec<_> = (0..200)
            .map(|i| {
                let collector = collector.clone();
                tokio::spawn(async move {
                    collector
                        .collect(&format!("k{}", i), &both(), Duration::from_secs(10))
                        .await
                })
            })
            .collect();

        let started = Instant::now();
        for i in 0..200u32 {
            collector.publish(message(&format!("k{}", i), Part::Left(i))).await;
            collector.publish(message(&format!("k{}", i), Part::Right(i))).await;
        }

        for waiter in waiters {
            assert!(waiter.await.unwrap().unwrap().is_complete());
        }
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(collector.retained().await, 20_400);
    }
}
