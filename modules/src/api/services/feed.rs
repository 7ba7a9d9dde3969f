use async_trait::async_trait;
use domain::WatchMessage;
use harness::{Service, ServiceRunner};
use library::communication::collector::ReplayCollector;
use library::communication::event::{Consumer, KnownMessage};
use library::communication::CommunicationFactory;
use library::scheduling::{Job, JobManager};
use library::EmptyResult;
use tracing::{info, trace};

/// Pushes every message received on the response topic into the [`ReplayCollector`]
pub struct CollectorFeed {
    collector: ReplayCollector<WatchMessage>,
}

impl CollectorFeed {
    /// Creates a feed writing into the given collector
    pub fn new(collector: ReplayCollector<WatchMessage>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Consumer for CollectorFeed {
    type Message = WatchMessage;

    async fn consume(&self, message: KnownMessage<WatchMessage>) -> EmptyResult {
        trace!(key = %message.key, "Feeding collector");
        self.collector.publish(message).await;
        Ok(())
    }
}

/// [`Service`] instantiating a [`CollectorFeed`]
pub struct CollectorFeedService;

impl<F> Service<F> for CollectorFeedService
where
    F: CommunicationFactory + Send + Sync,
{
    const NAME: &'static str = "CollectorFeed";

    type Instance = CollectorFeed;
    type Config = ReplayCollector<WatchMessage>;

    fn instantiate(_factory: F, collector: &Self::Config) -> Self::Instance {
        CollectorFeed::new(collector.clone())
    }
}

/// Runs the [`CollectorFeed`] and completes the collector once the job is asked to terminate
///
/// Crashes of the consume loop leave the collector open, the restarted job resumes feeding it.
pub struct CollectorFeedJob {
    runner: ServiceRunner<CollectorFeedService>,
    collector: ReplayCollector<WatchMessage>,
}

impl CollectorFeedJob {
    /// Wraps a runner feeding the given collector
    pub fn new(
        runner: ServiceRunner<CollectorFeedService>,
        collector: ReplayCollector<WatchMessage>,
    ) -> Self {
        Self { runner, collector }
    }
}

#[async_trait]
impl Job for CollectorFeedJob {
    const NAME: &'static str = "CollectorFeed";
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let result = self.runner.execute(manager.clone()).await;

        if manager.termination_signal_triggered() {
            info!("Response feed terminated, completing collector");
            self.collector.complete().await;
        }

        result
    }
}
