//! Front door accepting watch requests over HTTP
//!
//! Requests are published to the request topic and answered with the facets the workers post to
//! the response topic. Those are received by a feed job which writes them into a replay log shared
//! with all request handlers.

mod handler;
mod metrics;
mod options;
mod server;
mod services;

use async_trait::async_trait;
use domain::WatchMessage;
use harness::{DummyResourceHandleProvider, Heart, Module, RedisCommunicationFactory, ServiceRunner};
use library::communication::collector::ReplayCollector;
use library::communication::event::{ConsumerGroupDescriptor, TopicLocation};
use library::communication::CommunicationFactory;
use library::scheduling::JobScheduler;
use library::{schedule, BoxedError};
use server::ServerJob;
use services::{CollectorFeedJob, CollectorFeedService};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub use handler::{HandlerError, WatchRequestHandler};
pub use metrics::{MetricsSnapshot, RequestMetrics};
pub use options::Options;
pub use services::CollectorFeed;

/// Module implementation
pub struct Api {
    options: Options,
    metrics: Option<Arc<RequestMetrics>>,
}

impl Api {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self {
            options,
            metrics: None,
        }
    }

    fn group(&self) -> ConsumerGroupDescriptor {
        ConsumerGroupDescriptor::new(
            format!("api-{}", self.options.queueing.id),
            TopicLocation::Tail,
        )
    }
}

#[async_trait]
impl Module for Api {
    #[instrument(skip(self, scheduler))]
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let collector = ReplayCollector::<WatchMessage>::new(self.options.retention);

        let group = self.group();
        let liveness = scheduler.liveness_flag(group.identifier()).await;
        let runner = ServiceRunner::<CollectorFeedService>::new(
            self.options.redis.url.clone(),
            self.options.topics.responses(),
            group,
            self.options.queueing.id.clone(),
            collector.clone(),
            liveness,
        );
        let feed_job = CollectorFeedJob::new(runner, collector.clone());

        let factory = RedisCommunicationFactory::new(
            self.options.redis.url.clone(),
            DummyResourceHandleProvider::new(),
        );
        let handler = WatchRequestHandler::new(
            factory.message_publisher(),
            collector,
            self.options.topics.requests(),
            self.options.expected_facets.iter().copied(),
            self.options.deadline,
        )
        .with_refresh_interval(self.options.refresh_interval);

        self.metrics = Some(handler.metrics());
        let server_job = ServerJob::new(self.options.port, Arc::new(handler));

        debug!("Scheduling jobs");
        schedule!(scheduler, { feed_job, server_job });

        Ok(Some(Heart::without_heart_stone()))
    }

    async fn pre_shutdown(&mut self, _scheduler: &JobScheduler) {
        if let Some(metrics) = &self.metrics {
            let snapshot = metrics.snapshot();
            info!(
                produced = snapshot.produced,
                collected = snapshot.collected,
                lost = snapshot.lost,
                active = snapshot.active,
                "Request statistics"
            );
        }
    }
}
