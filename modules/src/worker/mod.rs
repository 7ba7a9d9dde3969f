//! Resolves one facet of incoming watch requests
//!
//! Every worker joins the consumer group of its facet on the request topic, so each request is
//! handled by exactly one worker per facet. Resolved facets are published to the response topic
//! with the request key and trace id attached.

mod options;
mod providers;
mod resolvers;
mod services;

use async_trait::async_trait;
use harness::{Heart, Module, ServiceRunner};
use library::communication::event::{ConsumerGroupDescriptor, TopicLocation};
use library::scheduling::JobScheduler;
use library::{schedule, BoxedError};
use services::{ProcessorConfig, ProcessorService};
use tracing::{debug, info, instrument};

pub use options::{ExchangeFallback, Options, ProviderOptions, ResilienceOptions};
pub use resolvers::{build_resolver, BoxedFacetResolver, FacetResolver};

/// Module implementation
pub struct Worker {
    options: Options,
}

impl Worker {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    fn group(&self) -> ConsumerGroupDescriptor {
        ConsumerGroupDescriptor::new(format!("worker-{}", self.options.facet), TopicLocation::Tail)
    }
}

#[async_trait]
impl Module for Worker {
    #[instrument(skip(self, scheduler), fields(facet = %self.options.facet))]
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let resolver = build_resolver(
            self.options.facet,
            &self.options.providers,
            &self.options.resilience,
        )?;

        let config = ProcessorConfig {
            resolver,
            response_topic: self.options.topics.responses(),
        };

        let group = self.group();
        let liveness = scheduler.liveness_flag(group.identifier()).await;

        let processor = ServiceRunner::<ProcessorService>::new(
            self.options.redis.url.clone(),
            self.options.topics.requests(),
            group,
            self.options.queueing.id.clone(),
            config,
            liveness,
        );

        debug!("Scheduling jobs");
        schedule!(scheduler, { processor });

        info!(consumer = %self.options.queueing.id, "Worker started");
        Ok(Some(Heart::without_heart_stone()))
    }
}
