use super::RedisCommunicationFactory;
use async_trait::async_trait;
use library::communication::event::{
    Consumer, ConsumerExt, ConsumerGroupDescriptor, ConsumerLoopStatus, TopicDescriptor,
};
use library::communication::CommunicationFactory;
use library::scheduling::{Job, JobManager, LivenessFlag};
use library::EmptyResult;
use std::sync::Arc;
use tracing::info;

/// Structure which can be instantiated with a [`CommunicationFactory`]
pub trait Service<F: CommunicationFactory + Send + Sync> {
    /// Name of the service displayed in log messages
    const NAME: &'static str;
    /// Consumer type which will be instantiated
    type Instance: Consumer + Send + Sync;
    /// Configuration type passed to the service
    type Config: Send + Sync;

    /// Creates a new consumer which may publish messages through the factory
    fn instantiate(factory: F, config: &Self::Config) -> Self::Instance;
}

/// Job running a [`Service`] as a consume loop on a redis backed topic
///
/// The liveness flag follows the state of the consume loop. A fatal consume error fails the job
/// so it will be restarted by the scheduler and resume from the pending entries of its group.
pub struct ServiceRunner<S: Service<RedisCommunicationFactory>> {
    redis_url: String,
    topic: TopicDescriptor,
    group: ConsumerGroupDescriptor,
    consumer: String,
    config: S::Config,
    liveness: LivenessFlag,
}

impl<S> ServiceRunner<S>
where
    S: Service<RedisCommunicationFactory>,
{
    /// Creates a new runner job which will connect to the given redis server and use the provided consumer group and name
    pub fn new(
        redis_url: String,
        topic: TopicDescriptor,
        group: ConsumerGroupDescriptor,
        consumer: String,
        config: S::Config,
        liveness: LivenessFlag,
    ) -> Self {
        Self {
            redis_url,
            topic,
            group,
            consumer,
            config,
            liveness,
        }
    }
}

#[async_trait]
impl<S> Job for ServiceRunner<S>
where
    S: Service<RedisCommunicationFactory> + Send + Sync,
{
    const NAME: &'static str = "ServiceRunner";
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    fn name(&self) -> String {
        format!("{}({})", Self::NAME, S::NAME)
    }

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let factory = RedisCommunicationFactory::new(self.redis_url.clone(), Arc::new(manager.clone()));
        let provider = factory.topic_provider();
        let service = S::instantiate(factory, &self.config);

        manager.ready();

        let liveness = self.liveness.clone();
        let consume = service.consume_topic(
            &provider,
            &self.topic,
            &self.group,
            &self.consumer,
            move |status| liveness.set(status == ConsumerLoopStatus::Running),
        );

        tokio::select! {
            result = consume => result,
            _ = manager.termination_signal() => {
                info!(service = S::NAME, "Consume loop terminated");
                Ok(())
            }
        }
    }
}
