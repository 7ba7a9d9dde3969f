use super::resource::{AnyConnection, RedisResource, SharedConnectionSlot};
use async_trait::async_trait;
use library::communication::implementation::redis::{
    RedisConnectionVariant, RedisFactory, RedisPublisher, RedisTopicProvider,
};
use library::communication::CommunicationFactory;
use library::scheduling::{JobManager, TaskResourceHandle};
use library::BoxedError;
use std::sync::Arc;

/// Factory to provide [`TaskResourceHandle`] instances
pub trait ResourceHandleProvider {
    /// Instantiates a new [`TaskResourceHandle`]
    fn create_handle(&self) -> TaskResourceHandle;
}

/// Dynamic dispatch version of [`ResourceHandleProvider`]
pub type BoxedResourceHandleProvider = Arc<dyn ResourceHandleProvider + Send + Sync>;

/// Creates handles using [`TaskResourceHandle::stub()`] for situations where nobody supervises the connection
pub struct DummyResourceHandleProvider {}

impl DummyResourceHandleProvider {
    /// Creates a new instance wrapped in an [`Arc`]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {})
    }
}

impl ResourceHandleProvider for DummyResourceHandleProvider {
    fn create_handle(&self) -> TaskResourceHandle {
        TaskResourceHandle::stub()
    }
}

impl ResourceHandleProvider for JobManager {
    fn create_handle(&self) -> TaskResourceHandle {
        self.create_resource_handle()
    }
}

/// [`RedisFactory`] whose connections notify the owning job when they break
#[derive(Clone)]
pub struct MonitoredRedisFactory {
    url: String,
    handle_provider: BoxedResourceHandleProvider,
    shared: SharedConnectionSlot,
}

impl MonitoredRedisFactory {
    /// Creates a new factory opening connections to the given URL
    pub fn new(url: String, handle_provider: BoxedResourceHandleProvider) -> Self {
        Self {
            url,
            handle_provider,
            shared: Default::default(),
        }
    }
}

#[async_trait]
impl RedisFactory for MonitoredRedisFactory {
    type Connection = RedisResource<AnyConnection>;

    async fn connection(
        &self,
        variant: RedisConnectionVariant,
    ) -> Result<Self::Connection, BoxedError> {
        let handle = self.handle_provider.create_handle();

        let resource = match variant {
            RedisConnectionVariant::Owned => RedisResource::owned(handle, &self.url).await?,
            RedisConnectionVariant::Multiplexed => {
                RedisResource::shared(handle, &self.url, self.shared.clone()).await?
            }
        };

        Ok(resource)
    }
}

/// Communication factory based on [`MonitoredRedisFactory`]
#[derive(Clone)]
pub struct RedisCommunicationFactory {
    factory: MonitoredRedisFactory,
}

impl RedisCommunicationFactory {
    /// Creates a new instance which connects to the given URL and reports failures using the given handle provider
    pub fn new(url: String, handle_provider: BoxedResourceHandleProvider) -> Self {
        Self {
            factory: MonitoredRedisFactory::new(url, handle_provider),
        }
    }
}

impl CommunicationFactory for RedisCommunicationFactory {
    type TopicProvider = RedisTopicProvider<MonitoredRedisFactory>;
    type MessagePublisher = RedisPublisher<MonitoredRedisFactory>;

    fn topic_provider(&self) -> Self::TopicProvider {
        RedisTopicProvider::new(self.factory.clone())
    }

    fn message_publisher(&self) -> Self::MessagePublisher {
        RedisPublisher::new(self.factory.clone())
    }
}
