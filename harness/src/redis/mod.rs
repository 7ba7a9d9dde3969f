mod factory;
mod resource;

pub use factory::{
    BoxedResourceHandleProvider, DummyResourceHandleProvider, MonitoredRedisFactory,
    RedisCommunicationFactory, ResourceHandleProvider,
};
pub use resource::{AnyConnection, RedisResource};
