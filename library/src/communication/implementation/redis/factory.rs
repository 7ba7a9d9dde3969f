use crate::BoxedError;
use async_trait::async_trait;
use redis::aio::ConnectionLike;

/// Variant of redis connection requested from a [`RedisFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisConnectionVariant {
    /// Dedicated connection which may be used for blocking commands like `XREADGROUP`
    Owned,
    /// Connection shared between multiple users, must not be used for blocking commands
    Multiplexed,
}

/// Factory for redis connections of different [variants](RedisConnectionVariant)
#[async_trait]
pub trait RedisFactory {
    /// Connection type handed out by the factory
    type Connection: ConnectionLike + Send + Sync + 'static;

    /// Establishes a new connection or clones a shared one
    async fn connection(
        &self,
        variant: RedisConnectionVariant,
    ) -> Result<Self::Connection, BoxedError>;
}
