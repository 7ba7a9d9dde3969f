use futures::lock::Mutex;
use futures::FutureExt;
use library::scheduling::TaskResourceHandle;
use redis::aio::{Connection, ConnectionLike, MultiplexedConnection};
use redis::{Client, Cmd, Pipeline, RedisError, RedisFuture, RedisResult, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, instrument, trace, warn};

const RETRY_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// Slot holding the multiplexed connection shared by all users of a factory
pub(super) type SharedConnectionSlot = Arc<Mutex<Option<MultiplexedConnection>>>;

/// Either a dedicated or a shared redis connection
pub enum AnyConnection {
    /// Dedicated connection, safe for blocking commands
    Owned(Connection),
    /// Shared connection
    Multiplexed(MultiplexedConnection),
}

impl ConnectionLike for AnyConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            AnyConnection::Owned(con) => con.req_packed_command(cmd),
            AnyConnection::Multiplexed(con) => con.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            AnyConnection::Owned(con) => con.req_packed_commands(cmd, offset, count),
            AnyConnection::Multiplexed(con) => con.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            AnyConnection::Owned(con) => con.get_db(),
            AnyConnection::Multiplexed(con) => con.get_db(),
        }
    }
}

/// Redis connection that reports connection errors to the job depending on it
///
/// When a command fails because the connection broke, the [`TaskResourceHandle`] is notified which
/// causes the scheduler to restart the owning job with a fresh connection.
pub struct RedisResource<C: ConnectionLike> {
    con: C,
    handle: TaskResourceHandle,
    shared_slot: Option<SharedConnectionSlot>,
}

impl RedisResource<AnyConnection> {
    /// Opens a dedicated connection, retrying until the server becomes reachable
    #[instrument(skip(handle))]
    pub async fn owned(handle: TaskResourceHandle, url: &str) -> RedisResult<Self> {
        debug!("Instantiating new standalone redis client");
        let client = Client::open(url)?;

        let con = retry_connect(|| client.get_async_connection()).await;

        Ok(Self {
            con: AnyConnection::Owned(con),
            handle,
            shared_slot: None,
        })
    }

    /// Clones the multiplexed connection of the slot or establishes it if there is none
    #[instrument(skip(handle, slot))]
    pub(super) async fn shared(
        handle: TaskResourceHandle,
        url: &str,
        slot: SharedConnectionSlot,
    ) -> RedisResult<Self> {
        let client = Client::open(url)?;
        let mut current = slot.lock().await;

        let con = match &*current {
            Some(con) => {
                trace!("Reusing existing shared connection");
                con.clone()
            }
            None => {
                trace!("Creating new shared connection");
                let con = retry_connect(|| client.get_multiplexed_tokio_connection()).await;
                *current = Some(con.clone());
                con
            }
        };

        drop(current);

        Ok(Self {
            con: AnyConnection::Multiplexed(con),
            handle,
            shared_slot: Some(slot),
        })
    }
}

impl<C: ConnectionLike> RedisResource<C> {
    async fn notify(&mut self, error: &RedisError) {
        error!(?error, "Redis connection encountered error");

        if let Some(slot) = &self.shared_slot {
            trace!("Invalidating shared connection");
            *slot.lock().await = None;
        }

        self.handle.resource_died().await;
    }
}

fn is_disconnect(error: &RedisError) -> bool {
    error.is_connection_dropped()
        || error.is_io_error()
        || error.is_connection_refusal()
        || error.is_timeout()
}

impl<C: ConnectionLike + Send> ConnectionLike for RedisResource<C> {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        (async move {
            let result = self.con.req_packed_command(cmd).await;

            match &result {
                Ok(value) => trace!(?value, "Redis RECV"),
                Err(e) if is_disconnect(e) => self.notify(e).await,
                Err(_) => {}
            }

            result
        })
        .boxed()
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        (async move {
            let result = self.con.req_packed_commands(cmd, offset, count).await;

            if let Err(e) = &result {
                if is_disconnect(e) {
                    self.notify(e).await;
                }
            }

            result
        })
        .boxed()
    }

    fn get_db(&self) -> i64 {
        self.con.get_db()
    }
}

async fn retry_connect<T, F, Fut>(connect: F) -> T
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = RedisResult<T>>,
{
    let mut attempt = 0;

    loop {
        trace!(attempt, "Connecting to redis");

        match timeout(REQUEST_TIMEOUT, connect()).await {
            Ok(Ok(connection)) => return connection,
            Ok(Err(error)) => warn!(?error, "Failed to connect to redis"),
            Err(error) => warn!(?error, "Timeout connecting to redis"),
        }

        sleep(RETRY_INTERVAL).await;
        attempt += 1;
    }
}
