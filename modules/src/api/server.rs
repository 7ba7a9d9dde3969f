use super::handler::WatchRequestHandler;
use async_trait::async_trait;
use domain::WatchRequest;
use library::communication::event::MessagePublisher;
use library::scheduling::{Job, JobManager};
use library::EmptyResult;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use warp::http::StatusCode;
use warp::reply::{json, with_status};
use warp::{Filter, Reply};

/// Serves the watch face endpoint over HTTP
pub struct ServerJob<P> {
    port: u16,
    handler: Arc<WatchRequestHandler<P>>,
}

impl<P> ServerJob<P> {
    /// Creates a job listening on all interfaces at the given port
    pub fn new(port: u16, handler: Arc<WatchRequestHandler<P>>) -> Self {
        Self { port, handler }
    }
}

async fn answer<P>(
    request: WatchRequest,
    handler: Arc<WatchRequestHandler<P>>,
) -> Result<impl Reply, Infallible>
where
    P: MessagePublisher + Send + Sync,
{
    let reply = match handler.handle(request).await {
        Ok(response) => with_status(json(&response), StatusCode::OK),
        Err(error) => with_status(json(&error.response()), error.status_code()),
    };

    Ok(reply)
}

pub(super) fn routes<P>(
    handler: Arc<WatchRequestHandler<P>>,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone
where
    P: MessagePublisher + Send + Sync + 'static,
{
    let handler = warp::any().map(move || handler.clone());

    warp::get()
        .and(warp::path!("api" / "v2" / "YAFace"))
        .and(warp::query::<WatchRequest>())
        .and(handler)
        .and_then(answer::<P>)
        .with(warp::trace::named("watch_face"))
}

#[async_trait]
impl<P> Job for ServerJob<P>
where
    P: MessagePublisher + Send + Sync + 'static,
{
    const NAME: &'static str = module_path!();
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let source_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let (addr, server) = warp::serve(routes(self.handler.clone()))
            .try_bind_with_graceful_shutdown(source_addr, manager.termination_signal())?;

        info!(?addr, "Serving watch face endpoint");
        manager.ready();
        server.await;

        Ok(())
    }
}
