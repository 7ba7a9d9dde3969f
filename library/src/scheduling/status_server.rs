use super::{Job, JobManager, JobScheduler, JobStatus, LivenessFlag};
use crate::EmptyResult;
use async_trait::async_trait;
use futures::lock::Mutex;
use hyper::header::CONTENT_TYPE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle phase of the process reported alongside the job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusState {
    /// Module is starting up
    Startup,
    /// Module run procedure completed
    Running,
    /// Module is shutting down
    Shutdown,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
enum Status {
    Operational,
    Degraded,
    Unrecoverable,
}

impl Status {
    fn status_code(&self) -> StatusCode {
        match *self {
            Status::Operational => StatusCode::OK,
            Status::Degraded => StatusCode::SERVICE_UNAVAILABLE,
            Status::Unrecoverable => StatusCode::GONE,
        }
    }

    fn degrade(&mut self) {
        if *self == Status::Operational {
            *self = Status::Degraded;
        }
    }
}

#[derive(Serialize)]
struct StatusReport {
    status: Status,
    state: StatusState,
    jobs: HashMap<String, String>,
    consumers: HashMap<String, bool>,
}

/// HTTP endpoint reporting the health of all jobs and liveness flags of a [`JobScheduler`]
///
/// Responds with `200` when operational, `503` when degraded and `410` when a job gave up.
#[derive(Clone)]
pub struct StatusServer {
    status: Arc<Mutex<HashMap<String, JobStatus>>>,
    liveness: Arc<Mutex<HashMap<String, LivenessFlag>>>,
    state: Arc<Mutex<StatusState>>,
    port: u16,
}

impl StatusServer {
    /// Creates a new server for the given scheduler and returns a handle to update the lifecycle state
    pub fn new(scheduler: &JobScheduler, port: u16) -> (Arc<Mutex<StatusState>>, Self) {
        let state = Arc::new(Mutex::new(StatusState::Startup));

        let server = Self {
            status: scheduler.status.clone(),
            liveness: scheduler.liveness.clone(),
            state: state.clone(),
            port,
        };

        (state, server)
    }

    async fn report(&self) -> StatusReport {
        let state = *self.state.lock().await;
        let mut status = match state {
            StatusState::Running => Status::Operational,
            _ => Status::Degraded,
        };

        let mut jobs = HashMap::new();
        for (job_name, job_status) in self.status.lock().await.iter() {
            match *job_status {
                JobStatus::Terminated => status = Status::Unrecoverable,
                JobStatus::Restarting | JobStatus::CrashLoopBackOff | JobStatus::Startup => {
                    status.degrade()
                }
                _ => {}
            }

            jobs.insert(job_name.clone(), job_status.to_string());
        }

        let mut consumers = HashMap::new();
        for (name, flag) in self.liveness.lock().await.iter() {
            let alive = flag.is_alive();
            if !alive {
                status.degrade();
            }

            consumers.insert(name.clone(), alive);
        }

        StatusReport {
            status,
            state,
            jobs,
            consumers,
        }
    }

    async fn serve(self, _request: Request<Body>) -> Result<Response<Body>, Infallible> {
        let report = self.report().await;
        let status_code = report.status.status_code();

        let response = match serde_json::to_vec(&report) {
            Ok(body) => Response::builder()
                .status(status_code)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            Err(error) => {
                warn!(?error, "Failed to serialize status report");
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::empty())
            }
        };

        Ok(response.unwrap_or_else(|_| Response::new(Body::empty())))
    }
}

#[async_trait]
impl Job for StatusServer {
    const NAME: &'static str = "status-server";
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let server = self.clone();
        let make_svc = make_service_fn(move |_conn| {
            let server = server.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |request| server.clone().serve(request)))
            }
        });

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let server = Server::try_bind(&addr)?
            .serve(make_svc)
            .with_graceful_shutdown(manager.termination_signal());

        info!(%addr, "Status server listening");
        manager.ready();
        server.await?;

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[tokio::test]
    async fn degrade_when_a_consumer_is_down() {
        let scheduler = JobScheduler::default();
        let (state, server) = StatusServer::new(&scheduler, 0);
        *state.lock().await = StatusState::Running;

        let flag = scheduler.liveness_flag("worker-location").await;
        assert_eq!(server.report().await.status, Status::Degraded);

        flag.set(true);
        assert_eq!(server.report().await.status, Status::Operational);
    }

    #[tokio::test]
    async fn report_terminated_jobs_as_unrecoverable() {
        let scheduler = JobScheduler::default();
        let (state, server) = StatusServer::new(&scheduler, 0);
        *state.lock().await = StatusState::Running;

        scheduler
            .status
            .lock()
            .await
            .insert("collector".into(), JobStatus::Terminated);

        let report = server.report().await;
        assert_eq!(report.status, Status::Unrecoverable);
        assert_eq!(report.status.status_code(), StatusCode::GONE);
        assert_eq!(report.jobs.get("collector").map(String::as_str), Some("Terminated"));
    }
}
