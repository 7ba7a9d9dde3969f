use super::job_manager::{JobManagerChannels, ResourceStatus};
use super::{Job, JobManager, LivenessFlag};
use crate::helpers::Backoff;
use futures::channel::mpsc::Receiver;
use futures::future::{abortable, AbortHandle};
use futures::lock::Mutex;
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

static INSTANCE_COUNTER: AtomicUsize = AtomicUsize::new(0);

type StatusMap = Arc<Mutex<HashMap<String, JobStatus>>>;

/// State in which a job currently resides
#[derive(Debug)]
pub enum JobStatus {
    /// Job is ready to fulfill its contract. Contains the graceful termination handle if supported.
    Ready(Option<watch::Sender<bool>>),
    /// Job has never started and is in the process of getting ready
    Startup,
    /// Job was restarted due to a lost dependency or crash and is getting ready
    Restarting,
    /// Job has exited with an error and is waiting before it retries
    CrashLoopBackOff,
    /// Job has exceeded its crash loop limit
    Terminated,
    /// Job has exited cleanly
    Finished,
}

impl JobStatus {
    fn is_gracefully_terminatable(&self) -> bool {
        matches!(*self, JobStatus::Ready(Some(_)))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            JobStatus::Ready(_) => write!(f, "Ready"),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl PartialEq for JobStatus {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Eq for JobStatus {}

/// Job lifecycle handler
#[derive(Default, Clone)]
pub struct JobScheduler {
    pub(super) status: StatusMap,
    pub(super) liveness: Arc<Mutex<HashMap<String, LivenessFlag>>>,
    termination_handles: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl JobScheduler {
    /// Registers a named liveness flag that is reported by the status server
    ///
    /// The flag starts out as not alive. Registering the same name twice returns the existing flag.
    pub async fn liveness_flag(&self, name: &str) -> LivenessFlag {
        self.liveness
            .lock()
            .await
            .entry(name.to_owned())
            .or_default()
            .clone()
    }

    /// Current status of a job, if it is known to the scheduler
    pub async fn job_status(&self, name: &str) -> Option<String> {
        self.status.lock().await.get(name).map(ToString::to_string)
    }

    async fn change_status(status_map: &StatusMap, job_name: &str, status: JobStatus) {
        info!(job = job_name, status = %status, "Job status changed");
        status_map.lock().await.insert(job_name.to_owned(), status);
    }

    fn watch_dependencies(mut rx: Receiver<ResourceStatus>, abort_handle: AbortHandle) -> AbortHandle {
        let (watcher, handle) = abortable(async move {
            if let Some(ResourceStatus::Dead) = rx.next().await {
                abort_handle.abort();
            }
        });

        tokio::spawn(watcher);
        handle
    }

    fn watch_readiness(
        readiness_rx: futures::channel::oneshot::Receiver<()>,
        termination_tx: Option<watch::Sender<bool>>,
        status_map: StatusMap,
        job_name: String,
        became_ready: Arc<AtomicBool>,
    ) -> AbortHandle {
        let (watcher, handle) = abortable(async move {
            if readiness_rx.await.is_ok() {
                became_ready.store(true, Ordering::SeqCst);
                JobScheduler::change_status(&status_map, &job_name, JobStatus::Ready(termination_tx))
                    .await;
            }
        });

        tokio::spawn(watcher);
        handle
    }

    async fn manage_job_lifecycle<J: Job + Send + Sync + 'static>(job: J, status_map: StatusMap) {
        let job_name = job.name();
        let mut backoff = Backoff::default();

        JobScheduler::change_status(&status_map, &job_name, JobStatus::Startup).await;

        loop {
            let instance_id = INSTANCE_COUNTER.fetch_add(1, Ordering::SeqCst);
            let (manager, channels) = JobManager::new(instance_id);
            let JobManagerChannels {
                dependency_rx,
                readiness_rx,
                termination_tx,
            } = channels;

            let termination_tx = if job.supports_graceful_termination() {
                Some(termination_tx)
            } else {
                None
            };

            let became_ready = Arc::new(AtomicBool::new(false));
            let (instance, dependency_abort_handle) = abortable(job.execute(manager));
            let dependency_watcher =
                JobScheduler::watch_dependencies(dependency_rx, dependency_abort_handle);
            let readiness_watcher = JobScheduler::watch_readiness(
                readiness_rx,
                termination_tx,
                status_map.clone(),
                job_name.clone(),
                became_ready.clone(),
            );

            let result = instance.await;

            dependency_watcher.abort();
            readiness_watcher.abort();

            if became_ready.load(Ordering::SeqCst) {
                backoff = Backoff::default();
            }

            match result {
                Ok(Ok(())) => {
                    JobScheduler::change_status(&status_map, &job_name, JobStatus::Finished).await;
                    status_map.lock().await.remove(&job_name);
                    return;
                }
                Ok(Err(error)) => {
                    error!(job = %job_name, ?error, "Job crashed");
                    JobScheduler::change_status(&status_map, &job_name, JobStatus::CrashLoopBackOff)
                        .await;

                    match backoff.next() {
                        Some(delay) => {
                            debug!(job = %job_name, ?delay, "Backing off before restart");
                            sleep(delay).await;
                        }
                        None => {
                            error!(job = %job_name, "Job exceeded its restart limit");
                            JobScheduler::change_status(&status_map, &job_name, JobStatus::Terminated)
                                .await;
                            return;
                        }
                    }
                }
                Err(_) => warn!(job = %job_name, "Job lost a resource it depends on"),
            }

            JobScheduler::change_status(&status_map, &job_name, JobStatus::Restarting).await;
        }
    }

    /// Starts managing a new job
    ///
    /// The job is restarted when it crashes or a resource it depends on dies.
    pub async fn spawn_job<J: Job + Send + Sync + 'static>(&self, job: J) {
        let status_map = self.status.clone();
        let termination_handles = self.termination_handles.clone();
        let job_name = job.name();

        let (lifecycle, termination_handle) =
            abortable(JobScheduler::manage_job_lifecycle(job, status_map.clone()));

        termination_handles
            .lock()
            .await
            .insert(job_name.clone(), termination_handle);

        tokio::spawn(async move {
            if lifecycle.await.is_err() {
                JobScheduler::change_status(&status_map, &job_name, JobStatus::Terminated).await;
                status_map.lock().await.remove(&job_name);
            }

            termination_handles.lock().await.remove(&job_name);
        });
    }

    /// Asks all jobs to terminate, waiting up to `grace_period` for those that support it
    pub async fn terminate_jobs(&self, grace_period: Duration) {
        {
            let status = self.status.lock().await;
            let handles = self.termination_handles.lock().await;

            for (job_name, job_status) in status.iter() {
                match job_status {
                    JobStatus::Ready(Some(graceful_handle)) => {
                        graceful_handle.send(true).ok();
                    }
                    _ => {
                        if let Some(handle) = handles.get(job_name) {
                            handle.abort();
                        }
                    }
                }
            }
        }

        let deadline = Instant::now() + grace_period;
        while Instant::now() < deadline {
            let pending = {
                let handles = self.termination_handles.lock().await;
                let status = self.status.lock().await;

                handles.keys().any(|job_name| {
                    status
                        .get(job_name)
                        .map(JobStatus::is_gracefully_terminatable)
                        .unwrap_or(false)
                })
            };

            if !pending {
                break;
            }

            sleep(Duration::from_millis(10)).await;
        }

        for (job_name, handle) in self.termination_handles.lock().await.iter() {
            warn!(job = %job_name, "Job ignored graceful termination request");
            handle.abort();
        }
    }
}

/// Spawns a list of jobs on a scheduler
#[macro_export]
macro_rules! schedule {
    ($scheduler:expr, { $($job:expr),+ $(,)? }) => {
        $(
            $scheduler.spawn_job($job).await;
        )+
    };
}
