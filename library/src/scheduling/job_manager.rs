use futures::channel::mpsc::{channel, Receiver, Sender};
use futures::channel::oneshot;
use futures::SinkExt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Whether or not a resource is available
#[derive(Debug)]
pub(super) enum ResourceStatus {
    Dead,
}

pub(super) struct JobManagerChannels {
    pub dependency_rx: Receiver<ResourceStatus>,
    pub readiness_rx: oneshot::Receiver<()>,
    pub termination_tx: watch::Sender<bool>,
}

/// Handle passed to a running [`Job`](super::Job)
///
/// Provides resource monitoring, readiness reporting and the graceful termination signal.
#[derive(Clone)]
pub struct JobManager {
    instance_id: usize,
    dependency_tx: Sender<ResourceStatus>,
    readiness_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    termination_rx: watch::Receiver<bool>,
}

impl JobManager {
    pub(super) fn new(instance_id: usize) -> (Self, JobManagerChannels) {
        let (dependency_tx, dependency_rx) = channel(16);
        let (readiness_tx, readiness_rx) = oneshot::channel();
        let (termination_tx, termination_rx) = watch::channel(false);

        let manager = Self {
            instance_id,
            dependency_tx,
            readiness_tx: Arc::new(Mutex::new(Some(readiness_tx))),
            termination_rx,
        };

        let channels = JobManagerChannels {
            dependency_rx,
            readiness_rx,
            termination_tx,
        };

        (manager, channels)
    }

    /// Creates a manager that is not attached to any scheduler
    ///
    /// Useful for tests and for one-off tasks that do not need supervision.
    pub fn detached() -> Self {
        Self::new(usize::MAX).0
    }

    /// Creates a new resource handle to notify about resource state
    pub fn create_resource_handle(&self) -> TaskResourceHandle {
        TaskResourceHandle {
            instance_id: self.instance_id,
            dependency_tx: self.dependency_tx.clone(),
        }
    }

    /// Future that completes when the job should gracefully shut down
    pub fn termination_signal(&self) -> impl futures::Future<Output = ()> + Send + 'static {
        let mut rx = self.termination_rx.clone();

        async move {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    // The scheduler went away without asking for termination
                    futures::future::pending::<()>().await;
                }
            }
        }
    }

    /// Whether the job has been asked to shut down
    pub fn termination_signal_triggered(&self) -> bool {
        *self.termination_rx.borrow()
    }

    /// Reports to the scheduler that the job is ready to fulfill its contract
    pub fn ready(&self) {
        let sender = self
            .readiness_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(tx) = sender {
            tx.send(()).ok();
        }
    }
}

/// Notification handle for a resource a job depends on
#[derive(Clone)]
pub struct TaskResourceHandle {
    instance_id: usize,
    dependency_tx: Sender<ResourceStatus>,
}

impl TaskResourceHandle {
    /// Creates a handle that is not connected to any job
    pub fn stub() -> Self {
        let (dependency_tx, _) = channel(0);

        Self {
            instance_id: usize::MAX,
            dependency_tx,
        }
    }

    /// Notifies the owning job that the resource has become unavailable
    pub async fn resource_died(&mut self) {
        // The receiver is usually dropped right after the first message so errors are expected here
        self.dependency_tx.send(ResourceStatus::Dead).await.ok();
    }
}

impl PartialEq for TaskResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for TaskResourceHandle {}

impl Hash for TaskResourceHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance_id.hash(state);
    }
}
