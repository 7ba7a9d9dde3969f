//! Job handling and scheduling
//!
//! Long running units of work are modelled as [`Job`]s which are started, monitored and restarted
//! by a [`JobScheduler`]. Jobs may depend on resources (e.g. a broker connection) through a
//! [`TaskResourceHandle`] and are restarted when such a resource dies.

mod job;
mod job_manager;
mod job_scheduler;
mod liveness;
mod status_server;

pub use job::Job;
pub use job_manager::{JobManager, TaskResourceHandle};
pub use job_scheduler::{JobScheduler, JobStatus};
pub use liveness::LivenessFlag;
pub use status_server::{StatusServer, StatusState};
