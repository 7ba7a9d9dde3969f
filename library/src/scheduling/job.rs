use super::JobManager;
use crate::EmptyResult;
use async_trait::async_trait;

/// Persistent execution unit
///
/// Jobs may depend on resources obtained through the [`JobManager`]. If such a dependency becomes
/// unavailable the job is aborted and restarted by the scheduler.
#[async_trait]
pub trait Job {
    /// Name of the job displayed in log messages and the status report
    const NAME: &'static str;
    /// Whether or not the job honors the termination signal. If not, it is aborted externally.
    const SUPPORTS_GRACEFUL_TERMINATION: bool = false;

    /// Instance specific name, defaults to [`Job::NAME`]
    fn name(&self) -> String {
        Self::NAME.to_owned()
    }

    /// Instance specific override of [`Job::SUPPORTS_GRACEFUL_TERMINATION`]
    fn supports_graceful_termination(&self) -> bool {
        Self::SUPPORTS_GRACEFUL_TERMINATION
    }

    /// Runs the job until it finishes, fails or is terminated
    async fn execute(&self, manager: JobManager) -> EmptyResult;
}
