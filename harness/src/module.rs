use super::{DeathReason, Heart};
use async_trait::async_trait;
use futures::lock::Mutex;
use library::scheduling::{JobScheduler, StatusServer, StatusState};
use library::{BoxedError, EmptyResult};
use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Reason why a [`Module`] stopped
#[derive(Debug)]
pub enum ModuleTerminationReason {
    /// The [`Heart`] returned by the run procedure died
    HeartDied(DeathReason),
    /// The run procedure returned without handing over a [`Heart`]
    ExitedNormally,
    /// The startup hook failed
    StartupFailed(BoxedError),
    /// The run procedure failed
    OperationalError(BoxedError),
    /// The startup hook did not complete in time
    Timeout,
}

/// Executable module
#[async_trait]
pub trait Module {
    /// Executed before running the core loop
    async fn pre_startup(&mut self) -> EmptyResult {
        Ok(())
    }

    /// Core run loop of the module
    ///
    /// When the function returns `Some(_)` the death of the returned [`Heart`] is awaited before calling the shutdown hook.
    /// Returning `None` results in the program entering a shutdown state right away.
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError>;

    /// Opportunity for modules to do something before all jobs will be terminated
    async fn pre_shutdown(&mut self, _scheduler: &JobScheduler) {}

    /// Shutdown hook executed after the core loop and all associated jobs have terminated
    #[instrument(skip(self))]
    async fn post_shutdown(&mut self, termination_reason: ModuleTerminationReason) {
        match termination_reason {
            ModuleTerminationReason::HeartDied(_) | ModuleTerminationReason::ExitedNormally => {
                info!("Module exited normally")
            }
            _ => error!("Module terminated with an error"),
        }
    }
}

/// Runner for [`Module`] implementations
pub struct ModuleRunner {
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    termination_grace_period: Duration,
    status_server_port: Option<u16>,
}

impl ModuleRunner {
    /// Creates a new instance using default timeouts and an optional status server
    pub fn new(status_server_port: Option<u16>) -> Self {
        Self {
            status_server_port,
            ..Default::default()
        }
    }
}

impl Default for ModuleRunner {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
            termination_grace_period: Duration::from_secs(5),
            status_server_port: None,
        }
    }
}

impl ModuleRunner {
    /// Executes a [`Module`] until it exits by calling the corresponding lifecycle functions in order
    #[instrument(skip(self, module), fields(module_name = type_name::<M>()))]
    pub async fn run<M: Module + Send + Sync>(&self, mut module: M) {
        let scheduler = JobScheduler::default();
        let mut termination_reason = ModuleTerminationReason::ExitedNormally;

        let status_state = match self.status_server_port {
            Some(port) => {
                info!(port, "Spawning status server");
                let (status_state, status_server) = StatusServer::new(&scheduler, port);
                scheduler.spawn_job(status_server).await;
                Some(status_state)
            }
            None => None,
        };

        info!("Commencing module startup sequence");
        match timeout(self.startup_timeout, module.pre_startup()).await {
            Ok(Ok(_)) => {
                termination_reason = self.run_loop(&mut module, &scheduler, &status_state).await
            }
            Ok(Err(error)) => {
                error!(?error, "Module startup sequence encountered an error");
                termination_reason = ModuleTerminationReason::StartupFailed(error);
            }
            Err(_) => {
                error!("Module startup sequence timed out");
                termination_reason = ModuleTerminationReason::Timeout
            }
        }

        info!("Running pre-shutdown hook");
        if let Some(state) = status_state {
            *state.lock().await = StatusState::Shutdown;
        }
        module.pre_shutdown(&scheduler).await;

        info!("Terminating remaining jobs");
        scheduler
            .terminate_jobs(self.termination_grace_period)
            .await;

        info!("Commencing module shutdown sequence");
        let result = timeout(
            self.shutdown_timeout,
            module.post_shutdown(termination_reason),
        )
        .await;

        if result.is_err() {
            error!("Module shutdown sequence timed out");
        }
    }

    async fn run_loop<M: Module + Send + Sync>(
        &self,
        module: &mut M,
        scheduler: &JobScheduler,
        status_state: &Option<Arc<Mutex<StatusState>>>,
    ) -> ModuleTerminationReason {
        info!("Executing module run procedure");
        match module.run(scheduler).await {
            Ok(None) => {
                debug!("Module run procedure completed successfully");
                ModuleTerminationReason::ExitedNormally
            }
            Ok(Some(mut heart)) => {
                debug!("Module run procedure completed successfully, entering run loop");
                if let Some(state) = status_state {
                    *state.lock().await = StatusState::Running;
                }
                let death_reason = heart.death().await;
                info!(%death_reason, "Heart provided by run procedure died");
                ModuleTerminationReason::HeartDied(death_reason)
            }
            Err(error) => {
                error!(?error, "Module run procedure encountered an error");
                ModuleTerminationReason::OperationalError(error)
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        calls: Arc<AtomicUsize>,
        fail_startup: bool,
    }

    #[async_trait]
    impl Module for Recorder {
        async fn pre_startup(&mut self) -> EmptyResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_startup {
                Err("no broker".into())
            } else {
                Ok(())
            }
        }

        async fn run(&mut self, _scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
            self.calls.fetch_add(10, Ordering::SeqCst);
            let (heart, mut stone) = Heart::new();
            stone.kill("done").await;
            Ok(Some(heart))
        }

        async fn post_shutdown(&mut self, termination_reason: ModuleTerminationReason) {
            let increment = match termination_reason {
                ModuleTerminationReason::HeartDied(DeathReason::Killed(_)) => 100,
                ModuleTerminationReason::StartupFailed(_) => 1000,
                _ => 0,
            };
            self.calls.fetch_add(increment, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn run_lifecycle_hooks_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let module = Recorder {
            calls: calls.clone(),
            fail_startup: false,
        };

        ModuleRunner::default().run(module).await;
        assert_eq!(calls.load(Ordering::SeqCst), 111);
    }

    #[tokio::test]
    async fn skip_run_when_startup_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let module = Recorder {
            calls: calls.clone(),
            fail_startup: true,
        };

        ModuleRunner::default().run(module).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1001);
    }
}
