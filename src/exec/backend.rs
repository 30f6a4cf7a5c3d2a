// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime drives cycles through an `ExecutorBackend` instead of spawning
//! processes itself. Production uses [`CommandBackend`] (shell commands plus
//! the [`Supervisor`]); tests plug in a fake that records calls.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error};

use crate::engine::CycleOutcome;
use crate::errors::Result;
use crate::exec::build::run_build;
use crate::exec::supervisor::Supervisor;
use crate::logging::progress;
use crate::types::BuildOutcome;

/// The two steps of a cycle, plus teardown.
pub trait ExecutorBackend: Send + Sync + 'static {
    /// Run the build step to completion.
    fn build(&self) -> Pin<Box<dyn Future<Output = Result<BuildOutcome>> + Send + '_>>;

    /// Replace the running process with a fresh instance of the run command.
    fn launch(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop whatever is still running; called once when the runtime exits.
    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

/// One build/run cycle: build, and only if it passed, launch.
pub async fn run_cycle<E: ExecutorBackend + ?Sized>(backend: &E, cycle: u64) -> CycleOutcome {
    let outcome = match backend.build().await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(cycle, error = %err, "build could not be executed");
            progress(format!("build error: {err}"));
            BuildOutcome::Failed(-1)
        }
    };

    if !outcome.allows_run() {
        return CycleOutcome::BuildFailed(outcome);
    }

    match backend.launch().await {
        Ok(()) => CycleOutcome::Completed,
        Err(err) => {
            error!(cycle, error = %err, "run command could not be started");
            progress(format!("error starting process: {err}"));
            CycleOutcome::RunFailed
        }
    }
}

/// Real backend: shell commands, with the run command owned by a [`Supervisor`].
#[derive(Debug, Clone)]
pub struct CommandBackend {
    build: Option<String>,
    run: Option<String>,
    supervisor: Supervisor,
}

impl CommandBackend {
    /// Empty or whitespace-only commands count as absent.
    pub fn new(build: Option<String>, run: Option<String>, supervisor: Supervisor) -> Self {
        let present = |c: Option<String>| c.filter(|s| !s.trim().is_empty());
        Self {
            build: present(build),
            run: present(run),
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }
}

impl ExecutorBackend for CommandBackend {
    fn build(&self) -> Pin<Box<dyn Future<Output = Result<BuildOutcome>> + Send + '_>> {
        Box::pin(run_build(self.build.as_deref()))
    }

    fn launch(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let Some(ref cmd) = self.run else {
                debug!("no run command; nothing to launch");
                return Ok(());
            };

            progress("attempting run...");
            self.supervisor.replace(cmd).await?;
            Ok(())
        })
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.supervisor.shutdown())
    }
}
