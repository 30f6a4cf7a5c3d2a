// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::errors::{Result, WatchrunError};
use crate::exec::{run_cycle, ExecutorBackend};

use super::core::CoreRuntime;
use super::{CoreCommand, CycleOutcome, RuntimeEvent};

/// Drives the cycle state machine in response to `RuntimeEvent`s and runs
/// cycles through an `ExecutorBackend`.
///
/// Each cycle runs on its own Tokio task so the debouncer keeps feeding
/// triggers (which the core folds into a pending retrigger) while a build is
/// in progress.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: Arc<E>,
    cycles: JoinSet<(u64, CycleOutcome)>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("cycles_in_flight", &self.cycles.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor: Arc::new(executor),
            cycles: JoinSet::new(),
        }
    }

    /// Main event loop.
    ///
    /// Returns an error only when the change feed was lost; a shutdown request
    /// or a closed event channel ends the loop cleanly. Either way any
    /// in-flight cycle is dropped and the backend is shut down.
    pub async fn run(mut self) -> Result<()> {
        info!("watchrun runtime started");

        let mut failure = None;

        loop {
            let in_flight = self.core.cycles_started();
            let event = tokio::select! {
                received = self.event_rx.recv() => match received {
                    Some(event) => event,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                Some(joined) = self.cycles.join_next(), if !self.cycles.is_empty() => {
                    let (cycle, outcome) = match joined {
                        Ok(done) => done,
                        Err(err) => {
                            error!(error = %err, "cycle task failed");
                            (in_flight, CycleOutcome::Aborted)
                        }
                    };
                    RuntimeEvent::CycleFinished { cycle, outcome }
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                match command {
                    CoreCommand::StartCycle { cycle } => self.start_cycle(cycle),
                    CoreCommand::RequestExit { error } => {
                        if let Some(error) = error {
                            failure = Some(error);
                        }
                    }
                }
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        // Dropping a cycle future closes the liveness pipe of its build.
        self.cycles.shutdown().await;
        self.executor.shutdown().await;

        info!("runtime exiting");
        match failure {
            Some(error) => Err(WatchrunError::WatchError(error)),
            None => Ok(()),
        }
    }

    fn start_cycle(&mut self, cycle: u64) {
        debug!(cycle, "starting cycle");
        let executor = Arc::clone(&self.executor);
        self.cycles.spawn(async move {
            let outcome = run_cycle(executor.as_ref(), cycle).await;
            debug!(cycle, ?outcome, "cycle finished");
            (cycle, outcome)
        });
    }
}
