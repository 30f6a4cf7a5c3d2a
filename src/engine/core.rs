// src/engine/core.rs

//! Pure core runtime.
//!
//! Consumes [`RuntimeEvent`]s and produces [`CoreCommand`]s for the IO shell
//! (`engine::runtime::Runtime`). No Tokio, channels or processes here, so the
//! orchestration rules can be tested synchronously.

use tracing::{debug, info, warn};

use crate::engine::state::CycleState;
use crate::engine::{CycleOutcome, RuntimeEvent, TriggerReason};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start build/run cycle number `cycle`.
    StartCycle { cycle: u64 },
    /// Stop the loop; `error` is set when exiting because of a failure.
    RequestExit { error: Option<String> },
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn keep(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn exit(error: Option<String>) -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit { error }],
            keep_running: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct CoreRuntime {
    state: CycleState,
    /// Number of the cycle in flight (or of the last one).
    current_cycle: u64,
}

impl CoreRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Number of cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.current_cycle
    }

    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::Triggered { reason } => self.handle_trigger(reason),
            RuntimeEvent::CycleFinished { cycle, outcome } => {
                self.handle_cycle_finished(cycle, outcome)
            }
            RuntimeEvent::WatchFailed { error } => {
                warn!(%error, "change feed lost; stopping");
                CoreStep::exit(Some(error))
            }
            RuntimeEvent::ShutdownRequested => {
                info!("shutdown requested");
                CoreStep::exit(None)
            }
        }
    }

    fn handle_trigger(&mut self, reason: TriggerReason) -> CoreStep {
        debug!(?reason, state = ?self.state, "trigger received");
        if self.state.on_trigger() {
            CoreStep::keep(vec![self.next_cycle()])
        } else {
            CoreStep::keep(Vec::new())
        }
    }

    fn handle_cycle_finished(&mut self, cycle: u64, outcome: CycleOutcome) -> CoreStep {
        if cycle != self.current_cycle {
            warn!(cycle, current = self.current_cycle, "completion for unknown cycle; ignoring");
            return CoreStep::keep(Vec::new());
        }

        debug!(cycle, ?outcome, state = ?self.state, "cycle finished");
        if self.state.on_cycle_finished() {
            CoreStep::keep(vec![self.next_cycle()])
        } else {
            CoreStep::keep(Vec::new())
        }
    }

    fn next_cycle(&mut self) -> CoreCommand {
        self.current_cycle += 1;
        CoreCommand::StartCycle {
            cycle: self.current_cycle,
        }
    }
}
