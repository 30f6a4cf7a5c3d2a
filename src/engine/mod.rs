// src/engine/mod.rs

//! Orchestration engine for watchrun.
//!
//! This module ties together:
//! - the cycle state machine (at most one build/run cycle in flight, plus a
//!   single pending retrigger)
//! - the main runtime event loop that reacts to:
//!   - debounced change triggers
//!   - cycle completion
//!   - watcher failure
//!   - shutdown signals
//!
//! The pure core lives in [`core`] and [`state`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::types::BuildOutcome;

/// Why a cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The initial cycle at startup.
    Startup,
    /// A quiesced burst of filesystem changes.
    FileChange,
}

/// How a build/run cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Build passed (or was skipped) and the run step was carried out.
    Completed,
    /// Build failed; the run step was skipped.
    BuildFailed(BuildOutcome),
    /// Build passed but the run command could not be started.
    RunFailed,
    /// The cycle task panicked or was cancelled.
    Aborted,
}

/// Events flowing into the runtime from the debouncer, watcher and cycles.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A debounced trigger: time to build/run.
    Triggered { reason: TriggerReason },
    /// The cycle in flight finished.
    CycleFinished { cycle: u64, outcome: CycleOutcome },
    /// The change feed is gone for good.
    WatchFailed { error: String },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod runtime;
pub mod state;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use runtime::Runtime;
pub use state::CycleState;
