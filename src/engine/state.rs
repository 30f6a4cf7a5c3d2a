// src/engine/state.rs

//! Cycle state machine.
//!
//! ```text
//! Idle --trigger--> CycleRunning
//! CycleRunning --trigger--> CycleRunningWithPendingRetrigger
//! CycleRunningWithPendingRetrigger --trigger--> (unchanged)
//! CycleRunning --finished--> Idle
//! CycleRunningWithPendingRetrigger --finished--> CycleRunning (new cycle)
//! ```
//!
//! A single pending flag, not a queue: any number of triggers during a cycle
//! yields exactly one follow-up cycle.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    CycleRunning,
    CycleRunningWithPendingRetrigger,
}

impl CycleState {
    pub fn is_idle(self) -> bool {
        self == CycleState::Idle
    }

    pub fn has_pending_retrigger(self) -> bool {
        self == CycleState::CycleRunningWithPendingRetrigger
    }

    /// Apply a trigger. Returns `true` if a new cycle must start now.
    pub fn on_trigger(&mut self) -> bool {
        match *self {
            CycleState::Idle => {
                *self = CycleState::CycleRunning;
                true
            }
            CycleState::CycleRunning => {
                debug!("trigger during cycle; recording pending retrigger");
                *self = CycleState::CycleRunningWithPendingRetrigger;
                false
            }
            CycleState::CycleRunningWithPendingRetrigger => {
                debug!("trigger during cycle; already pending, coalesced");
                false
            }
        }
    }

    /// Apply the completion of the cycle in flight. Returns `true` if the
    /// pending retrigger must start a new cycle now.
    ///
    /// A completion while idle is ignored (it cannot belong to a live cycle).
    pub fn on_cycle_finished(&mut self) -> bool {
        match *self {
            CycleState::Idle => {
                debug!("cycle completion while idle; ignoring");
                false
            }
            CycleState::CycleRunning => {
                *self = CycleState::Idle;
                false
            }
            CycleState::CycleRunningWithPendingRetrigger => {
                *self = CycleState::CycleRunning;
                true
            }
        }
    }
}
