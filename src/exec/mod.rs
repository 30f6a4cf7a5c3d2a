// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`monitor`] starts commands behind a liveness pipe so their whole
//!   process tree dies when the pipe closes.
//! - [`supervisor`] owns the single long-running child and replaces it
//!   stop-then-start.
//! - [`build`] runs the build step to completion.
//! - [`backend`] provides the `ExecutorBackend` trait, the cycle sequencing
//!   and the production `CommandBackend`.

pub mod backend;
pub mod build;
pub mod monitor;
pub mod supervisor;

pub use backend::{run_cycle, CommandBackend, ExecutorBackend};
pub use supervisor::{ExitRecord, ManagedProcess, ProcessId, Supervisor};
