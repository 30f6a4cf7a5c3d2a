// src/exec/supervisor.rs

//! Single-slot process supervisor.
//!
//! Owns the one "current" long-running child. The slot lives behind a
//! `std::sync::Mutex` that is only ever held for a set/clear/compare, never
//! across an `.await`. `replace` calls are serialized by a separate async gate
//! so that stop-then-start is atomic with respect to other replacements.
//!
//! Exit reporting never takes the gate; a background waiter clears the slot
//! only if it still holds the *same* [`ProcessId`], so a late exit of a
//! replaced process cannot clear its successor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::monitor::{spawn_monitored, wait_reaped, LivenessPipe, Output};
use crate::logging::progress;

/// Identity of a managed process, unique for the lifetime of a [`Supervisor`].
///
/// OS pids can be reused; these cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How and when a managed process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRecord {
    /// Exit code, `None` if it was killed by a signal or could not be reaped.
    pub code: Option<i32>,
    /// When the process was reaped.
    pub exited_at: Instant,
}

struct ProcessInner {
    id: ProcessId,
    pid: Option<u32>,
    cmd: String,
    started_at: Instant,
    pipe: Mutex<LivenessPipe>,
    exit_rx: watch::Receiver<Option<ExitRecord>>,
}

/// Handle to a supervised child. Cheap to clone.
///
/// The liveness pipe is owned by the handle: once every clone is gone (or
/// [`Supervisor::stop`] ran) the child and all its descendants are killed.
#[derive(Clone)]
pub struct ManagedProcess {
    inner: Arc<ProcessInner>,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("id", &self.inner.id)
            .field("pid", &self.inner.pid)
            .field("cmd", &self.inner.cmd)
            .field("exit", &self.exit())
            .finish()
    }
}

impl ManagedProcess {
    pub fn id(&self) -> ProcessId {
        self.inner.id
    }

    /// OS pid of the monitor the command runs under.
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn command(&self) -> &str {
        &self.inner.cmd
    }

    pub fn started_at(&self) -> Instant {
        self.inner.started_at
    }

    /// Exit record, once the process has been reaped.
    pub fn exit(&self) -> Option<ExitRecord> {
        *self.inner.exit_rx.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit().is_some()
    }

    /// Wait until the process has been reaped.
    pub async fn wait(&self) -> ExitRecord {
        let mut rx = self.inner.exit_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(record) => (*record).unwrap_or_else(unknown_exit),
            // The waiter went away without reporting (runtime shutting down).
            Err(_) => unknown_exit(),
        }
    }

    fn close_pipe(&self) {
        self.inner
            .pipe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }
}

fn unknown_exit() -> ExitRecord {
    ExitRecord {
        code: None,
        exited_at: Instant::now(),
    }
}

pub(crate) fn fmt_pid(pid: Option<u32>) -> String {
    pid.map_or_else(|| "?".to_string(), |p| p.to_string())
}

struct Shared {
    current: Mutex<Option<ManagedProcess>>,
    replace_gate: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<ManagedProcess>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns at most one current [`ManagedProcess`].
///
/// Clones share the same slot.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("current", &self.current().map(|p| p.id()))
            .finish()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                current: Mutex::new(None),
                replace_gate: tokio::sync::Mutex::new(()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The process currently recorded as live, if any.
    pub fn current(&self) -> Option<ManagedProcess> {
        self.shared.slot().clone()
    }

    /// Launch `cmd` behind a liveness pipe and start its exit waiter.
    ///
    /// The new process is *not* recorded as current; see [`Supervisor::replace`].
    pub fn start(&self, cmd: &str) -> Result<ManagedProcess> {
        let monitored = spawn_monitored(cmd, Output::Inherit)?;
        let id = ProcessId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let pid = monitored.pid();
        let (exit_tx, exit_rx) = watch::channel(None);

        let process = ManagedProcess {
            inner: Arc::new(ProcessInner {
                id,
                pid,
                cmd: cmd.to_string(),
                started_at: Instant::now(),
                pipe: Mutex::new(monitored.pipe),
                exit_rx,
            }),
        };

        // The waiter must not keep the slot (and thus the pipe) alive.
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(wait_for_exit(
            monitored.child,
            monitored.closed,
            id,
            pid,
            exit_tx,
            shared,
        ));

        progress(format!("process started with pid: {}", fmt_pid(pid)));
        info!(process_id = %id, pid = ?pid, %cmd, "process started");

        Ok(process)
    }

    /// Close the process's liveness pipe and wait until it has been reaped.
    ///
    /// Idempotent: stopping an exited process returns its exit record.
    pub async fn stop(&self, process: &ManagedProcess) -> ExitRecord {
        debug!(process_id = %process.id(), pid = ?process.pid(), "stopping process");
        process.close_pipe();
        process.wait().await
    }

    /// Stop the current process (if any), then start `cmd` and record it as
    /// current.
    ///
    /// The old process is reaped strictly before the new one is spawned. If
    /// the spawn fails the slot is left empty.
    pub async fn replace(&self, cmd: &str) -> Result<ManagedProcess> {
        let _gate = self.shared.replace_gate.lock().await;

        let old = self.shared.slot().take();
        if let Some(old) = old {
            progress(format!("killing old process pid: {}", fmt_pid(old.pid())));
            info!(process_id = %old.id(), pid = ?old.pid(), "stopping previous process");
            let record = self.stop(&old).await;
            debug!(process_id = %old.id(), code = ?record.code, "previous process reaped");
        }

        let process = self.start(cmd)?;

        {
            let mut slot = self.shared.slot();
            // The waiter publishes the exit under this same lock, so a process
            // that already died is never recorded as current.
            if process.has_exited() {
                debug!(process_id = %process.id(), "process exited before it could be recorded");
            } else {
                *slot = Some(process.clone());
            }
        }

        Ok(process)
    }

    /// Stop the current process, if any. Used when the supervisor exits.
    pub async fn shutdown(&self) {
        let _gate = self.shared.replace_gate.lock().await;

        let current = self.shared.slot().take();
        if let Some(process) = current {
            info!(process_id = %process.id(), pid = ?process.pid(), "stopping process on shutdown");
            self.stop(&process).await;
        }
    }
}

/// Background waiter: reap the child, publish its exit, and clear the slot if
/// (and only if) it still holds this process.
async fn wait_for_exit(
    mut child: Child,
    mut closed: oneshot::Receiver<()>,
    id: ProcessId,
    pid: Option<u32>,
    exit_tx: watch::Sender<Option<ExitRecord>>,
    shared: Weak<Shared>,
) {
    let code = match wait_reaped(&mut child, &mut closed).await {
        Ok(status) => status.code(),
        Err(err) => {
            warn!(process_id = %id, pid = ?pid, error = %err, "failed to wait for process");
            None
        }
    };

    let record = ExitRecord {
        code,
        exited_at: Instant::now(),
    };

    let mut cleared = false;
    match shared.upgrade() {
        Some(shared) => {
            let mut slot = shared.slot();
            exit_tx.send_replace(Some(record));
            if slot.as_ref().is_some_and(|p| p.id() == id) {
                *slot = None;
                cleared = true;
            }
        }
        None => {
            exit_tx.send_replace(Some(record));
        }
    }

    progress(format!("process exited with pid: {}", fmt_pid(pid)));
    info!(process_id = %id, pid = ?pid, exit_code = ?code, cleared, "process exited");
}
