// src/exec/monitor.rs

//! Liveness-pipe launcher.
//!
//! Every command (build, run, external watcher) is started behind a small
//! `bash` monitor whose stdin is the read end of a pipe we hold. The monitor
//! starts two background jobs, each in its own process group:
//!
//! - the user command (stdin redirected from `/dev/null`);
//! - a guard that blocks reading the pipe.
//!
//! It then waits for whichever job ends first, sends `SIGTERM` to both
//! process groups, reaps them and exits with the first job's status. So:
//!
//! - closing the write end (dropping [`LivenessPipe`]) tears down the whole
//!   subtree of the command, including anything it forked;
//! - if this process dies for any reason, the kernel closes the write end and
//!   the same teardown happens, so nothing is orphaned.
//!
//! The monitor itself is never killed directly (no `kill_on_drop`): a
//! `SIGKILL`ed monitor could not clean up after its jobs.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::{Result, WatchrunError};

/// Monitor script; `$1` is the user command.
///
/// `set -m` puts each background job in its own process group so that
/// `kill -- -PGID` reaches grandchildren too. Traps cover the case where the
/// monitor itself is interrupted (e.g. Ctrl-C hits the foreground group).
///
/// Job control makes bash report job status (`[1]+ Terminated ...`) on its
/// stderr, so the monitor's own stderr goes to `/dev/null` and the command
/// gets the real one back through fd 4.
#[cfg(unix)]
const MONITOR_SCRIPT: &str = r#"
exec 3<&0 0</dev/null 4>&2 2>/dev/null
set -m
job=
guard=
teardown() {
    [ -n "$job" ] && kill -TERM -- "-$job" 2>/dev/null
    [ -n "$guard" ] && kill -TERM -- "-$guard" 2>/dev/null
}
trap 'teardown; wait; exit 143' HUP INT TERM
eval "$1" 2>&4 3<&- 4>&- &
job=$!
read -r _ <&3 4>&- &
guard=$!
wait -n
status=$?
teardown
wait
exit "$status"
"#;

/// Name shown as `$0` of the monitor shell in `ps` output.
#[cfg(unix)]
const MONITOR_ARGV0: &str = "watchrun-monitor";

/// Write end of a liveness pipe.
///
/// Dropping it (or calling [`LivenessPipe::close`]) asks the monitor to kill
/// the command's whole process tree.
#[derive(Debug)]
pub struct LivenessPipe {
    stdin: Option<ChildStdin>,
    /// Mirrors the pipe inside this process; dropped together with `stdin`.
    closed_tx: Option<oneshot::Sender<()>>,
}

impl LivenessPipe {
    /// Close the write end. Idempotent.
    pub fn close(&mut self) {
        self.closed_tx.take();
        if self.stdin.take().is_some() {
            debug!("liveness pipe closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.stdin.is_some()
    }
}

/// How the command's stdout/stderr should be wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Share the supervisor's stdout/stderr (live passthrough).
    Inherit,
    /// Pipe stdout back to us; stderr is still inherited.
    CaptureStdout,
}

/// A command started behind a liveness pipe.
#[derive(Debug)]
pub struct Monitored {
    pub child: Child,
    pub pipe: LivenessPipe,
    /// Resolves (with an error) once `pipe` has been closed or dropped.
    pub closed: oneshot::Receiver<()>,
}

impl Monitored {
    /// OS pid of the monitor process (the command runs underneath it).
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Wait until the monitor has exited and been reaped.
///
/// On Unix the monitor tears the tree down by itself once the pipe closes, so
/// this only waits. Elsewhere there is no monitor shell and the direct child
/// is killed when the pipe closes.
pub async fn wait_reaped(
    child: &mut Child,
    closed: &mut oneshot::Receiver<()>,
) -> std::io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        _ = closed => {
            #[cfg(not(unix))]
            child.start_kill()?;
            child.wait().await
        }
    }
}

/// Build the platform-specific monitor command for `cmd`.
#[cfg(unix)]
fn monitor_command(cmd: &str) -> Command {
    let mut c = Command::new("bash");
    c.arg("-c").arg(MONITOR_SCRIPT).arg(MONITOR_ARGV0).arg(cmd);
    c
}

#[cfg(not(unix))]
fn monitor_command(cmd: &str) -> Command {
    let mut c = Command::new("cmd");
    c.arg("/C").arg(cmd);
    c
}

/// Spawn `cmd` behind a liveness pipe.
pub fn spawn_monitored(cmd: &str, output: Output) -> Result<Monitored> {
    let mut command = monitor_command(cmd);

    command.stdin(Stdio::piped()).stderr(Stdio::inherit());
    match output {
        Output::Inherit => command.stdout(Stdio::inherit()),
        Output::CaptureStdout => command.stdout(Stdio::piped()),
    };

    #[cfg(not(unix))]
    command.kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| WatchrunError::SpawnError {
        cmd: cmd.to_string(),
        source,
    })?;

    let stdin = child.stdin.take();
    let (closed_tx, closed) = oneshot::channel();
    debug!(pid = ?child.id(), %cmd, "spawned monitored command");

    Ok(Monitored {
        child,
        pipe: LivenessPipe {
            stdin,
            closed_tx: Some(closed_tx),
        },
        closed,
    })
}
