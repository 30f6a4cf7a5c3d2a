// src/watch/command_source.rs

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::exec::monitor::{spawn_monitored, wait_reaped, Output};
use crate::watch::filter::PathFilter;
use crate::watch::source::{ChangeSource, SignalSender, SourceFailure};

/// External watcher process (e.g. `fswatch -r .`) printing one changed path
/// per stdout line.
///
/// The process runs behind a liveness pipe, so it never outlives us. Its
/// stdout reaching EOF (the process exited) is a failure: a watcher that
/// stops printing would otherwise look like a quiet tree.
#[derive(Debug, Clone)]
pub struct CommandSource {
    cmd: String,
    filter: PathFilter,
}

impl CommandSource {
    pub fn new(cmd: impl Into<String>, filter: PathFilter) -> Self {
        Self {
            cmd: cmd.into(),
            filter,
        }
    }
}

impl ChangeSource for CommandSource {
    fn describe(&self) -> String {
        format!("watcher command `{}`", self.cmd)
    }

    fn open(
        &mut self,
        signals: SignalSender,
    ) -> Pin<Box<dyn Future<Output = SourceFailure> + Send + '_>> {
        Box::pin(async move {
            let mut watcher = match spawn_monitored(&self.cmd, Output::CaptureStdout) {
                Ok(m) => m,
                Err(err) => return SourceFailure(err.to_string()),
            };

            let Some(stdout) = watcher.child.stdout.take() else {
                return SourceFailure("watcher stdout was not captured".to_string());
            };

            info!(cmd = %self.cmd, pid = ?watcher.pid(), "watcher command started");

            let mut lines = BufReader::new(stdout).lines();
            let failure = loop {
                let line = tokio::select! {
                    line = lines.next_line() => line,
                    _ = signals.closed() => break "signal channel closed".to_string(),
                };

                match line {
                    Ok(Some(line)) => {
                        let path = line.trim();
                        if path.is_empty() {
                            continue;
                        }
                        if self.filter.is_relevant(Path::new(path)) {
                            debug!(%path, "change detected");
                            signals.notify();
                        } else {
                            debug!(%path, "ignoring filtered path");
                        }
                    }
                    Ok(None) => break "watcher exited unexpectedly".to_string(),
                    Err(err) => break format!("reading watcher output: {err}"),
                }
            };

            // Tear the watcher down (no-op if it already exited) and reap it.
            watcher.pipe.close();
            match wait_reaped(&mut watcher.child, &mut watcher.closed).await {
                Ok(status) => SourceFailure(format!("{failure} ({status})")),
                Err(_) => SourceFailure(failure),
            }
        })
    }
}
