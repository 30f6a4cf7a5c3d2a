// src/watch/debounce.rs

//! Quiescence debouncer.
//!
//! Every signal (re)arms a timer of length `quiet`; a trigger fires when the
//! timer runs out with no signal in between. A burst therefore produces exactly
//! one trigger, `quiet` after its last signal, however many signals it holds.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::logging::progress;
use crate::types::ChangeSignal;

/// Pure timing rule behind the debouncer.
#[derive(Debug, Clone)]
pub struct QuietWindow {
    quiet: Duration,
    last_signal: Option<Instant>,
}

impl QuietWindow {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_signal: None,
        }
    }

    /// Record a signal at `now`. Returns `true` if it opened a new burst.
    pub fn signal(&mut self, now: Instant) -> bool {
        let opened = self.last_signal.is_none();
        self.last_signal = Some(now);
        opened
    }

    pub fn is_pending(&self) -> bool {
        self.last_signal.is_some()
    }

    /// When the pending trigger is due, if a burst is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_signal.map(|t| t + self.quiet)
    }

    /// Fire if the window has been quiet long enough; closes the burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(due) if now >= due => {
                self.last_signal = None;
                true
            }
            _ => false,
        }
    }
}

/// Spawn the debouncer between the change source and the runtime.
///
/// If the signal channel closes during a burst the pending trigger is still
/// delivered. The task ends when either channel closes.
pub fn spawn_debouncer(
    quiet: Duration,
    mut signal_rx: mpsc::Receiver<ChangeSignal>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut window = QuietWindow::new(quiet);

        loop {
            let deadline = window.deadline();

            tokio::select! {
                signal = signal_rx.recv() => match signal {
                    Some(ChangeSignal) => {
                        if window.signal(Instant::now()) {
                            progress("modification detected...");
                        }
                    }
                    None => {
                        if window.is_pending() {
                            emit(&runtime_tx).await;
                        }
                        debug!("signal channel closed; debouncer finished");
                        return;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if window.poll(Instant::now()) && !emit(&runtime_tx).await {
                        return;
                    }
                }
            }
        }
    })
}

/// Deliver one trigger; `false` once the runtime is gone.
async fn emit(runtime_tx: &mpsc::Sender<RuntimeEvent>) -> bool {
    debug!("quiescence reached; triggering cycle");
    runtime_tx
        .send(RuntimeEvent::Triggered {
            reason: TriggerReason::FileChange,
        })
        .await
        .is_ok()
}
