// src/watch/source.rs

//! Change-source seam.
//!
//! A [`ChangeSource`] turns some notifier into [`ChangeSignal`]s. While it is
//! healthy its `open` future stays pending; when the notifier dies it resolves
//! with the reason. [`spawn_source`] restarts failed sources according to a
//! bounded [`RetryPolicy`] and reports the final failure to the runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::engine::RuntimeEvent;
use crate::types::ChangeSignal;

/// Why a change source stopped delivering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure(pub String);

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-blocking sender for change signals.
///
/// Uses `try_send`: when the buffer is full the signal is dropped and counted.
/// That loses nothing the debouncer needs, since a full buffer already holds
/// at least one signal for the current window.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::Sender<ChangeSignal>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl SignalSender {
    pub fn new(tx: mpsc::Sender<ChangeSignal>) -> Self {
        Self {
            tx,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Offer one signal. Returns `false` once the receiving side is gone.
    ///
    /// Safe to call from non-async contexts (e.g. a `notify` callback).
    pub fn notify(&self) -> bool {
        match self.tx.try_send(ChangeSignal) {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("missed notification (signal buffer full)");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.counters.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the receiving side has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// A restartable producer of change signals.
pub trait ChangeSource: Send + 'static {
    /// Human-readable name for logs.
    fn describe(&self) -> String;

    /// Start watching and deliver signals until the source fails.
    ///
    /// Resolves only on failure (or once `signals` is closed). Dropping the
    /// future stops the source.
    fn open(
        &mut self,
        signals: SignalSender,
    ) -> Pin<Box<dyn Future<Output = SourceFailure> + Send + '_>>;
}

/// Run `source`, restarting it per `policy`, until it fails for good.
///
/// Consecutive failures are counted; the count resets once a restarted source
/// has delivered a signal. When the budget is spent a
/// [`RuntimeEvent::WatchFailed`] is sent to the runtime.
pub fn spawn_source(
    mut source: Box<dyn ChangeSource>,
    policy: RetryPolicy,
    signals: SignalSender,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = source.describe();
        let mut attempts: u32 = 0;

        loop {
            let seen_before = signals.delivered() + signals.dropped();
            info!(source = %name, "change source started");
            let failure = source.open(signals.clone()).await;

            if signals.is_closed() {
                debug!(source = %name, "signal channel closed; change source finished");
                return;
            }

            if signals.delivered() + signals.dropped() > seen_before {
                attempts = 0;
            }

            if attempts >= policy.max_attempts {
                error!(source = %name, failure = %failure, attempts, "change source failed");
                let _ = runtime_tx
                    .send(RuntimeEvent::WatchFailed {
                        error: format!("{name}: {failure}"),
                    })
                    .await;
                return;
            }

            attempts += 1;
            let delay = policy.backoff(attempts);
            warn!(
                source = %name,
                failure = %failure,
                attempt = attempts,
                max_attempts = policy.max_attempts,
                ?delay,
                "change source failed; restarting"
            );
            tokio::time::sleep(delay).await;
        }
    })
}
