// src/watch/watcher.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::watch::filter::PathFilter;
use crate::watch::source::{ChangeSource, SignalSender, SourceFailure};

/// In-process recursive watcher backed by `notify`.
///
/// Each relevant path in an event becomes one change signal. Any error the
/// backend reports is treated as fatal for this source instance.
#[derive(Debug, Clone)]
pub struct NotifySource {
    root: PathBuf,
    filter: PathFilter,
}

impl NotifySource {
    pub fn new(root: impl Into<PathBuf>, filter: PathFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }
}

impl ChangeSource for NotifySource {
    fn describe(&self) -> String {
        format!("file watcher on {:?}", self.root)
    }

    fn open(
        &mut self,
        signals: SignalSender,
    ) -> Pin<Box<dyn Future<Output = SourceFailure> + Send + '_>> {
        Box::pin(async move {
            // Errors leave the blocking notify callback through this channel.
            let (err_tx, mut err_rx) = mpsc::unbounded_channel::<String>();

            let filter = self.filter.clone();
            let callback_signals = signals.clone();
            let callback_err_tx = err_tx.clone();

            let watcher = RecommendedWatcher::new(
                move |res: notify::Result<Event>| match res {
                    Ok(event) => forward_event(&filter, &callback_signals, event),
                    Err(err) => {
                        let _ = callback_err_tx.send(format!("file watch error: {err}"));
                    }
                },
                Config::default(),
            );

            let mut watcher = match watcher {
                Ok(w) => w,
                Err(err) => return SourceFailure(format!("creating file watcher: {err}")),
            };

            if let Err(err) = watcher.watch(&self.root, RecursiveMode::Recursive) {
                return SourceFailure(format!("watching {:?}: {err}", self.root));
            }

            info!("file watcher started on {:?}", self.root);

            // Keep `watcher` alive until it reports an error or nobody
            // listens for signals any more.
            let failure = tokio::select! {
                err = err_rx.recv() => err.unwrap_or_else(|| "file watcher stopped".to_string()),
                _ = signals.closed() => "signal channel closed".to_string(),
            };

            drop(watcher);
            SourceFailure(failure)
        })
    }
}

fn forward_event(filter: &PathFilter, signals: &SignalSender, event: Event) {
    // Reads and opens are not modifications.
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }

    for path in &event.paths {
        if filter.is_relevant(path) {
            debug!(?path, kind = ?event.kind, "change detected");
            signals.notify();
        } else {
            debug!(?path, "ignoring filtered path");
        }
    }
}
