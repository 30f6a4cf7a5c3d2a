// src/watch/mod.rs

//! File watching and change coalescing.
//!
//! This module is responsible for:
//! - Turning a notifier (`notify`, or an external watcher command) into a
//!   stream of payload-free change signals, minus filtered noise.
//! - Restarting a failed notifier within a bounded retry budget.
//! - Debouncing signal bursts into one trigger per quiet window.
//!
//! It does **not** know about builds or processes; it only produces triggers.

pub mod command_source;
pub mod debounce;
pub mod filter;
pub mod source;
pub mod watcher;

pub use command_source::CommandSource;
pub use debounce::{spawn_debouncer, QuietWindow};
pub use filter::PathFilter;
pub use source::{spawn_source, ChangeSource, SignalSender, SourceFailure};
pub use watcher::NotifySource;

use crate::config::{Settings, SourceSpec};

/// Build the change source described by `settings`.
pub fn source_from_settings(settings: &Settings) -> Box<dyn ChangeSource> {
    let filter = PathFilter::new(
        settings.dir.clone(),
        settings.exclude.clone(),
        settings.include_hidden,
    );

    match settings.source {
        SourceSpec::Native => Box::new(NotifySource::new(settings.dir.clone(), filter)),
        SourceSpec::Command(ref cmd) => Box::new(CommandSource::new(cmd.clone(), filter)),
    }
}
