use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cli::CliArgs;
use crate::types::HumanDuration;

/// Default quiescence window when neither the file nor the CLI sets one.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(100);

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// dir = "."
/// quiescence = "100ms"
/// exclude = ["target/"]
///
/// [retry]
/// max_attempts = 3
/// delay = "500ms"
///
/// [commands]
/// build = "cargo build"
/// run = "./target/debug/server"
/// ```
///
/// All sections are optional. Nothing here is checked yet; see
/// [`Settings`] for the validated form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub commands: CommandsSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Directory to watch; defaults to the current directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Idle time after the last change before a cycle starts.
    #[serde(default)]
    pub quiescence: Option<HumanDuration>,

    /// Substrings; a changed path containing any of them is ignored.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// React to dot files and dot directories as well.
    #[serde(default)]
    pub include_hidden: bool,

    /// External watcher command (one changed path per stdout line).
    #[serde(default)]
    pub command: Option<String>,
}

/// `[retry]` section: what to do when the watcher dies.
///
/// The default (`max_attempts = 0`) treats the first watcher failure as fatal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[serde(default)]
    pub delay: Option<HumanDuration>,

    #[serde(default)]
    pub max_delay: Option<HumanDuration>,
}

/// `[commands]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandsSection {
    #[serde(default)]
    pub build: Option<String>,

    #[serde(default)]
    pub run: Option<String>,

    /// Build/run once at startup, before any change is seen.
    #[serde(default = "default_initial_cycle")]
    pub initial_cycle: bool,
}

fn default_initial_cycle() -> bool {
    true
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            build: None,
            run: None,
            initial_cycle: default_initial_cycle(),
        }
    }
}

impl RawConfigFile {
    /// Overlay command-line flags on top of the file values.
    ///
    /// Scalars given on the CLI replace the file value; `--exclude` entries
    /// are appended to the file's list.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(ref dir) = args.dir {
            self.watch.dir = Some(dir.clone());
        }
        if let Some(q) = args.coalesce {
            self.watch.quiescence = Some(q);
        }
        self.watch.exclude.extend(args.exclude.iter().cloned());
        if args.include_hidden {
            self.watch.include_hidden = true;
        }
        if let Some(ref cmd) = args.watch_cmd {
            self.watch.command = Some(cmd.clone());
        }

        if let Some(n) = args.retries {
            self.retry.max_attempts = Some(n);
        }
        if let Some(d) = args.retry_delay {
            self.retry.delay = Some(d);
        }

        if let Some(ref build) = args.build {
            self.commands.build = Some(build.clone());
        }
        if let Some(ref run) = args.run {
            self.commands.run = Some(run.clone());
        }
        if args.no_initial {
            self.commands.initial_cycle = false;
        }
    }
}

/// Bounded restart policy for a failed change source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive restarts allowed; 0 means the first failure is fatal.
    pub max_attempts: u32,
    pub delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Never restart.
    pub fn fatal() -> Self {
        Self {
            max_attempts: 0,
            delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Backoff before restart number `attempt` (1-based): `delay * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fatal()
    }
}

/// Where change notifications come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// In-process recursive watcher (`notify`).
    Native,
    /// External process printing one changed path per line.
    Command(String),
}

/// Validated, fully-resolved settings the runtime is built from.
///
/// Only [`Settings::try_from`] (see `validate.rs`) and test helpers construct
/// this; every field already satisfies its invariant.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dir: PathBuf,
    pub quiescence: Duration,
    pub exclude: Vec<String>,
    pub include_hidden: bool,
    pub source: SourceSpec,
    pub retry: RetryPolicy,
    /// `None` when no build step is configured.
    pub build: Option<String>,
    /// `None` when no run step is configured.
    pub run: Option<String>,
    pub initial_cycle: bool,
}
