// src/config/validate.rs

use std::path::PathBuf;

use crate::config::model::{
    DEFAULT_QUIESCENCE, RawConfigFile, RetryPolicy, Settings, SourceSpec,
};
use crate::errors::{Result, WatchrunError};
use crate::types::HumanDuration;

impl TryFrom<RawConfigFile> for Settings {
    type Error = WatchrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;

        let quiescence = raw
            .watch
            .quiescence
            .map(|q| q.as_duration())
            .unwrap_or(DEFAULT_QUIESCENCE);

        let defaults = RetryPolicy::fatal();
        let retry = RetryPolicy {
            max_attempts: raw.retry.max_attempts.unwrap_or(defaults.max_attempts),
            delay: raw
                .retry
                .delay
                .map(|d| d.as_duration())
                .unwrap_or(defaults.delay),
            max_delay: raw
                .retry
                .max_delay
                .map(|d| d.as_duration())
                .unwrap_or(defaults.max_delay),
        };

        let source = match non_empty(raw.watch.command) {
            Some(cmd) => SourceSpec::Command(cmd),
            None => SourceSpec::Native,
        };

        Ok(Settings {
            dir: raw.watch.dir.unwrap_or_else(|| PathBuf::from(".")),
            quiescence,
            exclude: raw
                .watch
                .exclude
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect(),
            include_hidden: raw.watch.include_hidden,
            source,
            retry,
            build: non_empty(raw.commands.build),
            run: non_empty(raw.commands.run),
            initial_cycle: raw.commands.initial_cycle,
        })
    }
}

/// Check the invariants `Settings` relies on without consuming the config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_command(cfg)?;
    validate_watch(cfg)?;
    validate_retry(cfg)?;
    Ok(())
}

fn ensure_has_command(cfg: &RawConfigFile) -> Result<()> {
    let blank = |c: &Option<String>| c.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank(&cfg.commands.build) && blank(&cfg.commands.run) {
        return Err(WatchrunError::ConfigError(
            "at least one of `build` or `run` must be set".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if let Some(q) = cfg.watch.quiescence {
        if q.as_duration().is_zero() {
            return Err(WatchrunError::ConfigError(
                "[watch].quiescence must be greater than zero".to_string(),
            ));
        }
    }

    if let Some(ref dir) = cfg.watch.dir {
        if !dir.is_dir() {
            return Err(WatchrunError::ConfigError(format!(
                "watch directory {:?} does not exist or is not a directory",
                dir
            )));
        }
    }

    Ok(())
}

/// Compares the delays as they will be used, defaults included: a lone
/// `delay` above the default `max_delay` would otherwise be capped silently.
fn validate_retry(cfg: &RawConfigFile) -> Result<()> {
    let defaults = RetryPolicy::fatal();
    let delay = cfg.retry.delay.unwrap_or(HumanDuration(defaults.delay));
    let max = cfg
        .retry
        .max_delay
        .unwrap_or(HumanDuration(defaults.max_delay));

    if delay.as_duration() > max.as_duration() {
        return Err(WatchrunError::ConfigError(format!(
            "[retry].delay ({delay}) must not exceed [retry].max_delay ({max})"
        )));
    }
    Ok(())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
