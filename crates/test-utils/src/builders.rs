#![allow(dead_code)]

use std::path::Path;

use watchrun::config::{RawConfigFile, Settings};
use watchrun::types::HumanDuration;

/// Builder for `RawConfigFile` / `Settings` to simplify test setup.
pub struct SettingsBuilder {
    config: RawConfigFile,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.config.watch.dir = Some(dir.to_path_buf());
        self
    }

    pub fn quiescence(mut self, q: &str) -> Self {
        let q: HumanDuration = q.parse().expect("valid duration literal in test");
        self.config.watch.quiescence = Some(q);
        self
    }

    pub fn exclude(mut self, substr: &str) -> Self {
        self.config.watch.exclude.push(substr.to_string());
        self
    }

    pub fn watch_command(mut self, cmd: &str) -> Self {
        self.config.watch.command = Some(cmd.to_string());
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = Some(n);
        self
    }

    pub fn retry_delay(mut self, d: &str) -> Self {
        let d: HumanDuration = d.parse().expect("valid duration literal in test");
        self.config.retry.delay = Some(d);
        self
    }

    pub fn max_retry_delay(mut self, d: &str) -> Self {
        let d: HumanDuration = d.parse().expect("valid duration literal in test");
        self.config.retry.max_delay = Some(d);
        self
    }

    pub fn build_cmd(mut self, cmd: &str) -> Self {
        self.config.commands.build = Some(cmd.to_string());
        self
    }

    pub fn run_cmd(mut self, cmd: &str) -> Self {
        self.config.commands.run = Some(cmd.to_string());
        self
    }

    pub fn initial_cycle(mut self, val: bool) -> Self {
        self.config.commands.initial_cycle = val;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> Settings {
        Settings::try_from(self.config).expect("Failed to build valid settings from builder")
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
