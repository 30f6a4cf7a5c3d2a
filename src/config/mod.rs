// src/config/mod.rs

//! Configuration loading and validation for watchrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and the validated `Settings` (`model.rs`).
//! - Load a config file from disk and overlay CLI flags (`loader.rs`).
//! - Validate the invariants the runtime relies on (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, resolve_settings};
pub use model::{
    CommandsSection, RawConfigFile, RetryPolicy, RetrySection, Settings, SourceSpec,
    WatchSection, DEFAULT_QUIESCENCE,
};
pub use validate::validate_config;
