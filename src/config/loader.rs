use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::CliArgs;
use crate::config::model::{RawConfigFile, Settings};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it on its own.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let raw_config = load_from_path(&path)?;
    Settings::try_from(raw_config)
}

/// Resolve the settings for a CLI invocation.
///
/// - `--config PATH` must exist and parse.
/// - Without `--config`, [`default_config_path`] is used if present,
///   otherwise the flags alone describe the configuration.
/// - Flags override file values, then the result is validated.
pub fn resolve_settings(args: &CliArgs) -> Result<Settings> {
    let mut raw = match args.config {
        Some(ref path) => load_from_path(path)?,
        None => {
            let path = default_config_path();
            if path.is_file() {
                tracing::debug!(?path, "loading default config file");
                load_from_path(&path)?
            } else {
                RawConfigFile::default()
            }
        }
    };

    raw.apply_cli(args);
    Settings::try_from(raw)
}

/// Config file picked up from the working directory when `--config` is absent.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Watchrun.toml")
}
