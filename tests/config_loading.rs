// tests/config_loading.rs

mod common;
use crate::common::builders::SettingsBuilder;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};

use watchrun::cli::CliArgs;
use watchrun::config::{load_and_validate, load_from_path, resolve_settings, Settings, SourceSpec};
use watchrun::errors::WatchrunError;
use watchrun::types::{parse_duration, HumanDuration};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_file_loads() {
    let dir = TempDir::new().unwrap();
    let file = config_file(&format!(
        r#"
[watch]
dir = "{}"
quiescence = "250ms"
exclude = ["target/", ""]
command = "fswatch -r ."

[retry]
max_attempts = 3
delay = "1s"
max_delay = "4s"

[commands]
build = "cargo build"
run = "./target/debug/app"
initial_cycle = false
"#,
        dir.path().display()
    ));

    let settings = load_and_validate(file.path()).unwrap();

    assert_eq!(settings.dir, dir.path());
    assert_eq!(settings.quiescence, Duration::from_millis(250));
    assert_eq!(settings.exclude, vec!["target/".to_string()]);
    assert_eq!(settings.source, SourceSpec::Command("fswatch -r .".to_string()));
    assert_eq!(settings.retry.max_attempts, 3);
    assert_eq!(settings.retry.delay, Duration::from_secs(1));
    assert_eq!(settings.retry.max_delay, Duration::from_secs(4));
    assert_eq!(settings.build.as_deref(), Some("cargo build"));
    assert_eq!(settings.run.as_deref(), Some("./target/debug/app"));
    assert!(!settings.initial_cycle);
}

#[test]
fn minimal_config_gets_defaults() {
    let file = config_file(
        r#"
[commands]
run = "./server"
"#,
    );

    let settings = load_and_validate(file.path()).unwrap();

    assert_eq!(settings.dir, PathBuf::from("."));
    assert_eq!(settings.quiescence, Duration::from_millis(100));
    assert_eq!(settings.source, SourceSpec::Native);
    assert_eq!(settings.retry.max_attempts, 0, "watcher failure is fatal by default");
    assert_eq!(settings.build, None);
    assert!(settings.initial_cycle);
}

#[test]
fn missing_commands_is_config_error() {
    let file = config_file(
        r#"
[commands]
build = "   "
"#,
    );

    match load_and_validate(file.path()) {
        Err(WatchrunError::ConfigError(msg)) => {
            assert!(msg.contains("at least one of `build` or `run`"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn zero_quiescence_is_rejected() {
    let raw = SettingsBuilder::new().run_cmd("./app").quiescence("0ms").raw();

    match Settings::try_from(raw) {
        Err(WatchrunError::ConfigError(msg)) => assert!(msg.contains("quiescence")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn missing_watch_dir_is_rejected() {
    let raw = SettingsBuilder::new()
        .run_cmd("./app")
        .dir(std::path::Path::new("/definitely/not/here"))
        .raw();

    match Settings::try_from(raw) {
        Err(WatchrunError::ConfigError(msg)) => assert!(msg.contains("does not exist")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn retry_delay_above_max_is_rejected() {
    let file = config_file(
        r#"
[retry]
delay = "5s"
max_delay = "1s"

[commands]
run = "./app"
"#,
    );

    match load_and_validate(file.path()) {
        Err(WatchrunError::ConfigError(msg)) => assert!(msg.contains("max_delay")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn lone_retry_delay_above_default_max_is_rejected() {
    let raw = SettingsBuilder::new().run_cmd("./app").retry_delay("20s").raw();

    match Settings::try_from(raw) {
        Err(WatchrunError::ConfigError(msg)) => {
            assert!(msg.contains("20s"));
            assert!(msg.contains("max_delay (10s)"));
        }
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn lone_max_retry_delay_below_default_delay_is_rejected() {
    let raw = SettingsBuilder::new()
        .run_cmd("./app")
        .max_retry_delay("100ms")
        .raw();

    assert!(matches!(
        Settings::try_from(raw),
        Err(WatchrunError::ConfigError(_))
    ));
}

#[test]
fn retry_delay_flag_within_default_max_is_accepted() {
    let args = CliArgs {
        run: Some("./app".to_string()),
        retry_delay: Some(HumanDuration(Duration::from_secs(2))),
        ..CliArgs::default()
    };

    let settings = resolve_settings(&args).unwrap();

    assert_eq!(settings.retry.delay, Duration::from_secs(2));
    assert_eq!(settings.retry.max_delay, Duration::from_secs(10));
}

#[test]
fn unknown_field_is_toml_error() {
    let file = config_file(
        r#"
[commands]
run = "./app"
rerun = true
"#,
    );

    match load_from_path(file.path()) {
        Err(WatchrunError::TomlError(_)) => {}
        other => panic!("Expected TomlError, got: {:?}", other),
    }
}

#[test]
fn bad_duration_is_toml_error() {
    let file = config_file(
        r#"
[watch]
quiescence = "fast"

[commands]
run = "./app"
"#,
    );

    assert!(matches!(
        load_from_path(file.path()),
        Err(WatchrunError::TomlError(_))
    ));
}

#[test]
fn missing_config_file_is_io_error() {
    assert!(matches!(
        load_from_path("/definitely/not/here/Watchrun.toml"),
        Err(WatchrunError::IoError(_))
    ));
}

#[test]
fn cli_flags_override_file() {
    let dir = TempDir::new().unwrap();
    let file = config_file(
        r#"
[watch]
quiescence = "1s"
exclude = ["target/"]

[commands]
build = "make"
run = "./old"
"#,
    );

    let args = CliArgs {
        config: Some(file.path().to_path_buf()),
        dir: Some(dir.path().to_path_buf()),
        run: Some("./new".to_string()),
        coalesce: Some(HumanDuration(Duration::from_millis(20))),
        exclude: vec!["dist/".to_string()],
        retries: Some(2),
        no_initial: true,
        ..CliArgs::default()
    };

    let settings = resolve_settings(&args).unwrap();

    assert_eq!(settings.dir, dir.path());
    assert_eq!(settings.quiescence, Duration::from_millis(20));
    assert_eq!(settings.exclude, vec!["target/".to_string(), "dist/".to_string()]);
    assert_eq!(settings.build.as_deref(), Some("make"));
    assert_eq!(settings.run.as_deref(), Some("./new"));
    assert_eq!(settings.retry.max_attempts, 2);
    assert!(!settings.initial_cycle);
}

#[test]
fn flags_alone_are_enough() {
    let dir = TempDir::new().unwrap();
    let args = CliArgs {
        config: None,
        dir: Some(dir.path().to_path_buf()),
        build: Some("make".to_string()),
        watch_cmd: Some("inotifywait -m -r .".to_string()),
        ..CliArgs::default()
    };

    let settings = resolve_settings(&args).unwrap();

    assert_eq!(settings.run, None);
    assert_eq!(
        settings.source,
        SourceSpec::Command("inotifywait -m -r .".to_string())
    );
}

#[test]
fn explicit_missing_config_path_fails() {
    let args = CliArgs {
        config: Some(PathBuf::from("/definitely/not/here.toml")),
        run: Some("./app".to_string()),
        ..CliArgs::default()
    };

    assert!(matches!(
        resolve_settings(&args),
        Err(WatchrunError::IoError(_))
    ));
}

#[test]
fn durations_parse_and_display() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5 parsecs").is_err());
    assert_eq!(
        parse_duration("9999999999999999h"),
        Err("duration '9999999999999999h' is too large".to_string())
    );
    assert!(parse_duration("18446744073709551615m").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s"),
        Ok(Duration::from_secs(u64::MAX))
    );

    assert_eq!(HumanDuration(Duration::from_millis(100)).to_string(), "100ms");
    assert_eq!(HumanDuration(Duration::from_secs(10)).to_string(), "10s");
    assert_eq!(HumanDuration(Duration::from_millis(1500)).to_string(), "1500ms");
}
