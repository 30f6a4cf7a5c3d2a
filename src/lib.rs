// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;
pub mod watch;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{resolve_settings, Settings, SourceSpec};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, TriggerReason};
use crate::exec::{CommandBackend, Supervisor};
use crate::types::{ChangeSignal, HumanDuration};
use crate::watch::{source_from_settings, spawn_debouncer, spawn_source, SignalSender};

/// Capacity of the change-signal buffer. Overflowing signals are dropped,
/// which the debouncer tolerates.
const SIGNAL_BUFFER: usize = 16;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings resolution (config file + flags)
/// - change source (with retry) and debouncer
/// - cycle runtime and process supervisor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = resolve_settings(&args)?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Change source -> debouncer -> runtime.
    let (signal_tx, signal_rx) = mpsc::channel::<ChangeSignal>(SIGNAL_BUFFER);
    let _source = spawn_source(
        source_from_settings(&settings),
        settings.retry,
        SignalSender::new(signal_tx),
        rt_tx.clone(),
    );
    let _debouncer = spawn_debouncer(settings.quiescence, signal_rx, rt_tx.clone());

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    if settings.initial_cycle {
        info!("triggering initial cycle");
        rt_tx
            .send(RuntimeEvent::Triggered {
                reason: TriggerReason::Startup,
            })
            .await?;
    }

    let backend = CommandBackend::new(
        settings.build.clone(),
        settings.run.clone(),
        Supervisor::new(),
    );

    let runtime = Runtime::new(CoreRuntime::new(), rt_rx, backend);
    runtime.run().await?;
    Ok(())
}

/// Simple dry-run output: print the resolved settings.
fn print_dry_run(settings: &Settings) {
    println!("watchrun dry-run");
    println!("  dir: {}", settings.dir.display());
    println!("  quiescence: {}", HumanDuration(settings.quiescence));
    match settings.source {
        SourceSpec::Native => println!("  source: built-in watcher"),
        SourceSpec::Command(ref cmd) => println!("  source: {cmd}"),
    }
    if !settings.exclude.is_empty() {
        println!("  exclude: {:?}", settings.exclude);
    }
    if settings.include_hidden {
        println!("  include_hidden: true");
    }
    println!(
        "  retry: max_attempts = {}, delay = {}, max_delay = {}",
        settings.retry.max_attempts,
        HumanDuration(settings.retry.delay),
        HumanDuration(settings.retry.max_delay)
    );
    println!("  build: {}", settings.build.as_deref().unwrap_or("(none)"));
    println!("  run: {}", settings.run.as_deref().unwrap_or("(none)"));
    println!("  initial_cycle: {}", settings.initial_cycle);

    debug!("dry-run complete (no execution)");
}
