// tests/supervisor_processes.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, is_alive, read_pid_file, wait_until, with_timeout};

use std::error::Error;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use watchrun::engine::{CoreRuntime, Runtime, RuntimeEvent, TriggerReason};
use watchrun::exec::build::run_build;
use watchrun::exec::{CommandBackend, ExecutorBackend, Supervisor};
use watchrun::types::BuildOutcome;

type TestResult = Result<(), Box<dyn Error>>;

const PATIENCE: Duration = Duration::from_secs(5);

/// Command that backgrounds a long sleep, records its pid and waits on it.
fn forking_command(pid_file: &std::path::Path) -> String {
    format!("sleep 300 & echo $! > '{}'; wait", pid_file.display())
}

async fn assert_dies(pid: u32) {
    wait_until(PATIENCE, &format!("pid {pid} to die"), || !is_alive(pid)).await;
}

#[tokio::test]
async fn replace_stops_old_before_starting_new() -> TestResult {
    init_tracing();
    let supervisor = Supervisor::new();

    let first = with_timeout(supervisor.replace("sleep 30")).await?;
    let second = with_timeout(supervisor.replace("sleep 30")).await?;

    let first_exit = first.exit().ok_or("first process not reaped")?;
    assert!(first_exit.exited_at <= second.started_at());
    assert!(!is_alive(first.pid().ok_or("no pid")?));
    assert!(!second.has_exited());

    // The old waiter has long finished; it must not have cleared the successor.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(supervisor.current().map(|p| p.id()), Some(second.id()));

    with_timeout(supervisor.shutdown()).await;
    assert!(supervisor.current().is_none());
    assert!(second.has_exited());
    Ok(())
}

#[tokio::test]
async fn at_most_one_process_after_many_replaces() -> TestResult {
    init_tracing();
    let supervisor = Supervisor::new();

    let mut started = Vec::new();
    for _ in 0..5 {
        started.push(with_timeout(supervisor.replace("sleep 30")).await?);
    }

    let (last, older) = started.split_last().ok_or("nothing started")?;
    for p in older {
        assert!(p.has_exited(), "{} still running", p.id());
    }
    assert!(!last.has_exited());
    assert_eq!(supervisor.current().map(|p| p.id()), Some(last.id()));

    with_timeout(supervisor.shutdown()).await;
    Ok(())
}

#[tokio::test]
async fn concurrent_replaces_are_serialized() -> TestResult {
    init_tracing();
    let supervisor = Supervisor::new();

    let (a, b) = with_timeout(async {
        tokio::join!(supervisor.replace("sleep 30"), supervisor.replace("sleep 30"))
    })
    .await;
    let (a, b) = (a?, b?);

    let current = supervisor.current().ok_or("no current process")?;
    let (winner, loser) = if current.id() == a.id() { (&a, &b) } else { (&b, &a) };
    assert_eq!(current.id(), winner.id());
    assert!(loser.has_exited());
    assert!(!winner.has_exited());

    with_timeout(supervisor.shutdown()).await;
    Ok(())
}

#[tokio::test]
async fn stop_kills_forked_descendants() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let pid_file = dir.path().join("child.pid");
    let supervisor = Supervisor::new();

    let process = with_timeout(supervisor.replace(&forking_command(&pid_file))).await?;
    let grandchild = read_pid_file(&pid_file).await;
    assert!(is_alive(grandchild));

    let record = with_timeout(supervisor.stop(&process)).await;
    assert!(record.code != Some(0), "killed, not a clean exit");
    assert_dies(grandchild).await;

    // Stopping again just returns the same record.
    let again = with_timeout(supervisor.stop(&process)).await;
    assert_eq!(again, record);
    Ok(())
}

#[tokio::test]
async fn replace_kills_descendants_of_old_process() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let pid_file = dir.path().join("child.pid");
    let supervisor = Supervisor::new();

    with_timeout(supervisor.replace(&forking_command(&pid_file))).await?;
    let grandchild = read_pid_file(&pid_file).await;

    with_timeout(supervisor.replace("sleep 30")).await?;
    assert_dies(grandchild).await;

    with_timeout(supervisor.shutdown()).await;
    Ok(())
}

#[tokio::test]
async fn dropping_every_handle_tears_the_tree_down() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let pid_file = dir.path().join("child.pid");

    let supervisor = Supervisor::new();
    let process = with_timeout(supervisor.replace(&forking_command(&pid_file))).await?;
    let monitor = process.pid().ok_or("no pid")?;
    let grandchild = read_pid_file(&pid_file).await;

    // Same effect as the supervisor dying: the liveness pipe closes.
    drop(process);
    drop(supervisor);

    assert_dies(grandchild).await;
    assert_dies(monitor).await;
    Ok(())
}

#[tokio::test]
async fn self_exiting_process_clears_the_slot() -> TestResult {
    init_tracing();
    let supervisor = Supervisor::new();

    let process = with_timeout(supervisor.replace("exit 3")).await?;
    let record = with_timeout(process.wait()).await;

    assert_eq!(record.code, Some(3));
    wait_until(PATIENCE, "slot to clear", || supervisor.current().is_none()).await;
    Ok(())
}

#[tokio::test]
async fn unknown_command_is_reported_as_exit() -> TestResult {
    init_tracing();
    let supervisor = Supervisor::new();

    let process = with_timeout(supervisor.replace("definitely-not-a-command-xyz")).await?;
    let record = with_timeout(process.wait()).await;

    assert_eq!(record.code, Some(127));
    wait_until(PATIENCE, "slot to clear", || supervisor.current().is_none()).await;
    Ok(())
}

#[tokio::test]
async fn build_outcomes_follow_exit_status() -> TestResult {
    init_tracing();

    assert_eq!(run_build(None).await?, BuildOutcome::Skipped);
    assert_eq!(run_build(Some("true")).await?, BuildOutcome::Success);
    assert_eq!(run_build(Some("exit 7")).await?, BuildOutcome::Failed(7));
    Ok(())
}

#[tokio::test]
async fn dropping_build_kills_its_tree() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let pid_file = dir.path().join("build.pid");
    let cmd = forking_command(&pid_file);

    let build = tokio::spawn(async move { run_build(Some(&cmd)).await });
    let grandchild = read_pid_file(&pid_file).await;
    assert!(is_alive(grandchild));

    build.abort();
    assert!(with_timeout(build).await.is_err(), "build was cancelled");
    assert_dies(grandchild).await;
    Ok(())
}

#[tokio::test]
async fn backend_without_run_command_never_starts_a_process() -> TestResult {
    init_tracing();
    let backend = CommandBackend::new(
        Some("true".to_string()),
        Some("  ".to_string()),
        Supervisor::new(),
    );

    with_timeout(backend.launch()).await?;
    assert!(backend.supervisor().current().is_none());

    let outcome = with_timeout(backend.build()).await?;
    assert_eq!(outcome, BuildOutcome::Success);
    Ok(())
}

#[tokio::test]
async fn backend_without_build_command_skips_build() -> TestResult {
    init_tracing();
    let backend = CommandBackend::new(None, Some("sleep 30".to_string()), Supervisor::new());

    assert_eq!(with_timeout(backend.build()).await?, BuildOutcome::Skipped);

    with_timeout(backend.launch()).await?;
    let running = backend.supervisor().current().ok_or("run command not started")?;

    with_timeout(backend.shutdown()).await;
    assert!(backend.supervisor().current().is_none());
    assert!(running.has_exited());
    Ok(())
}

#[tokio::test]
async fn runtime_restarts_run_command_on_each_cycle() -> TestResult {
    init_tracing();
    let supervisor = Supervisor::new();
    let backend = CommandBackend::new(
        Some("true".to_string()),
        Some("sleep 30".to_string()),
        supervisor.clone(),
    );

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(Runtime::new(CoreRuntime::new(), rx, backend).run());

    tx.send(RuntimeEvent::Triggered {
        reason: TriggerReason::Startup,
    })
    .await?;
    wait_until(PATIENCE, "first run", || supervisor.current().is_some()).await;
    let first = supervisor.current().ok_or("no first process")?;

    tx.send(RuntimeEvent::Triggered {
        reason: TriggerReason::FileChange,
    })
    .await?;
    wait_until(PATIENCE, "replacement", || {
        supervisor.current().is_some_and(|p| p.id() != first.id())
    })
    .await;
    let second = supervisor.current().ok_or("no second process")?;
    assert!(first.has_exited());

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(handle).await??;

    assert!(supervisor.current().is_none());
    assert!(second.has_exited());
    Ok(())
}

#[tokio::test]
async fn failed_build_leaves_previous_process_running() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let marker = dir.path().join("builds.log");
    let broken = dir.path().join("broken");

    let supervisor = Supervisor::new();
    let build = format!(
        "echo build >> '{}'; test ! -e '{}'",
        marker.display(),
        broken.display()
    );
    let backend = CommandBackend::new(
        Some(build),
        Some("sleep 30".to_string()),
        supervisor.clone(),
    );

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(Runtime::new(CoreRuntime::new(), rx, backend).run());
    let builds = || {
        std::fs::read_to_string(&marker)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    };

    tx.send(RuntimeEvent::Triggered {
        reason: TriggerReason::Startup,
    })
    .await?;
    wait_until(PATIENCE, "first run", || supervisor.current().is_some()).await;
    let running = supervisor.current().ok_or("no process")?;

    std::fs::write(&broken, "")?;
    tx.send(RuntimeEvent::Triggered {
        reason: TriggerReason::FileChange,
    })
    .await?;
    wait_until(PATIENCE, "second build", || builds() == 2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(supervisor.current().map(|p| p.id()), Some(running.id()));
    assert!(!running.has_exited(), "failed build must not touch the running process");

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(handle).await??;
    assert!(running.has_exited());
    Ok(())
}
