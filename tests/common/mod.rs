#![allow(dead_code)]

pub use watchrun_test_utils::builders;
pub use watchrun_test_utils::fake_executor;
pub use watchrun_test_utils::{init_tracing, with_timeout};

use std::path::Path;
use std::time::Duration;

/// Poll `cond` every 10ms until it holds, panicking after `limit`.
pub async fn wait_until(limit: Duration, what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out after {limit:?} waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether `pid` names a live process. Zombies count as dead.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let signalable = std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !signalable {
        return false;
    }

    // A killed but not yet reaped process still answers `kill -0`.
    match std::process::Command::new("ps")
        .args(["-o", "stat=", "-p", &pid.to_string()])
        .output()
    {
        Ok(out) => {
            let stat = String::from_utf8_lossy(&out.stdout);
            let stat = stat.trim();
            !stat.is_empty() && !stat.starts_with('Z')
        }
        Err(_) => true,
    }
}

/// Read a pid written by a test command, waiting for the file to appear.
pub async fn read_pid_file(path: &Path) -> u32 {
    let parse = || {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
    };
    wait_until(Duration::from_secs(5), "pid file", || parse().is_some()).await;
    parse().unwrap()
}
