// src/exec/build.rs

use anyhow::Context;
use tracing::{info, warn};

use crate::errors::Result;
use crate::exec::monitor::{spawn_monitored, wait_reaped, Output};
use crate::logging::progress;
use crate::types::BuildOutcome;

/// Run the build command to completion, streaming its output live.
///
/// `None` means no build step: trivially successful. The build runs behind a
/// liveness pipe too, so dropping this future kills the build's process tree.
pub async fn run_build(cmd: Option<&str>) -> Result<BuildOutcome> {
    let Some(cmd) = cmd else {
        return Ok(BuildOutcome::Skipped);
    };

    progress("attempting build...");
    info!(%cmd, "starting build");

    let mut build = spawn_monitored(cmd, Output::Inherit)?;
    let status = wait_reaped(&mut build.child, &mut build.closed)
        .await
        .with_context(|| format!("waiting for build command `{cmd}`"))?;

    if status.success() {
        info!(%cmd, "build succeeded");
        return Ok(BuildOutcome::Success);
    }

    let code = status.code().unwrap_or(-1);
    progress(format!("build failed (exit code {code})"));
    warn!(%cmd, exit_code = code, "build failed; skipping run");
    Ok(BuildOutcome::Failed(code))
}
