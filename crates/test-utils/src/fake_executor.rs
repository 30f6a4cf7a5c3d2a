use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, Semaphore};
use watchrun::errors::{Result, WatchrunError};
use watchrun::exec::ExecutorBackend;
use watchrun::types::BuildOutcome;

/// One step observed by [`RecordingBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Launch,
    Shutdown,
}

#[derive(Debug, Default)]
struct State {
    log: Vec<Step>,
    /// Outcomes for upcoming builds; `Success` once exhausted.
    outcomes: VecDeque<BuildOutcome>,
    fail_launch: bool,
}

/// A fake executor that:
/// - records every build / launch / shutdown call
/// - returns scripted build outcomes
/// - optionally holds each build until the test releases it, so triggers can
///   be injected while a cycle is in flight.
#[derive(Clone)]
pub struct RecordingBackend {
    state: Arc<Mutex<State>>,
    gate: Option<Arc<Semaphore>>,
    build_started: Arc<Notify>,
}

impl RecordingBackend {
    /// Builds complete immediately.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            gate: None,
            build_started: Arc::new(Notify::new()),
        }
    }

    /// Builds wait for [`RecordingBackend::release_build`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = BuildOutcome>) -> Self {
        self.state.lock().unwrap().outcomes.extend(outcomes);
        self
    }

    pub fn failing_launch(self) -> Self {
        self.state.lock().unwrap().fail_launch = true;
        self
    }

    /// Let one gated build finish.
    pub fn release_build(&self) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(1);
        }
    }

    /// Wait until a build has started (and is possibly held by the gate).
    pub async fn wait_build_started(&self) {
        self.build_started.notified().await;
    }

    pub fn log(&self) -> Vec<Step> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn count(&self, step: Step) -> usize {
        self.log().iter().filter(|s| **s == step).count()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorBackend for RecordingBackend {
    fn build(&self) -> Pin<Box<dyn Future<Output = Result<BuildOutcome>> + Send + '_>> {
        Box::pin(async move {
            let outcome = {
                let mut state = self.state.lock().unwrap();
                state.log.push(Step::Build);
                state.outcomes.pop_front().unwrap_or(BuildOutcome::Success)
            };
            self.build_started.notify_one();

            if let Some(ref gate) = self.gate {
                gate.acquire()
                    .await
                    .map_err(anyhow::Error::from)?
                    .forget();
            }

            Ok(outcome)
        })
    }

    fn launch(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let fail = {
                let mut state = self.state.lock().unwrap();
                state.log.push(Step::Launch);
                state.fail_launch
            };
            if fail {
                return Err(WatchrunError::ConfigError("scripted launch failure".to_string()));
            }
            Ok(())
        })
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().unwrap().log.push(Step::Shutdown);
        })
    }
}
