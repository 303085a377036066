//! Run state machine and the pause/stop aware waits built on it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::{ReqdeckError, Result};

/// How a collection's requests are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One at a time, in collection order, with a delay in between
    #[default]
    Sequential,
    /// All at once
    Parallel,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Sequential => "sequential",
            RunMode::Parallel => "parallel",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ReqdeckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(RunMode::Sequential),
            "parallel" => Ok(RunMode::Parallel),
            other => Err(ReqdeckError::Argument(format!(
                "Unknown run mode '{}' (expected sequential or parallel)",
                other
            ))),
        }
    }
}

/// Default pause between sequential requests
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Only used in sequential mode
    pub delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Sequential,
            delay: DEFAULT_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl RunState {
    /// Running or paused
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the current [`RunState`]; every transition goes through here
#[derive(Debug)]
pub(crate) struct RunControl {
    state: watch::Sender<RunState>,
}

impl RunControl {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self { state }
    }

    pub fn current(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn transition(
        &self,
        action: &'static str,
        allowed: impl Fn(RunState) -> bool,
        next: RunState,
    ) -> Result<()> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| {
            if !allowed(*state) {
                outcome = Err(ReqdeckError::InvalidTransition {
                    action,
                    state: state.to_string(),
                });
                return false;
            }
            let changed = *state != next;
            *state = next;
            changed
        });
        outcome
    }

    /// idle -> running
    pub fn begin(&self) -> Result<()> {
        self.transition("start", |s| s == RunState::Idle, RunState::Running)
    }

    /// running -> paused
    pub fn pause(&self) -> Result<()> {
        self.transition("pause", |s| s == RunState::Running, RunState::Paused)
    }

    /// paused -> running
    pub fn resume(&self) -> Result<()> {
        self.transition("resume", |s| s == RunState::Paused, RunState::Running)
    }

    /// running | paused -> stopped
    pub fn stop(&self) -> Result<()> {
        self.transition("stop", |s| s.is_active(), RunState::Stopped)
    }

    /// any -> idle
    pub fn reset(&self) {
        self.state.send_replace(RunState::Idle);
    }

    /// running | paused -> completed; false when the run was already halted
    pub fn finish(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_active() {
                *state = RunState::Completed;
                true
            } else {
                false
            }
        })
    }

    /// Block while paused; true when the run may go on
    pub async fn wait_while_paused(&self) -> bool {
        let mut rx = self.state.subscribe();
        rx.wait_for(|s| *s != RunState::Paused)
            .await
            .map(|s| *s == RunState::Running)
            .unwrap_or(false)
    }

    /// Resolves once the run is no longer running or paused
    pub async fn halted(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| !s.is_active()).await;
    }

    /// Sleep for `delay` of running time.
    ///
    /// Time spent paused does not count. Returns false as soon as the run
    /// is stopped or reset.
    pub async fn delay(&self, delay: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let mut remaining = delay;
        loop {
            let state = *rx.borrow_and_update();
            match state {
                RunState::Running => {}
                RunState::Paused => {
                    if rx.changed().await.is_err() {
                        return false;
                    }
                    continue;
                }
                _ => return false,
            }

            if remaining.is_zero() {
                return true;
            }

            let started = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(remaining) => return true,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                    remaining = remaining.saturating_sub(started.elapsed());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_transitions() {
        let control = RunControl::new();
        assert!(control.pause().is_err());
        assert!(control.stop().is_err());

        control.begin().unwrap();
        assert!(control.begin().is_err());
        control.pause().unwrap();
        assert_eq!(control.current(), RunState::Paused);
        control.resume().unwrap();
        control.stop().unwrap();
        assert_eq!(control.current(), RunState::Stopped);
        assert!(!control.finish());

        control.reset();
        assert_eq!(control.current(), RunState::Idle);
    }

    #[test]
    fn test_invalid_transition_message() {
        let control = RunControl::new();
        let err = control.resume().unwrap_err();
        assert_eq!(err.to_string(), "Cannot resume while the run is idle");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Parallel".parse::<RunMode>().unwrap(), RunMode::Parallel);
        assert!("random".parse::<RunMode>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_elapses() {
        let control = RunControl::new();
        control.begin().unwrap();
        let started = Instant::now();
        assert!(control.delay(Duration::from_millis(500)).await);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_excludes_paused_time() {
        let control = Arc::new(RunControl::new());
        control.begin().unwrap();

        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move {
                let started = Instant::now();
                let finished = control.delay(Duration::from_millis(300)).await;
                (finished, started.elapsed())
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        control.pause().unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        control.resume().unwrap();

        let (finished, elapsed) = waiter.await.unwrap();
        assert!(finished);
        assert!(elapsed >= Duration::from_millis(1300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_breaks_delay() {
        let control = Arc::new(RunControl::new());
        control.begin().unwrap();

        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.delay(Duration::from_secs(60)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        control.stop().unwrap();

        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_while_paused_returns_on_resume() {
        let control = Arc::new(RunControl::new());
        control.begin().unwrap();
        control.pause().unwrap();

        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.wait_while_paused().await })
        };
        tokio::task::yield_now().await;
        control.resume().unwrap();
        assert!(waiter.await.unwrap());
    }
}
