//! Connectivity watchdog.
//!
//! A small state machine over consecutive failed checks:
//!
//! ```text
//!   ONLINE --fail--> SUSPECT --fail x threshold--> LOGIN_TRIGGERED
//!     ^                 |                               |
//!     +----success------+------- counter reset ---------+
//! ```
//!
//! Every wait goes through the injected [`Clock`]; the [`StopHandle`] is
//! checked once per iteration.

use crate::audit::events::{EngineEvent, EventSink};
use crate::config::MonitorConfig;
use crate::live::clock::{Clock, StopHandle};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// What the monitor needs from the network.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> anyhow::Result<bool>;
    async fn find_portal(&self) -> anyhow::Result<Option<String>>;
    /// Full login cycle against `portal_url`, retries included.
    async fn login(&self, portal_url: &str) -> anyhow::Result<bool>;
}

/// Where the link stands after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Online,
    Suspect,
    LoginTriggered,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    pub consecutive_failures: u32,
}

impl MonitorState {
    /// Record a check result and return the resulting link state.
    pub fn record(&mut self, online: bool, threshold: u32) -> LinkState {
        if online {
            self.consecutive_failures = 0;
            return LinkState::Online;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold {
            LinkState::LoginTriggered
        } else {
            LinkState::Suspect
        }
    }
}

/// How one iteration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    Online,
    Suspect { failures: u32 },
    LoggedIn,
    PortalNotFound,
    LoginFailed,
    /// Error or panic caught at the iteration boundary.
    Errored(String),
}

pub struct Monitor<C> {
    target: C,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    state: MonitorState,
    stop: StopHandle,
    login_cycles: u32,
}

impl<C: Connectivity> Monitor<C> {
    pub fn new(
        target: C,
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            target,
            config,
            clock,
            sink,
            state: MonitorState::default(),
            stop: StopHandle::new(),
            login_cycles: 0,
        }
    }

    /// Handle that ends [`Monitor::run`] after the current iteration.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Login cycles started since construction.
    pub fn login_cycles(&self) -> u32 {
        self.login_cycles
    }

    pub fn target(&self) -> &C {
        &self.target
    }

    /// Run until the stop handle fires.
    pub async fn run(&mut self) {
        self.sink.emit(&EngineEvent::MonitorStarted {
            poll_interval_ms: self.config.poll_interval.as_millis() as u64,
        });
        while !self.stop.is_stopped() {
            let (_, delay) = self.step().await;
            if self.stop.is_stopped() {
                break;
            }
            self.clock.sleep(delay).await;
        }
        self.sink.emit(&EngineEvent::MonitorStopped);
    }

    /// One iteration. Returns how it ended and how long to wait before the
    /// next one. Never fails: errors and panics become
    /// [`IterationOutcome::Errored`] followed by the poll interval.
    pub async fn step(&mut self) -> (IterationOutcome, Duration) {
        let result = AssertUnwindSafe(self.iterate()).catch_unwind().await;
        let error = match result {
            Ok(Ok(step)) => return step,
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic_message(panic.as_ref()),
        };
        self.sink.emit(&EngineEvent::MonitorIterationError {
            error: error.clone(),
        });
        (IterationOutcome::Errored(error), self.config.poll_interval)
    }

    async fn iterate(&mut self) -> anyhow::Result<(IterationOutcome, Duration)> {
        let online = self.target.is_online().await?;
        let had_failures = self.state.consecutive_failures > 0;
        let threshold = self.config.failure_threshold.max(1);

        match self.state.record(online, threshold) {
            LinkState::Online => {
                if had_failures {
                    self.sink.emit(&EngineEvent::MonitorRecovered);
                }
                Ok((IterationOutcome::Online, self.config.poll_interval))
            }
            LinkState::Suspect => {
                let failures = self.state.consecutive_failures;
                self.sink
                    .emit(&EngineEvent::MonitorCheckFailed { failures, threshold });
                Ok((
                    IterationOutcome::Suspect { failures },
                    self.config.suspect_interval,
                ))
            }
            LinkState::LoginTriggered => {
                let failures = self.state.consecutive_failures;
                self.sink.emit(&EngineEvent::MonitorTriggered { failures });
                self.state.consecutive_failures = 0;
                self.login_cycles += 1;
                Ok((self.login_cycle().await?, self.config.poll_interval))
            }
        }
    }

    async fn login_cycle(&self) -> anyhow::Result<IterationOutcome> {
        let Some(portal_url) = self.target.find_portal().await? else {
            return Ok(IterationOutcome::PortalNotFound);
        };
        if self.target.login(&portal_url).await? {
            self.sink.emit(&EngineEvent::MonitorLoginSucceeded);
            Ok(IterationOutcome::LoggedIn)
        } else {
            self.sink.emit(&EngineEvent::MonitorLoginFailed {
                poll_interval_ms: self.config.poll_interval.as_millis() as u64,
            });
            Ok(IterationOutcome::LoginFailed)
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
