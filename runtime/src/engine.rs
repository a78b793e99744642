//! The engine facade: configuration, event sink, and clock bundled together.
//!
//! Callers own the [`HttpSession`] and hand it to every operation, so one
//! engine can drive several independent sessions.

use crate::acquisition::auth::{self, LoginRequest};
use crate::acquisition::http_session::{HttpSession, TransportError};
use crate::acquisition::{portal, probe};
use crate::audit::events::{EngineEvent, EventSink, TracingSink};
use crate::config::EngineConfig;
use crate::live::clock::{Clock, TokioClock};
use crate::live::monitor::Connectivity;
use crate::trust::credentials::Credentials;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Result of one connect cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    /// The network was reachable before anything was submitted.
    AlreadyOnline,
    /// No portal redirect was observed and none was configured.
    PortalNotFound,
    /// Login confirmed on the given 1-based attempt.
    LoggedIn { attempt: u32 },
    /// Every attempt ran out of variants.
    Failed { attempts: u32 },
}

impl ConnectOutcome {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::AlreadyOnline | Self::LoggedIn { .. })
    }
}

#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Engine that logs through `tracing` and sleeps in real time.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Fresh session with the configured User-Agent.
    pub fn new_session(&self) -> Result<HttpSession, TransportError> {
        HttpSession::new(&self.config.user_agent)
    }

    /// Probe the configured reachability endpoints.
    pub async fn is_reachable(&self, session: &HttpSession) -> bool {
        probe::is_reachable(
            session,
            &self.config.reachability_endpoints,
            self.config.reachability_timeout,
            self.sink(),
        )
        .await
    }

    /// The configured portal URL if set, otherwise redirect discovery over
    /// the configured probe URLs.
    pub async fn find_portal(&self, session: &HttpSession) -> Option<String> {
        if let Some(url) = &self.config.portal_url {
            self.sink
                .emit(&EngineEvent::PortalFixed { url: url.clone() });
            return Some(url.clone());
        }
        portal::find_portal(
            session,
            &self.config.probe_urls,
            self.config.discovery_timeout,
            self.sink(),
        )
        .await
    }

    /// One login attempt against `portal_url` with the configured field
    /// overrides and extra parameters.
    pub async fn login(
        &self,
        session: &HttpSession,
        portal_url: &str,
        credentials: &Credentials,
    ) -> bool {
        let request = LoginRequest {
            portal_url,
            credentials,
            user_field: self.config.user_field.as_deref(),
            pass_field: self.config.pass_field.as_deref(),
            extra_params: &self.config.extra_params,
            timeout: self.config.login_timeout,
        };
        auth::login(self, session, &request).await
    }

    /// Up to `retries` login attempts, `retry_interval` apart. Returns the
    /// 1-based attempt that succeeded; zero retries means no attempt.
    pub async fn login_with_retries(
        &self,
        session: &HttpSession,
        portal_url: &str,
        credentials: &Credentials,
    ) -> Option<u32> {
        let total = self.config.retries;
        for attempt in 1..=total {
            self.sink
                .emit(&EngineEvent::AttemptStarted { attempt, total });
            if self.login(session, portal_url, credentials).await {
                return Some(attempt);
            }
            if attempt < total {
                self.clock.sleep(self.config.retry_interval).await;
            }
        }
        None
    }

    /// Check, discover, and log in as needed.
    pub async fn connect(&self, session: &HttpSession, credentials: &Credentials) -> ConnectOutcome {
        if self.is_reachable(session).await {
            self.sink.emit(&EngineEvent::AlreadyOnline);
            return ConnectOutcome::AlreadyOnline;
        }

        let Some(portal_url) = self.find_portal(session).await else {
            return ConnectOutcome::PortalNotFound;
        };

        match self
            .login_with_retries(session, &portal_url, credentials)
            .await
        {
            Some(attempt) => ConnectOutcome::LoggedIn { attempt },
            None => ConnectOutcome::Failed {
                attempts: self.config.retries,
            },
        }
    }
}

/// An engine bound to one session and one set of credentials, as the
/// monitoring loop sees it.
pub struct PortalAgent {
    engine: Engine,
    session: HttpSession,
    credentials: Credentials,
}

impl PortalAgent {
    pub fn new(engine: Engine, session: HttpSession, credentials: Credentials) -> Self {
        Self {
            engine,
            session,
            credentials,
        }
    }
}

#[async_trait]
impl Connectivity for PortalAgent {
    async fn is_online(&self) -> anyhow::Result<bool> {
        Ok(self.engine.is_reachable(&self.session).await)
    }

    async fn find_portal(&self) -> anyhow::Result<Option<String>> {
        Ok(self.engine.find_portal(&self.session).await)
    }

    async fn login(&self, portal_url: &str) -> anyhow::Result<bool> {
        Ok(self
            .engine
            .login_with_retries(&self.session, portal_url, &self.credentials)
            .await
            .is_some())
    }
}
