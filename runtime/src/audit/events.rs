//! Semantic engine events and the sinks that receive them.
//!
//! The engine never touches a process-wide logger. Every operation emits
//! [`EngineEvent`]s into an [`EventSink`] handed to it by the caller, which
//! decides whether they go to `tracing`, a JSONL file, or a test buffer.

use crate::extraction::form::Payload;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// How loudly an event should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Something the engine did or observed.
///
/// Payloads carried here are always redacted before construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A reachability probe got an answer.
    ProbeResult {
        url: String,
        status: u16,
        expected: u16,
        elapsed_ms: u64,
    },
    /// A reachability probe could not complete.
    ProbeFailed { url: String, error: String },
    /// A discovery probe got an answer.
    PortalProbe { url: String, status: u16 },
    /// A discovery probe could not complete.
    PortalProbeFailed { url: String, error: String },
    /// A redirect to the captive portal was captured.
    PortalFound { location: String },
    /// No probe produced a redirect.
    PortalNotFound,
    /// A fixed portal URL was used instead of discovery.
    PortalFixed { url: String },
    LoginPageOpened { url: String, status: u16 },
    LoginPageFailed { url: String, error: String },
    /// The login form was chosen out of `form_count` candidates.
    FormFound {
        form_count: usize,
        action: String,
        method: String,
        fields: Vec<String>,
    },
    NoFormFound { url: String },
    FieldsResolved {
        user_field: String,
        pass_field: String,
        overridden: bool,
    },
    FieldsUnresolved { fields: Vec<String> },
    SubmissionPrepared {
        url: String,
        method: String,
        variants: usize,
        payload: Payload,
    },
    VariantAttempt {
        label: String,
        login_type: Option<String>,
    },
    VariantTransportFailed { label: String, error: String },
    ResponseTitle { label: String, title: String },
    /// The response body carried a failure keyword.
    PortalRejected { label: String },
    FallbackAttempt {
        user_field: String,
        pass_field: String,
        url: String,
    },
    LoginSucceeded { label: String, after_delay: bool },
    LoginExhausted { attempts: usize },
    AlreadyOnline,
    AttemptStarted { attempt: u32, total: u32 },
    MonitorStarted { poll_interval_ms: u64 },
    MonitorCheckFailed { failures: u32, threshold: u32 },
    MonitorRecovered,
    MonitorTriggered { failures: u32 },
    MonitorLoginSucceeded,
    MonitorLoginFailed { poll_interval_ms: u64 },
    MonitorIterationError { error: String },
    MonitorStopped,
}

impl EngineEvent {
    /// Severity used when the event is rendered.
    pub fn severity(&self) -> Severity {
        use EngineEvent::*;
        match self {
            ProbeResult { .. }
            | ProbeFailed { .. }
            | PortalProbeFailed { .. }
            | FormFound { .. }
            | SubmissionPrepared { .. }
            | VariantAttempt { .. }
            | ResponseTitle { .. }
            | PortalRejected { .. }
            | MonitorCheckFailed { .. } => Severity::Debug,
            PortalProbe { .. }
            | PortalFound { .. }
            | PortalFixed { .. }
            | LoginPageOpened { .. }
            | FieldsResolved { .. }
            | FallbackAttempt { .. }
            | LoginSucceeded { .. }
            | AlreadyOnline
            | AttemptStarted { .. }
            | MonitorStarted { .. }
            | MonitorRecovered
            | MonitorLoginSucceeded
            | MonitorStopped => Severity::Info,
            PortalNotFound
            | NoFormFound { .. }
            | LoginExhausted { .. }
            | MonitorTriggered { .. }
            | MonitorLoginFailed { .. }
            | VariantTransportFailed { .. } => Severity::Warn,
            LoginPageFailed { .. } | FieldsUnresolved { .. } | MonitorIterationError { .. } => {
                Severity::Error
            }
        }
    }

    /// Stable snake_case name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        use EngineEvent::*;
        match self {
            ProbeResult { .. } => "probe_result",
            ProbeFailed { .. } => "probe_failed",
            PortalProbe { .. } => "portal_probe",
            PortalProbeFailed { .. } => "portal_probe_failed",
            PortalFound { .. } => "portal_found",
            PortalNotFound => "portal_not_found",
            PortalFixed { .. } => "portal_fixed",
            LoginPageOpened { .. } => "login_page_opened",
            LoginPageFailed { .. } => "login_page_failed",
            FormFound { .. } => "form_found",
            NoFormFound { .. } => "no_form_found",
            FieldsResolved { .. } => "fields_resolved",
            FieldsUnresolved { .. } => "fields_unresolved",
            SubmissionPrepared { .. } => "submission_prepared",
            VariantAttempt { .. } => "variant_attempt",
            VariantTransportFailed { .. } => "variant_transport_failed",
            ResponseTitle { .. } => "response_title",
            PortalRejected { .. } => "portal_rejected",
            FallbackAttempt { .. } => "fallback_attempt",
            LoginSucceeded { .. } => "login_succeeded",
            LoginExhausted { .. } => "login_exhausted",
            AlreadyOnline => "already_online",
            AttemptStarted { .. } => "attempt_started",
            MonitorStarted { .. } => "monitor_started",
            MonitorCheckFailed { .. } => "monitor_check_failed",
            MonitorRecovered => "monitor_recovered",
            MonitorTriggered { .. } => "monitor_triggered",
            MonitorLoginSucceeded => "monitor_login_succeeded",
            MonitorLoginFailed { .. } => "monitor_login_failed",
            MonitorIterationError { .. } => "monitor_iteration_error",
            MonitorStopped => "monitor_stopped",
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EngineEvent::*;
        match self {
            ProbeResult {
                url,
                status,
                expected,
                elapsed_ms,
            } => write!(f, "probe {url} -> {status} (expect {expected}) in {elapsed_ms} ms"),
            ProbeFailed { url, error } => write!(f, "probe {url} failed: {error}"),
            PortalProbe { url, status } => write!(f, "portal probe {url} -> {status}"),
            PortalProbeFailed { url, error } => write!(f, "portal probe {url} failed: {error}"),
            PortalFound { location } => write!(f, "captured captive portal redirect: {location}"),
            PortalNotFound => write!(f, "no captive portal redirect captured"),
            PortalFixed { url } => write!(f, "using fixed portal {url}"),
            LoginPageOpened { url, status } => write!(f, "opened login page {url} ({status})"),
            LoginPageFailed { url, error } => write!(f, "failed to open login page {url}: {error}"),
            FormFound {
                form_count,
                action,
                method,
                fields,
            } => write!(
                f,
                "picked login form ({form_count} on page) action={action:?} method={method} fields={fields:?}"
            ),
            NoFormFound { url } => write!(f, "no form on {url}, trying direct submit"),
            FieldsResolved {
                user_field,
                pass_field,
                overridden,
            } => write!(
                f,
                "credential fields user={user_field} pass={pass_field}{}",
                if *overridden { " (override)" } else { "" }
            ),
            FieldsUnresolved { fields } => {
                write!(f, "could not identify username/password fields in {fields:?}")
            }
            SubmissionPrepared {
                url,
                method,
                variants,
                payload,
            } => write!(
                f,
                "submitting to {url} (method={method}, {variants} variants) payload={payload}"
            ),
            VariantAttempt { label, login_type } => write!(
                f,
                "trying mode={label} loginType={}",
                login_type.as_deref().unwrap_or("-")
            ),
            VariantTransportFailed { label, error } => {
                write!(f, "submit failed (mode={label}): {error}")
            }
            ResponseTitle { label, title } => write!(f, "response title (mode={label}): {title}"),
            PortalRejected { label } => write!(f, "portal suggests failure (mode={label})"),
            FallbackAttempt {
                user_field,
                pass_field,
                url,
            } => write!(f, "fallback submit with fields ({user_field}, {pass_field}) to {url}"),
            LoginSucceeded { label, after_delay } => write!(
                f,
                "login successful (mode={label}){}",
                if *after_delay { " after delay" } else { "" }
            ),
            LoginExhausted { attempts } => {
                write!(f, "all {attempts} login attempts failed")
            }
            AlreadyOnline => write!(f, "already online, no login needed"),
            AttemptStarted { attempt, total } => write!(f, "login attempt {attempt}/{total}"),
            MonitorStarted { poll_interval_ms } => {
                write!(f, "monitoring reachability every {poll_interval_ms} ms")
            }
            MonitorCheckFailed {
                failures,
                threshold,
            } => write!(f, "reachability check failed ({failures}/{threshold})"),
            MonitorRecovered => write!(f, "network recovered, failure count reset"),
            MonitorTriggered { failures } => {
                write!(f, "{failures} consecutive failed checks, triggering login")
            }
            MonitorLoginSucceeded => write!(f, "automatic login succeeded"),
            MonitorLoginFailed { poll_interval_ms } => {
                write!(f, "login cycle failed, retrying in {poll_interval_ms} ms")
            }
            MonitorIterationError { error } => write!(f, "monitor iteration error: {error}"),
            MonitorStopped => write!(f, "monitoring stopped"),
        }
    }
}

/// Receiver of engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &EngineEvent) {
        (**self).emit(event)
    }
}

/// Forwards events to `tracing` at their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &EngineEvent) {
        let name = event.name();
        match event.severity() {
            Severity::Debug => tracing::debug!(event = name, "{event}"),
            Severity::Info => tracing::info!(event = name, "{event}"),
            Severity::Warn => tracing::warn!(event = name, "{event}"),
            Severity::Error => tracing::error!(event = name, "{event}"),
        }
    }
}

/// Buffers events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of buffered events with the given name.
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Sends every event to each inner sink in turn.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
