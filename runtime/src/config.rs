//! Engine and monitor configuration.
//!
//! Everything here is supplied by the caller; the engine never reads a config
//! file. Defaults mirror what works on typical campus networks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted for the username when no flag is given.
pub const USER_ENV: &str = "CAMPUS_USER";

/// Environment variable consulted for the password when no flag is given.
pub const PASS_ENV: &str = "CAMPUS_PASS";

/// Desktop browser User-Agent; some portals refuse unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/118.0 Safari/537.36";

/// Plain-HTTP sites that a captive portal will intercept.
pub const DEFAULT_PROBE_URLS: [&str; 3] = [
    "http://www.douyin.com/",
    "http://www.oppo.com/",
    "http://www.baidu.com/",
];

/// A reachability probe target and the status it answers with when the
/// network is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEndpoint {
    pub url: String,
    pub expected_status: u16,
}

impl ProbeEndpoint {
    pub fn new(url: impl Into<String>, expected_status: u16) -> Self {
        Self {
            url: url.into(),
            expected_status,
        }
    }

    /// The built-in endpoint list, in priority order.
    pub fn defaults() -> Vec<Self> {
        DEFAULT_PROBE_URLS
            .iter()
            .map(|url| Self::new(*url, 200))
            .collect()
    }
}

/// Settings shared by every engine operation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Endpoints checked by the reachability prober, first success wins.
    pub reachability_endpoints: Vec<ProbeEndpoint>,
    /// URLs probed for a captive-portal redirect, first redirect wins.
    pub probe_urls: Vec<String>,
    /// Fixed login page; bypasses redirect discovery when set.
    pub portal_url: Option<String>,
    /// Username field name that skips inference.
    pub user_field: Option<String>,
    /// Password field name that skips inference.
    pub pass_field: Option<String>,
    /// Static form parameters merged into every submission.
    pub extra_params: Vec<(String, String)>,
    /// Number of login attempts per connect cycle.
    pub retries: u32,
    /// Delay between login attempts.
    pub retry_interval: Duration,
    pub reachability_timeout: Duration,
    pub discovery_timeout: Duration,
    pub login_timeout: Duration,
    /// Wait before the second reachability check after an ambiguous response.
    pub settle_delay: Duration,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reachability_endpoints: ProbeEndpoint::defaults(),
            probe_urls: DEFAULT_PROBE_URLS.iter().map(|u| u.to_string()).collect(),
            portal_url: None,
            user_field: None,
            pass_field: None,
            extra_params: Vec::new(),
            retries: 3,
            retry_interval: Duration::from_secs(3),
            reachability_timeout: Duration::from_secs(5),
            discovery_timeout: Duration::from_secs(6),
            login_timeout: Duration::from_secs(8),
            settle_delay: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Timing and hysteresis for the monitoring loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Wait between checks while online, and after every login cycle.
    pub poll_interval: Duration,
    /// Wait between re-checks while failures are below the threshold.
    pub suspect_interval: Duration,
    /// Consecutive failed checks that trigger a login cycle.
    pub failure_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(20),
            suspect_interval: Duration::from_secs(5),
            failure_threshold: 3,
        }
    }
}

/// Parse `key=value` items into ordered pairs. Items without `=` are skipped.
pub fn parse_extra_params<S: AsRef<str>>(items: &[S]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for item in items {
        let Some((key, value)) = item.as_ref().split_once('=') else {
            continue;
        };
        if let Some(existing) = out.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value.to_string();
        } else {
            out.push((key.to_string(), value.to_string()));
        }
    }
    out
}

/// Data directory for optional artifacts such as the event log.
pub fn campus_login_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".campus-login")
}

/// Default location of the JSONL event log.
pub fn default_event_log_path() -> PathBuf {
    campus_login_home().join("events.jsonl")
}
