//! HTTP session shared by every engine call.
//!
//! An `HttpSession` owns one cookie jar and two clients on top of it: a
//! direct client that never follows redirects (probes must see the portal's
//! 302 themselves) and a following client for page fetches and form
//! submissions. Cookies set by either client accumulate in the shared jar for
//! the lifetime of the session.

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::extraction::form::{FormMethod, Payload};

/// Monotonic counter for generating unique session IDs.
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Status codes treated as a redirect to the portal.
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// A request that never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after any redirects were followed.
    pub final_url: String,
    /// Header pairs with lowercase names.
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub elapsed: Duration,
}

impl HttpResponse {
    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status)
    }
}

/// Cookie-carrying HTTP context owned by the caller.
pub struct HttpSession {
    /// Unique session identifier.
    pub session_id: String,
    direct: Client,
    follow: Client,
}

impl HttpSession {
    /// Create a session whose requests all carry `user_agent`.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let jar = Arc::new(Jar::default());

        let direct = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Build)?;
        let follow = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::limited(10))
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Build)?;

        Ok(Self {
            session_id: format!("sess-{ts}-{counter}"),
            direct,
            follow,
        })
    }

    /// GET without following redirects.
    pub async fn probe(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let url = check_url(url)?;
        execute(self.direct.get(url.as_str()).timeout(timeout), url.as_str()).await
    }

    /// GET following redirects.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let url = check_url(url)?;
        execute(self.follow.get(url.as_str()).timeout(timeout), url.as_str()).await
    }

    /// Submit `payload` the way a browser would for `method`: POST as a
    /// urlencoded body, GET as query parameters. Redirects are followed.
    pub async fn submit(
        &self,
        method: FormMethod,
        url: &str,
        payload: &Payload,
        headers: &[(&str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let url = check_url(url)?;
        let mut request = match method {
            FormMethod::Post => self.follow.post(url.as_str()).form(payload.as_pairs()),
            FormMethod::Get => self.follow.get(url.as_str()).query(payload.as_pairs()),
        };
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        execute(request.timeout(timeout), url.as_str()).await
    }
}

fn check_url(url: &str) -> Result<url::Url, TransportError> {
    let parsed = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(TransportError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

async fn execute(request: RequestBuilder, url: &str) -> Result<HttpResponse, TransportError> {
    let started = Instant::now();
    // reqwest errors carry the full request URL, which for a GET submission
    // holds the password in its query. Only the caller's URL is kept.
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                source: e.without_url(),
            }
        }
    };

    let resp = request.send().await.map_err(map_err)?;
    let status = resp.status().as_u16();
    let final_url = resp.url().to_string();
    let headers = resp
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).to_string(),
            )
        })
        .collect();
    let body = resp.text().await.map_err(map_err)?;

    Ok(HttpResponse {
        status,
        final_url,
        headers,
        body,
        elapsed: started.elapsed(),
    })
}
