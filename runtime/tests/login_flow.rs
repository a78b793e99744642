//! End-to-end login flows against a mock captive portal.
//!
//! The mock gates a probe endpoint behind a flag: it redirects to the login
//! page until an accepted credential submission flips the flag, after which
//! it answers 200 like an open network.

use campus_login::acquisition::variants::md5_hex;
use campus_login::audit::events::{EngineEvent, FanoutSink, MemorySink};
use campus_login::audit::logger::JsonlSink;
use campus_login::config::{EngineConfig, ProbeEndpoint};
use campus_login::engine::{ConnectOutcome, Engine};
use campus_login::live::clock::RecordingClock;
use campus_login::trust::credentials::Credentials;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const REJECTED: &str = "<html><head><title>Error</title></head><body>login failed</body></html>";
const WELCOME: &str = "<html><head><title>Success</title></head><body>welcome</body></html>";

/// Probe endpoint: redirect to the portal while closed, 200 once open.
struct Gate {
    open: Arc<AtomicBool>,
    portal: String,
}

impl Respond for Gate {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        if self.open.load(Ordering::SeqCst) {
            ResponseTemplate::new(200).set_body_string("ok")
        } else {
            ResponseTemplate::new(302).insert_header("Location", self.portal.as_str())
        }
    }
}

/// Login endpoint: opens the gate when `check` accepts the submitted fields.
struct Accept<F> {
    open: Arc<AtomicBool>,
    check: F,
}

impl<F> Respond for Accept<F>
where
    F: Fn(&HashMap<String, String>) -> bool + Send + Sync,
{
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut fields: HashMap<String, String> = url::form_urlencoded::parse(&request.body)
            .into_owned()
            .collect();
        fields.extend(request.url.query_pairs().into_owned());

        if (self.check)(&fields) {
            self.open.store(true, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_string(WELCOME)
        } else {
            ResponseTemplate::new(200).set_body_string(REJECTED)
        }
    }
}

struct Harness {
    server: MockServer,
    open: Arc<AtomicBool>,
    sink: Arc<MemorySink>,
    clock: Arc<RecordingClock>,
}

impl Harness {
    async fn start(portal_path: &str) -> Self {
        let server = MockServer::start().await;
        let open = Arc::new(AtomicBool::new(false));
        Mock::given(method("GET"))
            .and(path("/probe"))
            .respond_with(Gate {
                open: open.clone(),
                portal: format!("{}{portal_path}", server.uri()),
            })
            .mount(&server)
            .await;
        Self {
            server,
            open,
            sink: Arc::new(MemorySink::new()),
            clock: Arc::new(RecordingClock::new()),
        }
    }

    fn url(&self, p: &str) -> String {
        format!("{}{p}", self.server.uri())
    }

    fn config(&self) -> EngineConfig {
        EngineConfig {
            reachability_endpoints: vec![ProbeEndpoint::new(self.url("/probe"), 200)],
            probe_urls: vec![self.url("/probe")],
            reachability_timeout: Duration::from_secs(2),
            discovery_timeout: Duration::from_secs(2),
            login_timeout: Duration::from_secs(2),
            ..EngineConfig::default()
        }
    }

    fn engine(&self, config: EngineConfig) -> Engine {
        Engine::new(config)
            .with_sink(self.sink.clone())
            .with_clock(self.clock.clone())
    }

    async fn page(&self, p: &str, html: &str) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&self.server)
            .await;
    }

    async fn accept<F>(&self, verb: &str, p: &str, check: F)
    where
        F: Fn(&HashMap<String, String>) -> bool + Send + Sync + 'static,
    {
        Mock::given(method(verb))
            .and(path(p))
            .respond_with(Accept {
                open: self.open.clone(),
                check,
            })
            .mount(&self.server)
            .await;
    }
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields.get(name).map(String::as_str)
}

const VENDOR_FORM: &str = r#"<html><body>
<form action="/login" method="post">
  <input name="DDDDD" value="">
  <input type="password" name="upass">
  <input type="hidden" name="echostr" value="abc123">
  <input type="submit" value="Login">
</form>
</body></html>"#;

#[tokio::test]
async fn test_reachability() {
    let h = Harness::start("/portal").await;
    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();

    assert!(!engine.is_reachable(&session).await);
    h.open.store(true, Ordering::SeqCst);
    assert!(engine.is_reachable(&session).await);
}

#[tokio::test]
async fn test_reachability_all_endpoints_fail() {
    let h = Harness::start("/portal").await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let config = EngineConfig {
        reachability_endpoints: vec![
            ProbeEndpoint::new(h.url("/down"), 200),
            ProbeEndpoint::new("http://127.0.0.1:1/", 200),
            // 302 is not the expected 204
            ProbeEndpoint::new(h.url("/probe"), 204),
        ],
        ..h.config()
    };
    let engine = h.engine(config);
    let session = engine.new_session().unwrap();

    assert!(!engine.is_reachable(&session).await);
    assert_eq!(h.sink.count("probe_result"), 2);
    assert_eq!(h.sink.count("probe_failed"), 1);
}

#[tokio::test]
async fn test_find_portal_stops_at_first_redirect() {
    let h = Harness::start("/portal?ip=10.1.2.3").await;
    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "http://elsewhere/"))
        .expect(0)
        .mount(&h.server)
        .await;

    let config = EngineConfig {
        probe_urls: vec![h.url("/probe"), h.url("/second")],
        ..h.config()
    };
    let engine = h.engine(config);
    let session = engine.new_session().unwrap();

    let portal = engine.find_portal(&session).await;
    assert_eq!(portal, Some(h.url("/portal?ip=10.1.2.3")));
    assert_eq!(h.sink.count("portal_found"), 1);
}

#[tokio::test]
async fn test_find_portal_none_on_open_network() {
    let h = Harness::start("/portal").await;
    h.open.store(true, Ordering::SeqCst);
    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();

    assert_eq!(engine.find_portal(&session).await, None);
    assert_eq!(h.sink.count("portal_not_found"), 1);
}

#[tokio::test]
async fn test_formless_page_uses_direct_submit() {
    let h = Harness::start("/portal?ip=10.1.2.3").await;
    h.page("/portal", "<html><body><p>Please sign in</p></body></html>")
        .await;
    h.accept("POST", "/portal", |f| {
        field(f, "username") == Some("s12345")
            && field(f, "password") == Some("pw")
            && field(f, "ip") == Some("10.1.2.3")
    })
    .await;

    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();
    let creds = Credentials::new("s12345", "pw");

    assert!(
        engine
            .login(&session, &h.url("/portal?ip=10.1.2.3"), &creds)
            .await
    );
    assert_eq!(h.sink.count("no_form_found"), 1);
    assert_eq!(h.sink.count("fallback_attempt"), 1);
    assert_eq!(h.sink.count("login_succeeded"), 1);
}

#[tokio::test]
async fn test_direct_submit_walks_field_pairs() {
    let h = Harness::start("/portal").await;
    h.page("/portal", "<html><body>no form here</body></html>")
        .await;
    h.accept("POST", "/portal", |f| {
        field(f, "DDDDD") == Some("s12345") && field(f, "upass") == Some("pw")
    })
    .await;

    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();

    assert!(
        engine
            .login(&session, &h.url("/portal"), &Credentials::new("s12345", "pw"))
            .await
    );
    assert_eq!(h.sink.count("fallback_attempt"), 4);
    // Rejected pairs carry a failure keyword, so no settle waits.
    assert!(h.clock.slept().is_empty());
}

#[tokio::test]
async fn test_vendor_form_salted_md5() {
    let h = Harness::start("/portal").await;
    h.page("/portal", VENDOR_FORM).await;
    let expected = md5_hex("pwabc123");
    h.accept("POST", "/login", move |f| {
        field(f, "DDDDD") == Some("s12345") && field(f, "upass") == Some(expected.as_str())
    })
    .await;

    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();

    assert!(
        engine
            .login(&session, &h.url("/portal"), &Credentials::new("s12345", "pw"))
            .await
    );

    let events = h.sink.events();
    let winner = events.iter().find_map(|e| match e {
        EngineEvent::LoginSucceeded { label, .. } => Some(label.clone()),
        _ => None,
    });
    assert_eq!(winner.as_deref(), Some("md5_pwd_echostr"));
    // plain, md5, b64, then the salted digest
    assert_eq!(h.sink.count("variant_attempt"), 4);
    assert_eq!(h.sink.count("portal_rejected"), 3);

    // The diagnostic payload hides the password.
    let prepared = events
        .iter()
        .find(|e| e.name() == "submission_prepared")
        .unwrap();
    let json = serde_json::to_string(prepared).unwrap();
    assert!(json.contains("\"upass\":\"***\""));
    assert!(!json.contains("\"pw\""));

    // Browser-like headers on the submission.
    let requests = h.server.received_requests().await.unwrap();
    let submit = requests
        .iter()
        .find(|r| r.url.path() == "/login")
        .unwrap();
    assert_eq!(
        submit.headers.get("origin").and_then(|v| v.to_str().ok()),
        Some("http://127.0.0.1")
    );
    assert_eq!(
        submit.headers.get("referer").and_then(|v| v.to_str().ok()),
        Some(h.url("/portal").as_str())
    );
}

#[tokio::test]
async fn test_get_form_merges_page_query() {
    let h = Harness::start("/web/index?wlanuserip=10.1.2.3&ac_id=7").await;
    h.page(
        "/web/index",
        r#"<form action="auth" method="get">
             <input name="user_name"><input type="password" name="user_pwd">
             <input type="hidden" name="ac_id" value="1">
           </form>"#,
    )
    .await;
    h.accept("GET", "/web/auth", |f| {
        field(f, "user_name") == Some("s12345")
            && field(f, "user_pwd") == Some("pw")
            && field(f, "wlanuserip") == Some("10.1.2.3")
            && field(f, "ac_id") == Some("1")
    })
    .await;

    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();
    let portal = h.url("/web/index?wlanuserip=10.1.2.3&ac_id=7");

    assert!(
        engine
            .login(&session, &portal, &Credentials::new("s12345", "pw"))
            .await
    );
    assert_eq!(h.sink.count("variant_attempt"), 1);
}

#[tokio::test]
async fn test_ambiguous_response_waits_then_rechecks() {
    let h = Harness::start("/portal").await;
    h.page(
        "/portal",
        r#"<form action="/go" method="post"><input name="username"><input type="password" name="password"></form>"#,
    )
    .await;
    // Accepts silently: neutral body, gate opens only on the second probe.
    let open = h.open.clone();
    let hits = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = hits.clone();
    Mock::given(method("POST"))
        .and(path("/go"))
        .respond_with(move |_: &Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_string("<p>processing</p>")
        })
        .mount(&h.server)
        .await;

    let config = EngineConfig {
        settle_delay: Duration::from_millis(1500),
        ..h.config()
    };
    let engine = h.engine(config);
    let session = engine.new_session().unwrap();

    // Nothing opens the gate, so every variant ends with a settle wait.
    assert!(
        !engine
            .login(&session, &h.url("/portal"), &Credentials::new("u", "p"))
            .await
    );
    let submissions = hits.load(Ordering::SeqCst) as usize;
    assert!(submissions > 1);
    assert_eq!(h.clock.slept(), vec![Duration::from_millis(1500); submissions]);
    assert!(!open.load(Ordering::SeqCst));
    assert_eq!(h.sink.count("login_exhausted"), 1);
}

#[tokio::test]
async fn test_connect_discovers_and_logs_in() {
    let h = Harness::start("/portal").await;
    h.page("/portal", VENDOR_FORM).await;
    h.accept("POST", "/login", |f| field(f, "upass") == Some("pw"))
        .await;

    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();
    let creds = Credentials::new("s12345", "pw");

    let outcome = engine.connect(&session, &creds).await;
    assert_eq!(outcome, ConnectOutcome::LoggedIn { attempt: 1 });

    // Second run finds the network open.
    let outcome = engine.connect(&session, &creds).await;
    assert_eq!(outcome, ConnectOutcome::AlreadyOnline);
}

#[tokio::test]
async fn test_connect_retries_then_fails() {
    let h = Harness::start("/portal").await;
    h.page("/portal", VENDOR_FORM).await;
    h.accept("POST", "/login", |_| false).await;

    let config = EngineConfig {
        retries: 2,
        retry_interval: Duration::from_secs(3),
        ..h.config()
    };
    let engine = h.engine(config);
    let session = engine.new_session().unwrap();

    let outcome = engine
        .connect(&session, &Credentials::new("s12345", "wrong"))
        .await;
    assert_eq!(outcome, ConnectOutcome::Failed { attempts: 2 });
    assert_eq!(h.sink.count("attempt_started"), 2);
    // One wait between the two attempts, none after the last.
    assert_eq!(h.clock.slept(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn test_connect_without_portal() {
    let h = Harness::start("/portal").await;
    let config = EngineConfig {
        reachability_endpoints: vec![ProbeEndpoint::new(h.url("/probe"), 204)],
        probe_urls: vec![h.url("/nothing")],
        ..h.config()
    };
    Mock::given(method("GET"))
        .and(path("/nothing"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;
    let engine = h.engine(config);
    let session = engine.new_session().unwrap();

    let outcome = engine
        .connect(&session, &Credentials::new("u", "p"))
        .await;
    assert_eq!(outcome, ConnectOutcome::PortalNotFound);
}

#[tokio::test]
async fn test_unresolved_form_fields_submit_nothing() {
    let h = Harness::start("/portal").await;
    h.page(
        "/portal",
        r#"<form action="/login" method="post"><input name="a1"><input name="b2"></form>"#,
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();

    assert!(
        !engine
            .login(&session, &h.url("/portal"), &Credentials::new("s12345", "pw"))
            .await
    );
    assert_eq!(h.sink.count("fields_unresolved"), 1);
    assert_eq!(h.sink.count("fallback_attempt"), 0);
    assert_eq!(h.sink.count("variant_attempt"), 0);
}

#[tokio::test]
async fn test_transport_failures_keep_password_out_of_event_log() {
    let h = Harness::start("/portal").await;
    h.page(
        "/portal",
        r#"<form action="http://127.0.0.1:1/auth" method="get">
             <input name="username"><input type="password" name="password">
           </form>"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("events.jsonl");
    let sink = FanoutSink::new()
        .with(h.sink.clone())
        .with(Arc::new(JsonlSink::open(&log_path).unwrap()));
    let engine = Engine::new(h.config())
        .with_sink(Arc::new(sink))
        .with_clock(h.clock.clone());
    let session = engine.new_session().unwrap();

    assert!(
        !engine
            .login(
                &session,
                &h.url("/portal"),
                &Credentials::new("s12345", "Hunter2Secret")
            )
            .await
    );
    assert!(h.sink.count("variant_transport_failed") > 0);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("variant_transport_failed"));
    assert!(log.contains("http://127.0.0.1:1/auth"));
    assert!(!log.contains("Hunter2Secret"));
}

#[tokio::test]
async fn test_session_cookies_reach_the_submission() {
    let h = Harness::start("/portal").await;
    Mock::given(method("GET"))
        .and(path("/portal"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "portal_sid=abc123; Path=/")
                .set_body_string(VENDOR_FORM),
        )
        .mount(&h.server)
        .await;
    h.accept("POST", "/login", |f| field(f, "upass") == Some("pw"))
        .await;

    let engine = h.engine(h.config());
    let session = engine.new_session().unwrap();

    assert!(
        engine
            .login(&session, &h.url("/portal"), &Credentials::new("s12345", "pw"))
            .await
    );

    let requests = h.server.received_requests().await.unwrap();
    let submit = requests
        .iter()
        .find(|r| r.url.path() == "/login")
        .unwrap();
    let cookie = submit
        .headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.contains("portal_sid=abc123"));

    // Reachability checks run on the redirect-free client and share the jar.
    let check = requests
        .iter()
        .rev()
        .find(|r| r.url.path() == "/probe")
        .unwrap();
    let cookie = check
        .headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.contains("portal_sid=abc123"));
}

#[tokio::test]
async fn test_zero_retries_makes_no_attempt() {
    let h = Harness::start("/portal").await;
    Mock::given(method("GET"))
        .and(path("/portal"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VENDOR_FORM))
        .expect(0)
        .mount(&h.server)
        .await;

    let config = EngineConfig {
        retries: 0,
        ..h.config()
    };
    let engine = h.engine(config);
    let session = engine.new_session().unwrap();

    let outcome = engine
        .connect(&session, &Credentials::new("s12345", "pw"))
        .await;
    assert_eq!(outcome, ConnectOutcome::Failed { attempts: 0 });
    assert_eq!(h.sink.count("attempt_started"), 0);
    assert!(h.clock.slept().is_empty());
}
