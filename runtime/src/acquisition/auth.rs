//! Portal login: fetch the page, fill the form, try every password encoding.
//!
//! Nothing the portal answers is trusted as proof of success. After each
//! submission the reachability prober is asked again; only a positive probe
//! ends the attempt. Failure keywords in the response only let us skip the
//! settle wait for variants the portal has plainly rejected.

use crate::acquisition::http_session::HttpSession;
use crate::acquisition::variants::generate_variants;
use crate::audit::events::EngineEvent;
use crate::engine::Engine;
use crate::extraction::form::{extract_login_form, FieldMap, FormMethod, Payload};
use crate::extraction::inference::{resolve_roles, FieldRoles, FALLBACK_FIELD_PAIRS};
use crate::trust::credentials::Credentials;
use crate::trust::redact::redact_payload_with;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

// ── Public types ────────────────────────────────────────────────────────────

/// Everything one login attempt needs besides the session.
#[derive(Debug, Clone)]
pub struct LoginRequest<'a> {
    /// Login page, usually the captured redirect target.
    pub portal_url: &'a str,
    pub credentials: &'a Credentials,
    /// Username field name; skips inference for that role.
    pub user_field: Option<&'a str>,
    /// Password field name; skips inference for that role.
    pub pass_field: Option<&'a str>,
    /// Static parameters merged into every payload, overriding form values.
    pub extra_params: &'a [(String, String)],
    /// Timeout for each page fetch and submission.
    pub timeout: Duration,
}

/// Response text that means the portal turned the credentials down.
pub const FAILURE_KEYWORDS: &[&str] = &[
    "error",
    "failed",
    "密码",
    "错误",
    "失败",
    "invalid",
    "login again",
    "认证失败",
    "请重试",
];

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").unwrap());

// ── Public async API ────────────────────────────────────────────────────────

/// Log in through the portal at `request.portal_url`.
///
/// Returns true on the first submission after which the network is
/// reachable, false once every variant is spent.
pub async fn login(engine: &Engine, session: &HttpSession, request: &LoginRequest<'_>) -> bool {
    let sink = engine.sink();

    let page = match session.fetch(request.portal_url, request.timeout).await {
        Ok(page) => page,
        Err(e) => {
            sink.emit(&EngineEvent::LoginPageFailed {
                url: request.portal_url.to_string(),
                error: e.to_string(),
            });
            return false;
        }
    };
    sink.emit(&EngineEvent::LoginPageOpened {
        url: page.final_url.clone(),
        status: page.status,
    });

    let Some(form) = extract_login_form(&page.body) else {
        sink.emit(&EngineEvent::NoFormFound {
            url: page.final_url.clone(),
        });
        return direct_submit(engine, session, &page.final_url, request).await;
    };

    let names: Vec<String> = form.fields.keys().map(str::to_string).collect();
    sink.emit(&EngineEvent::FormFound {
        form_count: form.form_count,
        action: form.action.clone(),
        method: form.method.as_str().to_string(),
        fields: names.clone(),
    });

    // Conventional pairs are only tried on pages without a form.
    let Some(roles) = resolve_roles(&names, request.user_field, request.pass_field) else {
        sink.emit(&EngineEvent::FieldsUnresolved { fields: names });
        return false;
    };
    sink.emit(&EngineEvent::FieldsResolved {
        user_field: roles.user_field.clone(),
        pass_field: roles.pass_field.clone(),
        overridden: roles.overridden,
    });

    let base = build_base_payload(
        form.fields,
        &roles,
        request.credentials,
        &page.final_url,
        request.extra_params,
    );
    let submit_url = resolve_action(&page.final_url, &form.action);
    let headers = submission_headers(&page.final_url, &submit_url);
    let variants = generate_variants(&base, &roles.pass_field, request.credentials.password());

    sink.emit(&EngineEvent::SubmissionPrepared {
        url: submit_url.clone(),
        method: form.method.as_str().to_string(),
        variants: variants.len(),
        payload: redact_payload_with(&base, Some(&roles.pass_field)),
    });

    for variant in &variants {
        sink.emit(&EngineEvent::VariantAttempt {
            label: variant.label.to_string(),
            login_type: variant.login_type().map(str::to_string),
        });

        let resp = match session
            .submit(
                form.method,
                &submit_url,
                &variant.payload,
                &headers,
                request.timeout,
            )
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                sink.emit(&EngineEvent::VariantTransportFailed {
                    label: variant.label.to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        if let Some(title) = response_title(&resp.body) {
            sink.emit(&EngineEvent::ResponseTitle {
                label: variant.label.to_string(),
                title,
            });
        }

        if verify(engine, session, variant.label, &resp.body).await {
            return true;
        }
    }

    sink.emit(&EngineEvent::LoginExhausted {
        attempts: variants.len(),
    });
    false
}

// ── Payload assembly ────────────────────────────────────────────────────────

/// Substitute the credentials into the form defaults, add the page's query
/// parameters the form lacks, apply caller extras, and drop null fields.
pub fn build_base_payload(
    mut fields: FieldMap<Option<String>>,
    roles: &FieldRoles,
    credentials: &Credentials,
    page_url: &str,
    extra_params: &[(String, String)],
) -> Payload {
    fields.insert(
        roles.user_field.as_str(),
        Some(credentials.username.clone()),
    );
    fields.insert(
        roles.pass_field.as_str(),
        Some(credentials.password().to_string()),
    );
    merge_query_params(page_url, &mut fields);
    for (key, value) in extra_params {
        fields.insert(key.as_str(), Some(value.clone()));
    }
    fields.into_payload()
}

/// Copy non-blank query parameters of `url` into `fields` when the name is
/// not already present. The first occurrence of a repeated name wins.
pub fn merge_query_params(url: &str, fields: &mut FieldMap<Option<String>>) {
    let Ok(parsed) = url::Url::parse(url) else {
        return;
    };
    for (key, value) in parsed.query_pairs() {
        if value.is_empty() || fields.contains_key(&key) {
            continue;
        }
        fields.insert(key.into_owned(), Some(value.into_owned()));
    }
}

/// Join a form action against the page URL; an empty action targets the
/// page itself.
pub fn resolve_action(page_url: &str, action: &str) -> String {
    let action = action.trim();
    if action.is_empty() {
        return page_url.to_string();
    }
    url::Url::parse(page_url)
        .and_then(|base| base.join(action))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| action.to_string())
}

/// `Referer` is the login page; `Origin` is the submission target's
/// `scheme://host`.
pub fn submission_headers(page_url: &str, submit_url: &str) -> Vec<(&'static str, String)> {
    let mut headers = vec![("Referer", page_url.to_string())];
    if let Ok(target) = url::Url::parse(submit_url) {
        if let Some(host) = target.host_str() {
            headers.push(("Origin", format!("{}://{host}", target.scheme())));
        }
    }
    headers
}

/// Whether the body contains any failure keyword (case-insensitive).
pub fn has_failure_keyword(body: &str) -> bool {
    let lower = body.to_lowercase();
    FAILURE_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn response_title(body: &str) -> Option<String> {
    TITLE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

// ── Private helpers ─────────────────────────────────────────────────────────

/// Success check after one submission: probe, skip on a rejection keyword,
/// otherwise settle and probe once more.
async fn verify(engine: &Engine, session: &HttpSession, label: &str, body: &str) -> bool {
    let sink = engine.sink();

    if engine.is_reachable(session).await {
        sink.emit(&EngineEvent::LoginSucceeded {
            label: label.to_string(),
            after_delay: false,
        });
        return true;
    }

    if has_failure_keyword(body) {
        sink.emit(&EngineEvent::PortalRejected {
            label: label.to_string(),
        });
        return false;
    }

    engine.clock().sleep(engine.config().settle_delay).await;
    if engine.is_reachable(session).await {
        sink.emit(&EngineEvent::LoginSucceeded {
            label: label.to_string(),
            after_delay: true,
        });
        return true;
    }
    false
}

/// POST conventional field-name pairs straight to the page URL of a page
/// that has no form.
async fn direct_submit(
    engine: &Engine,
    session: &HttpSession,
    page_url: &str,
    request: &LoginRequest<'_>,
) -> bool {
    let sink = engine.sink();
    let headers = vec![("Referer", page_url.to_string())];

    for (user_field, pass_field) in FALLBACK_FIELD_PAIRS {
        let mut fields: FieldMap<Option<String>> = FieldMap::new();
        fields.insert(*user_field, Some(request.credentials.username.clone()));
        fields.insert(*pass_field, Some(request.credentials.password().to_string()));
        merge_query_params(page_url, &mut fields);
        let payload = fields.into_payload();

        sink.emit(&EngineEvent::FallbackAttempt {
            user_field: user_field.to_string(),
            pass_field: pass_field.to_string(),
            url: page_url.to_string(),
        });

        let label = format!("fallback:{user_field}/{pass_field}");
        match session
            .submit(
                FormMethod::Post,
                page_url,
                &payload,
                &headers,
                request.timeout,
            )
            .await
        {
            Ok(resp) => {
                if verify(engine, session, &label, &resp.body).await {
                    return true;
                }
            }
            Err(e) => sink.emit(&EngineEvent::VariantTransportFailed {
                label,
                error: e.to_string(),
            }),
        }
    }

    sink.emit(&EngineEvent::LoginExhausted {
        attempts: FALLBACK_FIELD_PAIRS.len(),
    });
    false
}

// ── Tests ───────────────────────────────────────────────────────────────────
