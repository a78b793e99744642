//! Captive-portal discovery through redirect capture.

use super::http_session::HttpSession;
use crate::audit::events::{EngineEvent, EventSink};
use std::time::Duration;

/// Return the `Location` of the first probe that redirects.
///
/// `None` is the normal answer on an open network. Probes after the first
/// captured redirect are never sent.
pub async fn find_portal<S: AsRef<str>>(
    session: &HttpSession,
    probe_urls: &[S],
    timeout: Duration,
    sink: &dyn EventSink,
) -> Option<String> {
    for url in probe_urls {
        let url = url.as_ref();
        let resp = match session.probe(url, timeout).await {
            Ok(resp) => resp,
            Err(e) => {
                sink.emit(&EngineEvent::PortalProbeFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        sink.emit(&EngineEvent::PortalProbe {
            url: url.to_string(),
            status: resp.status,
        });

        if !resp.is_redirect() {
            continue;
        }
        if let Some(location) = resp.header("location").filter(|l| !l.trim().is_empty()) {
            let location = resolve_location(url, location.trim());
            sink.emit(&EngineEvent::PortalFound {
                location: location.clone(),
            });
            return Some(location);
        }
    }

    sink.emit(&EngineEvent::PortalNotFound);
    None
}

/// Absolute locations pass through untouched; relative ones are joined
/// against the probe URL.
fn resolve_location(probe_url: &str, location: &str) -> String {
    if url::Url::parse(location).is_ok() {
        return location.to_string();
    }
    url::Url::parse(probe_url)
        .and_then(|base| base.join(location))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}
