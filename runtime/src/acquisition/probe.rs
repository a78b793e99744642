//! Reachability prober, the engine's only notion of "logged in".

use super::http_session::HttpSession;
use crate::audit::events::{EngineEvent, EventSink};
use crate::config::ProbeEndpoint;
use std::time::Duration;

/// True as soon as one endpoint answers with its expected status.
///
/// Endpoints are tried in order without following redirects. A failed
/// request only moves on to the next endpoint; there are no retries.
pub async fn is_reachable(
    session: &HttpSession,
    endpoints: &[ProbeEndpoint],
    timeout: Duration,
    sink: &dyn EventSink,
) -> bool {
    for endpoint in endpoints {
        match session.probe(&endpoint.url, timeout).await {
            Ok(resp) => {
                sink.emit(&EngineEvent::ProbeResult {
                    url: endpoint.url.clone(),
                    status: resp.status,
                    expected: endpoint.expected_status,
                    elapsed_ms: resp.elapsed.as_millis() as u64,
                });
                if resp.status == endpoint.expected_status {
                    return true;
                }
            }
            Err(e) => sink.emit(&EngineEvent::ProbeFailed {
                url: endpoint.url.clone(),
                error: e.to_string(),
            }),
        }
    }
    false
}
