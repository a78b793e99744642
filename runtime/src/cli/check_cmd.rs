//! `campus-login check`: reachability and portal discovery, nothing submitted.

use crate::audit::events::EventSink;
use crate::cli::{output, ProbeArgs};
use crate::cli::output::Styled;
use crate::engine::Engine;
use anyhow::Result;
use std::sync::Arc;

/// Exit 0 when the network is reachable, 1 otherwise.
pub async fn run(args: &ProbeArgs, sink: Arc<dyn EventSink>) -> Result<i32> {
    let engine = Engine::new(args.engine_config()).with_sink(sink);
    let session = engine.new_session()?;

    let online = engine.is_reachable(&session).await;
    let portal = if online {
        None
    } else {
        engine.find_portal(&session).await
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "online": online,
            "portal": portal,
            "session": session.session_id,
        }));
    } else {
        let s = Styled::new();
        if online {
            output::print_check(s.ok_sym(), "Network:", &s.green("reachable"));
        } else {
            output::print_check(s.fail_sym(), "Network:", &s.red("unreachable"));
            match &portal {
                Some(url) => output::print_check(s.info_sym(), "Portal:", url),
                None => output::print_check(s.info_sym(), "Portal:", &s.dim("none detected")),
            }
        }
    }

    Ok(if online { 0 } else { 1 })
}
