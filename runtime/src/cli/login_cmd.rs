//! `campus-login login`: one connect cycle.

use crate::audit::events::EventSink;
use crate::cli::output::{self, Styled};
use crate::cli::{missing_credentials_hint, ConnectArgs, EXIT_MISSING_CREDENTIALS};
use crate::engine::{ConnectOutcome, Engine};
use anyhow::Result;
use std::sync::Arc;

/// Exit 0 when online afterwards, 1 on failure or no portal, 2 without
/// credentials.
pub async fn run(args: &ConnectArgs, sink: Arc<dyn EventSink>) -> Result<i32> {
    let Some(credentials) = args.credentials() else {
        eprintln!("{}", missing_credentials_hint());
        return Ok(EXIT_MISSING_CREDENTIALS);
    };

    let engine = Engine::new(args.engine_config()).with_sink(sink);
    let session = engine.new_session()?;
    let outcome = engine.connect(&session, &credentials).await;

    if output::is_json() {
        output::print_json(&serde_json::to_value(&outcome)?);
    } else {
        let s = Styled::new();
        match &outcome {
            ConnectOutcome::AlreadyOnline => {
                output::print_check(s.ok_sym(), "Network:", &s.green("already online"))
            }
            ConnectOutcome::LoggedIn { attempt } => output::print_check(
                s.ok_sym(),
                "Login:",
                &s.green(&format!("succeeded on attempt {attempt}")),
            ),
            ConnectOutcome::PortalNotFound => output::print_check(
                s.fail_sym(),
                "Portal:",
                &s.red("not found; try --portal <URL>"),
            ),
            ConnectOutcome::Failed { attempts } => output::print_check(
                s.fail_sym(),
                "Login:",
                &s.red(&format!("failed after {attempts} attempt(s)")),
            ),
        }
    }

    Ok(if outcome.is_online() { 0 } else { 1 })
}
