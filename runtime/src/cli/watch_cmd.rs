//! `campus-login watch`: the monitoring loop until Ctrl-C.

use crate::audit::events::EventSink;
use crate::cli::output::{self, Styled};
use crate::cli::{missing_credentials_hint, WatchArgs, EXIT_MISSING_CREDENTIALS};
use crate::engine::{Engine, PortalAgent};
use crate::live::clock::TokioClock;
use crate::live::monitor::Monitor;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Grace period for an in-flight iteration after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub async fn run(args: &WatchArgs, sink: Arc<dyn EventSink>) -> Result<i32> {
    let Some(credentials) = args.connect.credentials() else {
        eprintln!("{}", missing_credentials_hint());
        return Ok(EXIT_MISSING_CREDENTIALS);
    };

    let engine = Engine::new(args.connect.engine_config()).with_sink(sink.clone());
    let session = engine.new_session()?;
    let monitor_config = args.monitor_config();

    if !output::is_json() {
        let s = Styled::new();
        output::print_check(
            s.info_sym(),
            "Watching:",
            &format!(
                "every {} {}",
                output::format_duration(monitor_config.poll_interval.as_secs()),
                s.dim("(Ctrl-C to stop)")
            ),
        );
    }

    let agent = PortalAgent::new(engine, session, credentials);
    let mut monitor = Monitor::new(agent, monitor_config, Arc::new(TokioClock), sink);
    let stop = monitor.stop_handle();

    let run = monitor.run();
    tokio::pin!(run);
    tokio::select! {
        _ = &mut run => {}
        _ = tokio::signal::ctrl_c() => {
            stop.stop();
            // The stop flag is only seen between iterations; do not wait out
            // a full poll sleep.
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, &mut run).await;
        }
    }

    Ok(0)
}
