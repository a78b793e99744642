//! `campus-login` command line: argument definitions and dispatch.

pub mod check_cmd;
pub mod login_cmd;
pub mod output;
pub mod watch_cmd;

use crate::audit::events::{EventSink, FanoutSink, TracingSink};
use crate::audit::logger::JsonlSink;
use crate::config::{
    default_event_log_path, parse_extra_params, EngineConfig, MonitorConfig, PASS_ENV, USER_ENV,
};
use crate::trust::credentials::Credentials;
use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Exit code when credentials are missing.
pub const EXIT_MISSING_CREDENTIALS: i32 = 2;

/// Log in to campus captive portals and keep the connection alive.
#[derive(Parser, Debug)]
#[command(name = "campus-login", author, version, about, long_about = None)]
pub struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only errors; no progress lines
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Append engine events as JSON Lines (default ~/.campus-login/events.jsonl,
    /// or --event-log=PATH)
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        num_args = 0..=1,
        require_equals = true
    )]
    pub event_log: Option<Option<PathBuf>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report reachability and the captive portal, without logging in
    Check(ProbeArgs),
    /// Log in once if the network is not reachable
    Login(ConnectArgs),
    /// Keep checking and log in again whenever the link drops
    Watch(WatchArgs),
}

/// Where to look for the portal.
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// URL probed for a portal redirect (repeatable, tried in order)
    #[arg(long = "probe", value_name = "URL")]
    pub probes: Vec<String>,

    /// Fixed login page; skips redirect discovery
    #[arg(long, value_name = "URL")]
    pub portal: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Account name
    #[arg(short, long, env = USER_ENV)]
    pub username: Option<String>,

    /// Account password
    #[arg(short, long, env = PASS_ENV, hide_env_values = true)]
    pub password: Option<String>,

    /// Username field name, overriding inference
    #[arg(long, value_name = "NAME")]
    pub user_field: Option<String>,

    /// Password field name, overriding inference
    #[arg(long, value_name = "NAME")]
    pub pass_field: Option<String>,

    #[command(flatten)]
    pub probe: ProbeArgs,

    /// Extra form parameter as key=value (repeatable)
    #[arg(long = "extra", value_name = "K=V")]
    pub extras: Vec<String>,

    /// Login attempts per cycle
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Seconds between login attempts
    #[arg(long, default_value_t = 3)]
    pub interval: u64,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Seconds between connectivity checks while online
    #[arg(long, default_value_t = 20)]
    pub watch_interval: u64,
}

impl ProbeArgs {
    /// Apply the probe list and fixed portal to `config`.
    pub fn apply(&self, config: &mut EngineConfig) {
        if !self.probes.is_empty() {
            config.probe_urls = self.probes.clone();
        }
        if let Some(portal) = self.portal.as_ref().filter(|p| !p.trim().is_empty()) {
            config.portal_url = Some(portal.trim().to_string());
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        self.apply(&mut config);
        config
    }
}

impl ConnectArgs {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = self.probe.engine_config();
        config.user_field = non_blank(self.user_field.as_deref());
        config.pass_field = non_blank(self.pass_field.as_deref());
        config.extra_params = parse_extra_params(&self.extras);
        config.retries = self.retries;
        config.retry_interval = Duration::from_secs(self.interval);
        config
    }

    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.username.clone(), self.password.clone())
    }
}

impl WatchArgs {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.watch_interval.max(1)),
            ..MonitorConfig::default()
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Tracing always; the JSONL log as well when a path is given.
pub fn build_sink(event_log: Option<&Path>) -> Result<Arc<dyn EventSink>> {
    let Some(path) = event_log else {
        return Ok(Arc::new(TracingSink));
    };
    let jsonl = JsonlSink::open(path)
        .with_context(|| format!("failed to open event log {}", path.display()))?;
    Ok(Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(jsonl)),
    ))
}

impl Cli {
    /// Event log destination, if `--event-log` was given.
    pub fn event_log_path(&self) -> Option<PathBuf> {
        self.event_log
            .as_ref()
            .map(|path| path.clone().unwrap_or_else(default_event_log_path))
    }
}

/// Publish the global output switches for [`output`].
pub fn export_output_flags(cli: &Cli) {
    if cli.quiet {
        std::env::set_var(output::QUIET_ENV, "1");
    }
    if cli.json {
        std::env::set_var(output::JSON_ENV, "1");
    }
    if cli.no_color {
        std::env::set_var(output::NO_COLOR_ENV, "1");
    }
}

/// Run the selected subcommand and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let sink = build_sink(cli.event_log_path().as_deref())?;
    match cli.command {
        Command::Check(args) => check_cmd::run(&args, sink).await,
        Command::Login(args) => login_cmd::run(&args, sink).await,
        Command::Watch(args) => watch_cmd::run(&args, sink).await,
    }
}

/// Message printed when no credentials were supplied.
pub(crate) fn missing_credentials_hint() -> String {
    format!("missing credentials: pass -u/-p or set {USER_ENV} and {PASS_ENV}")
}
