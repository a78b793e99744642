//! Campus Login: a captive-portal login engine.
//!
//! The engine detects that the host sits behind a captive portal, finds and
//! parses the unknown login form, guesses which fields carry the credentials,
//! submits them under several plausible password encodings, and confirms
//! success only through independent reachability probes.
//!
//! Entry points live on [`engine::Engine`]; the long-running watchdog is
//! [`live::monitor::Monitor`].

pub mod acquisition;
pub mod audit;
pub mod cli;
pub mod config;
pub mod engine;
pub mod extraction;
pub mod live;
pub mod trust;
