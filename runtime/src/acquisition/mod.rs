//! Network side of the engine: the HTTP session, reachability probes,
//! portal discovery, password variants, and the login orchestrator.

pub mod auth;
pub mod http_session;
pub mod portal;
pub mod probe;
pub mod variants;
