//! Engine observability: semantic events, sinks, and the JSONL event log.

pub mod events;
pub mod logger;
