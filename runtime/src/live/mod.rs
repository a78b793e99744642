//! Long-running operation: the injected clock and the monitoring loop.

pub mod clock;
pub mod monitor;
