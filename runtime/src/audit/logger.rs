//! JSONL event log, an append-only record of engine events.

use crate::audit::events::{EngineEvent, EventSink, Severity};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// One line of the event log.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord<'a> {
    pub timestamp: String,
    pub level: Severity,
    #[serde(flatten)]
    pub event: &'a EngineEvent,
}

/// Append-only JSONL sink.
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open or create the log file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log: {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Write one event as a JSON line.
    pub fn log(&self, event: &EngineEvent) -> Result<()> {
        let record = EventRecord {
            timestamp: Utc::now().to_rfc3339(),
            level: event.severity(),
            event,
        };
        let json = serde_json::to_string(&record)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

impl EventSink for JsonlSink {
    fn emit(&self, event: &EngineEvent) {
        // Event logging must never interrupt a login.
        if let Err(e) = self.log(event) {
            tracing::debug!("event log write failed: {e:#}");
        }
    }
}
