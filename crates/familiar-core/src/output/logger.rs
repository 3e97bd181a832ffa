//! Event Logger
//!
//! Append-only JSONL log of lifecycle events.

use familiar_events::{EventType, LifecycleEvent};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Writes lifecycle events one per line
pub struct EventLogger {
    writer: Option<BufWriter<File>>,
    counts: HashMap<EventType, u64>,
}

impl EventLogger {
    /// Create a new event logger writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            counts: HashMap::new(),
        })
    }

    /// Create a logger that only counts events
    pub fn null() -> Self {
        Self {
            writer: None,
            counts: HashMap::new(),
        }
    }

    /// Total events logged so far
    pub fn event_count(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count_of(&self, event_type: EventType) -> u64 {
        self.counts.get(&event_type).copied().unwrap_or(0)
    }

    pub fn log(&mut self, event: &LifecycleEvent) -> std::io::Result<()> {
        *self.counts.entry(event.event_type()).or_insert(0) += 1;
        if let Some(ref mut writer) = self.writer {
            let json = event.to_jsonl()?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    pub fn log_batch(&mut self, events: &[LifecycleEvent]) -> std::io::Result<()> {
        for event in events {
            self.log(event)?;
        }
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush event log");
        }
    }
}
