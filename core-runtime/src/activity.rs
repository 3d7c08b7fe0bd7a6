//! # Activity Log
//!
//! Operator-facing record of what the pipeline did: stage starts and
//! finishes, copied and skipped items, per-item failures.
//!
//! Every call emits a `tracing` event and forwards a
//! [`LogEntry`](bridge_traits::time::LogEntry) to the injected
//! [`LoggerSink`]. Sink failures are swallowed so logging never fails the
//! caller.

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, trace, warn};

/// Handle used by stages to report activity.
///
/// Cheap to clone; [`ActivityLog::scoped`] produces a copy tagged with a
/// component name (`mirror`, `transcode`, `publish`, ...).
#[derive(Clone)]
pub struct ActivityLog {
    sink: Option<Arc<dyn LoggerSink>>,
    component: String,
    span_id: Option<String>,
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLog")
            .field("component", &self.component)
            .field("span_id", &self.span_id)
            .field("sink", &self.sink.as_ref().map(|_| "LoggerSink { ... }"))
            .finish()
    }
}

impl ActivityLog {
    pub fn new(sink: Arc<dyn LoggerSink>) -> Self {
        Self {
            sink: Some(sink),
            component: "pipeline".to_string(),
            span_id: None,
        }
    }

    /// Log only through `tracing`.
    pub fn tracing_only() -> Self {
        Self {
            sink: None,
            component: "pipeline".to_string(),
            span_id: None,
        }
    }

    pub fn scoped(&self, component: impl Into<String>) -> Self {
        Self {
            sink: self.sink.clone(),
            component: component.into(),
            span_id: self.span_id.clone(),
        }
    }

    /// Attach a run identifier to every entry.
    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub async fn record(&self, level: LogLevel, message: impl Into<String>, detail: Option<String>) {
        let message = message.into();
        let component = self.component.as_str();
        let detail_ref = detail.as_deref().unwrap_or("");

        match level {
            LogLevel::Trace => trace!(component, detail = detail_ref, "{}", message),
            LogLevel::Debug => debug!(component, detail = detail_ref, "{}", message),
            LogLevel::Info => info!(component, detail = detail_ref, "{}", message),
            LogLevel::Warn => warn!(component, detail = detail_ref, "{}", message),
            LogLevel::Error => error!(component, detail = detail_ref, "{}", message),
        }

        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        if level < sink.min_level() {
            return;
        }

        let mut entry = LogEntry::new(level, component, message);
        entry.detail = detail;
        entry.span_id = self.span_id.clone();

        if let Err(err) = sink.log(entry).await {
            debug!(error = %err, "Activity sink rejected entry");
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message, None).await;
    }

    pub async fn info_with(&self, message: impl Into<String>, detail: impl Into<String>) {
        self.record(LogLevel::Info, message, Some(detail.into())).await;
    }

    pub async fn warn(&self, message: impl Into<String>, detail: impl Into<String>) {
        self.record(LogLevel::Warn, message, Some(detail.into())).await;
    }

    pub async fn error(&self, message: impl Into<String>, detail: impl Into<String>) {
        self.record(LogLevel::Error, message, Some(detail.into())).await;
    }
}

/// Bounded in-memory sink.
///
/// Keeps the most recent `capacity` entries. Backs tests and embedders
/// that render the activity log themselves.
#[derive(Debug)]
pub struct MemoryLogSink {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    min_level: LogLevel,
}

impl MemoryLogSink {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            min_level: LogLevel::Debug,
        }
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Entries oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Messages at `level` or above, oldest first.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.level >= level)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogEntry>> {
        // A panic while holding the lock leaves the buffer intact.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait::async_trait]
impl LoggerSink for MemoryLogSink {
    async fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
