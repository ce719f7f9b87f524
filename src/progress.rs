//! Progress reporting via message passing.
//!
//! The pipeline never shares mutable state with its presentation layer:
//! it emits [`PipelineEvent`]s over a broadcast channel, and reporters
//! (the CLI printer, tests, anything else) subscribe. Events from
//! different record-type workers interleave; consumers must tolerate
//! cross-type ordering.
//!
//! The broadcaster is owned by the import manager, not a process-wide
//! global, so concurrent runs and tests never observe each other's
//! events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::models::{RecordType, Stage, TypeReport};

/// Log level for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A leveled log line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// A progress milestone: one record type's current stage and counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub record_type: RecordType,
    pub stage: Stage,
    pub snapshot: TypeReport,
}

/// Everything the pipeline tells the outside world.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Log(LogEntry),
    Progress(ProgressEvent),
}

/// Broadcasts pipeline events to all subscribers, optionally mirroring
/// log lines to stdout.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    sender: broadcast::Sender<PipelineEvent>,
    mirror: bool,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            mirror: true,
        }
    }

    /// A broadcaster that never writes to stdout (tests, embedding).
    pub fn quiet() -> Self {
        let mut b = Self::new();
        b.mirror = false;
        b
    }

    /// Get a receiver for event streaming.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// The same events as a `Stream`, for async consumers (an SSE
    /// bridge, a UI task).
    pub fn stream(&self) -> BroadcastStream<PipelineEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Send an event to all subscribers.
    pub fn emit(&self, event: PipelineEvent) {
        if self.mirror {
            if let PipelineEvent::Log(ref entry) = event {
                let prefix = match entry.level {
                    LogLevel::Info => "   ",
                    LogLevel::Success => "   ✓",
                    LogLevel::Warning => "   ⚠",
                    LogLevel::Error => "   ✗",
                };
                println!("{} {}", prefix, entry.message);
            }
        }
        // Ignore the error when no receivers are subscribed.
        let _ = self.sender.send(event);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(PipelineEvent::Log(LogEntry {
            level,
            message: message.into(),
        }));
    }

    /// Emit a progress milestone for one record type.
    pub fn progress(&self, record_type: RecordType, stage: Stage, snapshot: TypeReport) {
        self.emit(PipelineEvent::Progress(ProgressEvent {
            record_type,
            stage,
            snapshot,
        }));
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
