//! Progress reporting
//!
//! Deletion progress is pushed as keyed events into a [`ProgressSink`].
//! Sinks are fire-and-forget: they never fail and never block the caller
//! for longer than a write to stderr.

use chrono::Local;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Status of one progress entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    /// Work on the entry has started
    Started,
    /// Entry finished successfully
    Success,
    /// Informational update, the entry is still pending
    None,
    /// Entry was given up on
    Error,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Started => "↻",
            Self::Success => "✓",
            Self::None => "◯",
            Self::Error => "✗",
        }
    }
}

/// One keyed progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub key: String,
    pub message: String,
    pub status: ProgressStatus,
}

impl ProgressUpdate {
    pub fn new(key: impl Into<String>, message: impl Into<String>, status: ProgressStatus) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
            status,
        }
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn push_update(&self, update: ProgressUpdate);

    /// Start an entry keyed by its own message
    fn push_started(&self, message: &str) {
        self.push_update(ProgressUpdate::new(message, message, ProgressStatus::Started));
    }

    /// Mark an entry as done, keeping its last message
    fn push_success(&self, key: &str) {
        self.push_update(ProgressUpdate::new(key, "", ProgressStatus::Success));
    }
}

/// Where progress goes during a purge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProgressMode {
    /// Live lines on stderr
    #[default]
    Console,
    /// Only the log file
    Log,
    /// Nothing
    None,
}

impl ProgressMode {
    pub fn sink(self) -> Arc<dyn ProgressSink> {
        match self {
            Self::Console => Arc::new(ConsoleProgress::stderr()),
            Self::Log => Arc::new(LogProgress),
            Self::None => Arc::new(SilentProgress),
        }
    }
}

/// Format duration for display
fn duration_display(d: Duration) -> String {
    if d.as_secs() < 1 {
        format!("{}ms", d.as_millis())
    } else if d.as_secs() < 60 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}m{}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}

struct Entry {
    message: String,
    started_at: Instant,
}

/// Timestamped, icon-prefixed lines written to a terminal stream
pub struct ConsoleProgress<W: Write + Send> {
    out: Mutex<W>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ConsoleProgress<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Text of one event, without the timestamp
    fn render(&self, update: &ProgressUpdate) -> String {
        let Ok(mut entries) = self.entries.lock() else {
            return format!("{} {}", update.status.icon(), update.message);
        };

        let message = if update.message.is_empty() {
            entries
                .get(&update.key)
                .map(|e| e.message.clone())
                .unwrap_or_else(|| update.key.clone())
        } else {
            update.message.clone()
        };

        if update.status.is_terminal() {
            let elapsed = entries.remove(&update.key).map(|e| e.started_at.elapsed());
            return match elapsed {
                Some(d) => format!("{} {} ({})", update.status.icon(), message, duration_display(d)),
                None => format!("{} {}", update.status.icon(), message),
            };
        }

        let entry = entries.entry(update.key.clone()).or_insert_with(|| Entry {
            message: message.clone(),
            started_at: Instant::now(),
        });
        if update.status == ProgressStatus::Started {
            entry.message = message.clone();
        }
        format!("{} {}", update.status.icon(), message)
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn push_update(&self, update: ProgressUpdate) {
        let line = self.render(&update);
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "[{}] {}", Local::now().format("%H:%M:%S"), line);
        }
    }
}

/// Progress as tracing events
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn push_update(&self, update: ProgressUpdate) {
        match update.status {
            ProgressStatus::Started => tracing::info!(key = %update.key, "{}", update.message),
            ProgressStatus::Success => tracing::info!(key = %update.key, "done"),
            ProgressStatus::None => tracing::warn!(key = %update.key, "{}", update.message),
            ProgressStatus::Error => tracing::error!(key = %update.key, "{}", update.message),
        }
    }
}

/// Discards every event
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn push_update(&self, _update: ProgressUpdate) {}
}
