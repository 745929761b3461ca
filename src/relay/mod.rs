//! Notification relay.
//!
//! Background watchers have no UI of their own. They hand one-line messages to
//! a [`NotificationSink`]: the pipe sink prints a tagged line on stdout that
//! the launching supervisor parses, the slot sink overwrites a JSON record for
//! detached watchers. Either way the message ends up in a [`Relay`], a single
//! most-recent slot whose presenter delivers fresh messages one at a time.

mod presenter;
mod slot;

pub use presenter::{ConsoleNotifier, Notifier, present};
pub use slot::{SlotReader, SlotSink};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use strum::{Display, EnumString};
use tokio::sync::watch;

/// Prefix of a notification line on a watcher's stdout.
pub const PIPE_PREFIX: &str = "QCOMPAT_NOTIFY:";
pub const DEFAULT_STALE_AFTER_MS: i64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub timestamp_ms: i64,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message, now_ms())
    }

    pub fn at(message: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            message: message.into(),
            timestamp_ms,
        }
    }

    /// Stale once strictly older than `stale_after_ms` at `now_ms`.
    pub fn is_stale(&self, now_ms: i64, stale_after_ms: i64) -> bool {
        now_ms - self.timestamp_ms > stale_after_ms
    }

    pub fn to_pipe_line(&self) -> Result<String> {
        Ok(format!("{PIPE_PREFIX}{}", serde_json::to_string(self)?))
    }

    /// Parse a stdout line; `None` for ordinary output or a malformed record.
    pub fn from_pipe_line(line: &str) -> Option<Self> {
        let payload = line.trim_end().strip_prefix(PIPE_PREFIX)?;
        match serde_json::from_str(payload) {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::debug!("ignoring malformed notification line: {e}");
                None
            }
        }
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Where a watcher sends its notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    /// Tagged lines on stdout, read by the launching supervisor.
    Pipe,
    /// Overwritten JSON record polled by the interactive surface.
    Slot,
    /// Log only.
    None,
}

pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: &Notification) -> Result<()>;
}

pub struct PipeSink;

impl NotificationSink for PipeSink {
    fn publish(&self, notification: &Notification) -> Result<()> {
        let line = notification.to_pipe_line()?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }
}

pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, notification: &Notification) -> Result<()> {
        tracing::info!(message = %notification.message, "notification");
        Ok(())
    }
}

impl NotificationSink for Relay {
    fn publish(&self, notification: &Notification) -> Result<()> {
        Relay::publish(self, notification.clone());
        Ok(())
    }
}

pub type SharedSink = Arc<dyn NotificationSink>;

pub fn sink_for(transport: Transport, slot_path: std::path::PathBuf) -> SharedSink {
    match transport {
        Transport::Pipe => Arc::new(PipeSink),
        Transport::Slot => Arc::new(SlotSink::new(slot_path)),
        Transport::None => Arc::new(LogSink),
    }
}

/// Single most-recent notification slot. A new publish supersedes an unread
/// one; subscribers see only the latest value.
#[derive(Clone)]
pub struct Relay {
    tx: watch::Sender<Option<Notification>>,
}

impl Relay {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, notification: Notification) {
        self.tx.send_replace(Some(notification));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.tx.borrow().clone()
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
