//! Clipboard watch: poll, rewrite, replace, notify.

use super::manual::fix_text;
use crate::error::WatchError;
use crate::relay::{Notification, SharedSink};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClipboardContent {
    Text(String),
    /// Images, files, or an empty clipboard.
    #[default]
    NotText,
}

pub trait ClipboardAccess {
    fn read(&mut self) -> Result<ClipboardContent, WatchError>;
    fn write(&mut self, text: &str) -> Result<(), WatchError>;
}

/// System clipboard.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn open() -> Result<Self, WatchError> {
        let inner = arboard::Clipboard::new().map_err(|e| WatchError::Clipboard(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read(&mut self) -> Result<ClipboardContent, WatchError> {
        match self.inner.get_text() {
            Ok(text) => Ok(ClipboardContent::Text(text)),
            Err(arboard::Error::ContentNotAvailable | arboard::Error::ConversionFailure) => {
                Ok(ClipboardContent::NotText)
            }
            Err(e) => Err(WatchError::Clipboard(e.to_string())),
        }
    }

    fn write(&mut self, text: &str) -> Result<(), WatchError> {
        self.inner
            .set_text(text.to_string())
            .map_err(|e| WatchError::Clipboard(e.to_string()))
    }
}

/// Copy `text` to the system clipboard once.
pub fn copy_to_clipboard(text: &str) -> Result<(), WatchError> {
    SystemClipboard::open()?.write(text)
}

pub struct ClipboardWatcher<C> {
    clipboard: C,
    sink: SharedSink,
    /// Last content observed or written; never processed twice.
    last_seen: Option<String>,
}

impl<C: ClipboardAccess> ClipboardWatcher<C> {
    pub fn new(clipboard: C, sink: SharedSink) -> Self {
        Self {
            clipboard,
            sink,
            last_seen: None,
        }
    }

    /// Remember whatever is on the clipboard now so that content copied
    /// before the watcher started is left alone.
    pub fn prime(&mut self) {
        if let Ok(ClipboardContent::Text(text)) = self.clipboard.read() {
            self.last_seen = Some(text);
        }
    }

    /// One poll. Returns true when the clipboard was rewritten.
    pub fn tick(&mut self) -> Result<bool, WatchError> {
        let ClipboardContent::Text(current) = self.clipboard.read()? else {
            return Ok(false);
        };
        if self.last_seen.as_deref() == Some(current.as_str()) {
            return Ok(false);
        }

        let (outcome, result) = fix_text(&current);
        if !outcome.is_fixed() {
            self.last_seen = Some(current);
            return Ok(false);
        }

        self.clipboard.write(&result.new_text)?;
        let summary = result.summary();
        self.last_seen = Some(result.new_text);
        tracing::info!(rules = %summary, "fixed clipboard content");
        let message = format!("Fixed Qiskit code in clipboard ({summary})");
        if let Err(e) = self.sink.publish(&Notification::new(message)) {
            tracing::warn!("failed to publish notification: {e:#}");
        }
        Ok(true)
    }

    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        self.prime();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        tracing::info!(interval_ms = interval.as_millis(), "clipboard watch started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        tracing::warn!("clipboard poll failed: {e}");
                    }
                }
            }
        }
        tracing::info!("clipboard watch stopped");
    }
}
