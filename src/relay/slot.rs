use super::{Notification, NotificationSink, Relay, now_ms};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Overwrites a single JSON record. Last write wins.
pub struct SlotSink {
    path: PathBuf,
}

impl SlotSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationSink for SlotSink {
    fn publish(&self, notification: &Notification) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        // Readers must never observe a half-written record.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(notification)?)
            .context("Failed to write notification record")?;
        std::fs::rename(&tmp, &self.path).context("Failed to publish notification record")?;
        Ok(())
    }
}

/// Polls a slot file and forwards fresh records into a [`Relay`].
pub struct SlotReader {
    path: PathBuf,
    stale_after_ms: i64,
    last_delivered: Option<Notification>,
}

impl SlotReader {
    pub fn new(path: PathBuf, stale_after_ms: i64) -> Self {
        Self {
            path,
            stale_after_ms,
            last_delivered: None,
        }
    }

    /// One poll. Returns the record if it is fresh and was not delivered
    /// before; a missing, unreadable, or malformed slot yields nothing.
    pub fn poll(&mut self, now_ms: i64) -> Option<Notification> {
        let bytes = std::fs::read(&self.path).ok()?;
        let notification: Notification = match serde_json::from_slice(&bytes) {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), "unparseable notification slot: {e}");
                return None;
            }
        };
        if notification.is_stale(now_ms, self.stale_after_ms) {
            return None;
        }
        if self.last_delivered.as_ref() == Some(&notification) {
            return None;
        }
        self.last_delivered = Some(notification.clone());
        Some(notification)
    }

    pub async fn run(mut self, relay: Relay, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(notification) = self.poll(now_ms()) {
                        relay.publish(notification);
                    }
                }
            }
        }
    }
}
