//! Background file watch: filesystem events plus a periodic full sweep.

use super::manual::apply_to_file;
use super::scan::{collect_files, is_candidate};
use super::{FixOptions, FixOutcome};
use crate::config::{Config, ScanConfig};
use crate::error::WatchError;
use crate::relay::{Notification, SharedSink};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct FileWatchSettings {
    pub debounce: Duration,
    pub sweep_interval: Duration,
}

impl FileWatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: Duration::from_millis(config.watch.debounce_ms),
            sweep_interval: Duration::from_secs(config.watch.sweep_interval_secs),
        }
    }
}

fn digest(text: &str) -> [u8; 32] {
    Sha256::digest(text.as_bytes()).into()
}

pub struct FileWatcher {
    root: PathBuf,
    scan: ScanConfig,
    settings: FileWatchSettings,
    options: FixOptions,
    sink: SharedSink,
    /// Digest of the last buffer this watcher wrote, per path.
    written: HashMap<PathBuf, [u8; 32]>,
}

impl FileWatcher {
    pub fn new(
        root: PathBuf,
        scan: ScanConfig,
        settings: FileWatchSettings,
        options: FixOptions,
        sink: SharedSink,
    ) -> Self {
        Self {
            root,
            scan,
            settings,
            options,
            sink,
            written: HashMap::new(),
        }
    }

    /// Process one file. Returns the outcome, or `None` when the file's
    /// current content is exactly what this watcher last wrote.
    pub fn process(&mut self, path: &Path) -> anyhow::Result<Option<FixOutcome>> {
        let current = std::fs::read_to_string(path)?;
        if self.written.get(path) == Some(&digest(&current)) {
            return Ok(None);
        }

        let fix = apply_to_file(path, &self.options)?;
        if let Some(text) = &fix.written {
            let written = digest(text);
            tracing::debug!(path = %path.display(), digest = %hex::encode(&written[..8]), "rewrote file");
            self.written.insert(path.to_path_buf(), written);
            let shown = path.strip_prefix(&self.root).unwrap_or(path);
            let message = format!(
                "Fixed Qiskit code in {} ({})",
                shown.display(),
                fix.outcome.rule_names().join(", ")
            );
            if let Err(e) = self.sink.publish(&Notification::new(message)) {
                tracing::warn!("failed to publish notification: {e:#}");
            }
        }
        Ok(Some(fix.outcome))
    }

    fn process_logged(&mut self, path: &Path) {
        if let Err(e) = self.process(path) {
            tracing::warn!(path = %path.display(), "watch iteration failed: {e:#}");
        }
    }

    /// Visit every candidate file once.
    pub fn sweep(&mut self) -> usize {
        let files = collect_files(&self.root, &self.scan);
        let mut fixed = 0;
        for path in files {
            match self.process(&path) {
                Ok(Some(outcome)) if outcome.is_fixed() => fixed += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %path.display(), "sweep failed for file: {e:#}"),
            }
        }
        fixed
    }

    /// Run until cancelled. Event paths are processed once they have been
    /// quiet for the debounce window.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WatchError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::error!("watch error: {e}"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        tracing::info!(root = %self.root.display(), "file watch started");

        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
        let mut sweep = tokio::time::interval(self.settings.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let tick = (self.settings.debounce / 4).max(Duration::from_millis(25));
        let mut debounce = tokio::time::interval(tick);
        debounce.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(path) = rx.recv() => {
                    if is_candidate(&self.root, &path, &self.scan) {
                        pending.insert(path, Instant::now());
                    }
                }
                _ = debounce.tick() => {
                    let now = Instant::now();
                    let due: Vec<PathBuf> = pending
                        .iter()
                        .filter(|(_, seen)| now.duration_since(**seen) >= self.settings.debounce)
                        .map(|(path, _)| path.clone())
                        .collect();
                    for path in due {
                        pending.remove(&path);
                        self.process_logged(&path);
                    }
                }
                _ = sweep.tick() => {
                    let fixed = self.sweep();
                    tracing::debug!(fixed, "periodic sweep finished");
                }
            }
        }

        drop(watcher);
        tracing::info!("file watch stopped");
        Ok(())
    }
}
