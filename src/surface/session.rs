//! Watcher sessions: background watchers run as child processes, at most one
//! per mode. Their stdout is read line by line; tagged lines become
//! notifications on the [`Relay`], everything else is logged.
//!
//! With a state directory the limit holds per workspace: each start evicts
//! the watcher named in `.qcompat/<mode>.pid`, whichever process launched it.

use super::pid_record::PidRecord;
use crate::error::WatchError;
use crate::relay::{Notification, Relay};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use strum::{Display, EnumString};
use tokio::io::AsyncBufReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum WatchMode {
    Files,
    Clipboard,
}

/// Builds the command that runs a watcher in the given mode.
pub trait Launcher: Send + Sync {
    fn command(&self, mode: WatchMode) -> Command;
}

/// Re-invokes this executable: `qcompat --workspace <ws> watch --notify pipe`.
pub struct SelfLauncher {
    exe: PathBuf,
    workspace: PathBuf,
}

impl SelfLauncher {
    pub fn new(workspace: PathBuf) -> anyhow::Result<Self> {
        Ok(Self {
            exe: std::env::current_exe()?,
            workspace,
        })
    }
}

impl Launcher for SelfLauncher {
    fn command(&self, mode: WatchMode) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("--workspace").arg(&self.workspace);
        match mode {
            WatchMode::Files => cmd.arg("watch"),
            WatchMode::Clipboard => cmd.arg("clipboard"),
        };
        cmd.args(["--notify", "pipe"]);
        cmd
    }
}

struct WatcherSession {
    child: Child,
    pid: Option<u32>,
    running: bool,
    reader: JoinHandle<()>,
    record: Option<PidRecord>,
}

impl WatcherSession {
    /// Hard kill, no grace period.
    async fn terminate(&mut self) {
        self.running = false;
        self.child.kill().await.ok();
        self.child.wait().await.ok();
        self.reader.abort();
        self.release();
    }

    fn release(&self) {
        if let (Some(record), Some(pid)) = (&self.record, self.pid) {
            record.clear(pid);
        }
    }
}

pub struct WatcherSupervisor {
    launcher: Arc<dyn Launcher>,
    relay: Relay,
    sessions: Mutex<HashMap<WatchMode, WatcherSession>>,
    state_dir: Option<PathBuf>,
}

impl WatcherSupervisor {
    pub fn new(launcher: Arc<dyn Launcher>, relay: Relay) -> Self {
        Self {
            launcher,
            relay,
            sessions: Mutex::new(HashMap::new()),
            state_dir: None,
        }
    }

    /// Keep per-mode pid records in `state_dir`, making the one-watcher
    /// limit hold across every supervisor of the workspace.
    #[must_use]
    pub fn with_state_dir(mut self, state_dir: impl AsRef<Path>) -> Self {
        self.state_dir = Some(state_dir.as_ref().to_path_buf());
        self
    }

    /// Start a watcher, stopping any prior one for the same mode first.
    /// Returns the new child's pid.
    pub async fn start(&self, mode: WatchMode) -> Result<Option<u32>, WatchError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(mut previous) = sessions.remove(&mode) {
            tracing::info!(%mode, pid = ?previous.pid, "stopping previous watcher");
            previous.terminate().await;
        }
        let record = self.state_dir.as_deref().map(|dir| PidRecord::new(dir, mode));
        if let Some(record) = &record {
            record.evict();
        }

        let mut command = self.launcher.command(mode);
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WatchError::Launch {
                mode: mode.to_string(),
                source,
            })?;
        let pid = child.id();
        if let (Some(record), Some(pid)) = (&record, pid)
            && let Err(e) = record.write(pid, &program)
        {
            tracing::warn!(%mode, "could not record watcher pid: {e}");
        }

        let relay = self.relay.clone();
        let reader = match child.stdout.take() {
            Some(stdout) => tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match Notification::from_pipe_line(&line) {
                        Some(notification) => relay.publish(notification),
                        None => tracing::info!(%mode, "{line}"),
                    }
                }
                tracing::debug!(%mode, "watcher output closed");
            }),
            None => tokio::spawn(async {}),
        };

        tracing::info!(%mode, pid = ?pid, "watcher started");
        sessions.insert(
            mode,
            WatcherSession {
                child,
                pid,
                running: true,
                reader,
                record,
            },
        );
        Ok(pid)
    }

    /// Stop the watcher for `mode`. Returns whether one was running.
    pub async fn stop(&self, mode: WatchMode) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(&mode) {
            Some(mut session) => {
                session.terminate().await;
                tracing::info!(%mode, "watcher stopped");
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (mode, mut session) in sessions.drain() {
            session.terminate().await;
            tracing::info!(%mode, "watcher stopped");
        }
    }

    /// Whether the watcher for `mode` is alive. A session whose process has
    /// exited on its own is reaped here.
    pub async fn is_running(&self, mode: WatchMode) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&mode) else {
            return false;
        };
        match session.child.try_wait() {
            Ok(None) => session.running,
            Ok(Some(status)) => {
                tracing::warn!(%mode, %status, "watcher exited");
                session.running = false;
                session.release();
                sessions.remove(&mode);
                false
            }
            Err(e) => {
                tracing::warn!(%mode, "could not poll watcher: {e}");
                session.running
            }
        }
    }

    pub async fn live_sessions(&self) -> usize {
        let mut live = 0;
        for mode in [WatchMode::Files, WatchMode::Clipboard] {
            if self.is_running(mode).await {
                live += 1;
            }
        }
        live
    }

    pub async fn pid(&self, mode: WatchMode) -> Option<u32> {
        self.sessions.lock().await.get(&mode).and_then(|s| s.child.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct ShellLauncher(&'static str);

    impl Launcher for ShellLauncher {
        fn command(&self, _mode: WatchMode) -> Command {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.0);
            cmd
        }
    }

    #[tokio::test]
    async fn pipe_lines_reach_the_relay() {
        let line = Notification::new("Fixed a.py").to_pipe_line().unwrap();
        let script: &'static str =
            Box::leak(format!("echo plain output; echo '{line}'; sleep 30").into_boxed_str());
        let relay = Relay::new();
        let supervisor = WatcherSupervisor::new(Arc::new(ShellLauncher(script)), relay.clone());

        supervisor.start(WatchMode::Files).await.unwrap();
        let mut delivered = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            delivered = relay.latest();
            if delivered.is_some() {
                break;
            }
        }
        assert_eq!(delivered.map(|n| n.message), Some("Fixed a.py".into()));
        supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn stop_without_session_is_a_noop() {
        let supervisor =
            WatcherSupervisor::new(Arc::new(ShellLauncher("sleep 30")), Relay::new());
        assert!(!supervisor.stop(WatchMode::Clipboard).await);
        assert_eq!(supervisor.live_sessions().await, 0);
    }

    #[test]
    fn mode_names() {
        assert_eq!(WatchMode::Files.to_string(), "files");
        assert_eq!("clipboard".parse::<WatchMode>().unwrap(), WatchMode::Clipboard);
    }
}
