//! Per-workspace watcher records: `.qcompat/<mode>.pid`.
//!
//! Whoever starts a watcher for a mode evicts the process named in the
//! record first, so a workspace never has two watchers of the same mode even
//! across separate `qcompat` processes.

use super::session::WatchMode;
use crate::error::WatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherRecord {
    pub pid: u32,
    /// Program the watcher was launched as; guards against pid reuse.
    pub program: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PidRecord {
    path: PathBuf,
}

impl PidRecord {
    pub fn new(state_dir: &Path, mode: WatchMode) -> Self {
        Self {
            path: state_dir.join(format!("{mode}.pid")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current record. A missing or unreadable file reads as none.
    pub fn read(&self) -> Option<WatcherRecord> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn write(&self, pid: u32, program: &str) -> Result<(), WatchError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = WatcherRecord {
            pid,
            program: program.to_string(),
            started_at: Utc::now(),
        };
        let data = serde_json::to_vec(&record).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("pid.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Remove the record if it still names `pid`.
    pub fn clear(&self, pid: u32) {
        if self.read().is_some_and(|r| r.pid == pid) {
            std::fs::remove_file(&self.path).ok();
        }
    }

    /// Kill the recorded watcher when it is still running and is not this
    /// process. Returns the pid that was killed.
    pub fn evict(&self) -> Option<u32> {
        let record = self.read()?;
        if record.pid == std::process::id() || !still_running(&record) {
            return None;
        }
        if kill(record.pid) {
            tracing::info!(pid = record.pid, record = %self.path.display(), "stopped watcher from another session");
            std::fs::remove_file(&self.path).ok();
            Some(record.pid)
        } else {
            tracing::warn!(pid = record.pid, "could not stop the recorded watcher");
            None
        }
    }

    /// Evict any other watcher for this mode and record this process,
    /// for a watcher running in the foreground.
    pub fn claim(self, program: &str) -> Result<PidClaim, WatchError> {
        self.evict();
        let pid = std::process::id();
        self.write(pid, program)?;
        Ok(PidClaim { record: self, pid })
    }
}

/// Clears the record on drop.
#[derive(Debug)]
pub struct PidClaim {
    record: PidRecord,
    pid: u32,
}

impl Drop for PidClaim {
    fn drop(&mut self) {
        self.record.clear(self.pid);
    }
}

fn still_running(record: &WatcherRecord) -> bool {
    // A live pid running some other program is a reused pid, not ours.
    #[cfg(target_os = "linux")]
    if let Ok(cmdline) = std::fs::read(format!("/proc/{}/cmdline", record.pid)) {
        let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
        let running = String::from_utf8_lossy(argv0);
        return !running.is_empty()
            && Path::new(running.as_ref()).file_name() == Path::new(&record.program).file_name();
    }
    is_alive(record.pid)
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    matches!(
        signal::kill(Pid::from_raw(raw), None::<Signal>),
        Ok(()) | Err(Errno::EPERM)
    )
}

#[cfg(unix)]
fn kill(pid: u32) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    i32::try_from(pid).is_ok_and(|raw| signal::kill(Pid::from_raw(raw), Signal::SIGKILL).is_ok())
}

#[cfg(not(unix))]
fn is_alive(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
fn kill(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_is_per_mode() {
        let tmp = TempDir::new().unwrap();
        let files = PidRecord::new(tmp.path(), WatchMode::Files);
        let clipboard = PidRecord::new(tmp.path(), WatchMode::Clipboard);
        assert!(files.path().ends_with("files.pid"));

        files.write(42, "qcompat").unwrap();
        assert_eq!(files.read().map(|r| r.pid), Some(42));
        assert!(clipboard.read().is_none());
    }

    #[test]
    fn clear_only_removes_a_matching_record() {
        let tmp = TempDir::new().unwrap();
        let record = PidRecord::new(tmp.path(), WatchMode::Files);
        record.write(42, "qcompat").unwrap();

        record.clear(7);
        assert!(record.path().exists());
        record.clear(42);
        assert!(!record.path().exists());
    }

    #[test]
    fn own_process_is_never_evicted() {
        let tmp = TempDir::new().unwrap();
        let record = PidRecord::new(tmp.path(), WatchMode::Clipboard);
        let exe = std::env::current_exe().unwrap();
        record.write(std::process::id(), &exe.to_string_lossy()).unwrap();
        assert_eq!(record.evict(), None);
        assert!(record.path().exists());
    }

    #[test]
    fn claim_is_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let claim = PidRecord::new(tmp.path(), WatchMode::Files).claim("qcompat").unwrap();
        let record = PidRecord::new(tmp.path(), WatchMode::Files);
        assert_eq!(record.read().map(|r| r.pid), Some(std::process::id()));
        drop(claim);
        assert!(record.read().is_none());
    }

    #[test]
    fn garbage_record_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let record = PidRecord::new(tmp.path(), WatchMode::Files);
        std::fs::write(record.path(), "not json").unwrap();
        assert!(record.read().is_none());
        assert_eq!(record.evict(), None);
    }
}
