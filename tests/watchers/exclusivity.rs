use qcompat::relay::Relay;
use qcompat::surface::pid_record::PidRecord;
use qcompat::surface::session::{Launcher, WatchMode, WatcherSupervisor};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

struct SleepLauncher;

impl Launcher for SleepLauncher {
    fn command(&self, _mode: WatchMode) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30"]);
        cmd
    }
}

fn alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .is_ok_and(|s| s.success())
}

#[tokio::test]
async fn second_start_replaces_the_first_watcher() {
    let supervisor = WatcherSupervisor::new(Arc::new(SleepLauncher), Relay::new());

    let first = supervisor.start(WatchMode::Files).await.unwrap().unwrap();
    let second = supervisor.start(WatchMode::Files).await.unwrap().unwrap();

    assert_ne!(first, second);
    assert_eq!(supervisor.live_sessions().await, 1);
    assert!(!alive(first), "first watcher {first} survived");
    assert!(alive(second));
    assert_eq!(supervisor.pid(WatchMode::Files).await, Some(second));

    supervisor.stop_all().await;
    assert_eq!(supervisor.live_sessions().await, 0);
    assert!(!alive(second));
}

#[tokio::test]
async fn modes_are_independent() {
    let supervisor = WatcherSupervisor::new(Arc::new(SleepLauncher), Relay::new());
    supervisor.start(WatchMode::Files).await.unwrap();
    supervisor.start(WatchMode::Clipboard).await.unwrap();
    assert_eq!(supervisor.live_sessions().await, 2);

    assert!(supervisor.stop(WatchMode::Clipboard).await);
    assert!(supervisor.is_running(WatchMode::Files).await);
    assert!(!supervisor.is_running(WatchMode::Clipboard).await);
    supervisor.stop_all().await;
}

struct ExitingLauncher;

impl Launcher for ExitingLauncher {
    fn command(&self, _mode: WatchMode) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 3"]);
        cmd
    }
}

#[tokio::test]
async fn exited_watchers_are_reaped() {
    let supervisor = WatcherSupervisor::new(Arc::new(ExitingLauncher), Relay::new());
    supervisor.start(WatchMode::Files).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert!(!supervisor.is_running(WatchMode::Files).await);
    assert_eq!(supervisor.pid(WatchMode::Files).await, None);
}

/// Runs `sleep` itself, so the recorded program matches the live process.
struct DirectSleepLauncher;

impl Launcher for DirectSleepLauncher {
    fn command(&self, _mode: WatchMode) -> Command {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        cmd
    }
}

async fn wait_until_stopped(supervisor: &WatcherSupervisor, mode: WatchMode) -> bool {
    for _ in 0..50 {
        if !supervisor.is_running(mode).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn one_watcher_per_mode_across_supervisors_of_a_workspace() {
    let state = TempDir::new().unwrap();
    let first_host = WatcherSupervisor::new(Arc::new(DirectSleepLauncher), Relay::new())
        .with_state_dir(state.path());
    let second_host = WatcherSupervisor::new(Arc::new(DirectSleepLauncher), Relay::new())
        .with_state_dir(state.path());
    let record = PidRecord::new(state.path(), WatchMode::Files);

    let first = first_host.start(WatchMode::Files).await.unwrap().unwrap();
    assert_eq!(record.read().map(|r| r.pid), Some(first));

    let second = second_host.start(WatchMode::Files).await.unwrap().unwrap();
    assert!(
        wait_until_stopped(&first_host, WatchMode::Files).await,
        "watcher {first} from the first host survived"
    );
    assert!(second_host.is_running(WatchMode::Files).await);
    assert_eq!(record.read().map(|r| r.pid), Some(second));

    // The other mode is untouched.
    first_host.start(WatchMode::Clipboard).await.unwrap();
    assert!(second_host.is_running(WatchMode::Files).await);
    assert_eq!(first_host.live_sessions().await + second_host.live_sessions().await, 2);

    first_host.stop_all().await;
    assert_eq!(record.read().map(|r| r.pid), Some(second));
    second_host.stop_all().await;
    assert!(record.read().is_none());
    assert!(!alive(second));
}

#[tokio::test]
async fn stale_record_of_a_dead_watcher_is_replaced() {
    let state = TempDir::new().unwrap();
    let record = PidRecord::new(state.path(), WatchMode::Clipboard);
    record.write(u32::MAX - 1, "sleep").unwrap();

    let supervisor = WatcherSupervisor::new(Arc::new(DirectSleepLauncher), Relay::new())
        .with_state_dir(state.path());
    let pid = supervisor.start(WatchMode::Clipboard).await.unwrap().unwrap();
    assert_eq!(record.read().map(|r| r.pid), Some(pid));
    supervisor.stop_all().await;
}
