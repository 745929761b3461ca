use qcompat::relay::{Notification, NotificationSink, Relay, SlotReader, SlotSink, now_ms};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[test]
fn records_older_than_the_window_are_never_delivered() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(".qcompat/notification.json");
    let sink = SlotSink::new(path.clone());
    let mut reader = SlotReader::new(path, 5000);

    sink.publish(&Notification::at("old", 1_000)).unwrap();
    assert!(reader.poll(6_001).is_none());
    assert_eq!(reader.poll(6_000).map(|n| n.message), Some("old".into()));
}

#[test]
fn pipe_lines_round_trip_through_the_prefix() {
    let line = Notification::at("Fixed bell.py (backend-import)", 42).to_pipe_line().unwrap();
    assert!(line.starts_with("QCOMPAT_NOTIFY:"));
    let parsed = Notification::from_pipe_line(&line).unwrap();
    assert_eq!(parsed.timestamp_ms, 42);
    assert!(Notification::from_pipe_line("Fixed bell.py").is_none());
}

#[tokio::test]
async fn slot_reader_feeds_the_relay() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notification.json");
    let relay = Relay::new();
    let cancel = CancellationToken::new();
    let reader = SlotReader::new(path.clone(), 5000);
    let task = tokio::spawn(reader.run(relay.clone(), Duration::from_millis(20), cancel.clone()));

    SlotSink::new(path).publish(&Notification::at("Fixed a.py", now_ms())).unwrap();
    let mut seen = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        seen = relay.latest();
        if seen.is_some() {
            break;
        }
    }
    cancel.cancel();
    task.await.unwrap();
    assert_eq!(seen.map(|n| n.message), Some("Fixed a.py".into()));
}
