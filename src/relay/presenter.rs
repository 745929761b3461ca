use super::{Notification, now_ms};
use std::future::Future;
use std::io::IsTerminal;
use std::pin::Pin;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Displays one notification and resolves once the user dismissed it.
pub trait Notifier: Send {
    fn show<'a>(
        &'a mut self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Prints to stdout. On an interactive terminal each message waits for Enter
/// before the next one is shown.
pub struct ConsoleNotifier {
    await_dismissal: bool,
    stdin: tokio::io::Lines<tokio::io::BufReader<tokio::io::Stdin>>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self {
            await_dismissal: std::io::stdin().is_terminal(),
            stdin: tokio::io::BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn show<'a>(
        &'a mut self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            println!("{}", crate::ui::style::notification(&notification.message));
            if self.await_dismissal {
                println!("  {}", crate::ui::style::dim("(press Enter to dismiss)"));
                // EOF or a read error both count as dismissal.
                let _ = self.stdin.next_line().await;
            }
        })
    }
}

/// Deliver fresh notifications from `rx` to `notifier`, strictly in arrival
/// order, one at a time. Records older than `stale_after_ms` when read from
/// the slot are dropped.
pub async fn present<N: Notifier>(
    mut rx: watch::Receiver<Option<Notification>>,
    mut notifier: N,
    stale_after_ms: i64,
    cancel: CancellationToken,
) {
    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<Notification>();

    let intake_cancel = cancel.clone();
    let intake = async move {
        loop {
            tokio::select! {
                () = intake_cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let Some(notification) = rx.borrow_and_update().clone() else {
                        continue;
                    };
                    if notification.is_stale(now_ms(), stale_after_ms) {
                        tracing::debug!(message = %notification.message, "dropping stale notification");
                        continue;
                    }
                    if queue_tx.send(notification).is_err() {
                        break;
                    }
                }
            }
        }
    };

    let display = async move {
        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => break,
                next = queue_rx.recv() => next,
            };
            let Some(notification) = next else {
                break;
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = notifier.show(&notification) => {}
            }
        }
    };

    tokio::join!(intake, display);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Relay;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records messages and holds each one until the test releases it.
    struct GatedNotifier {
        shown: Arc<Mutex<Vec<String>>>,
        release: mpsc::UnboundedReceiver<()>,
    }

    impl Notifier for GatedNotifier {
        fn show<'a>(
            &'a mut self,
            notification: &'a Notification,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async move {
                self.shown.lock().unwrap().push(notification.message.clone());
                let _ = self.release.recv().await;
            })
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn delivers_in_order_one_at_a_time() {
        let relay = Relay::new();
        let shown = Arc::new(Mutex::new(Vec::new()));
        let (release_tx, release_rx) = mpsc::unbounded_channel();
        let notifier = GatedNotifier {
            shown: Arc::clone(&shown),
            release: release_rx,
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(present(relay.subscribe(), notifier, 5000, cancel.clone()));

        relay.publish(Notification::new("first"));
        settle().await;
        relay.publish(Notification::new("second"));
        settle().await;

        assert_eq!(*shown.lock().unwrap(), vec!["first"]);
        release_tx.send(()).unwrap();
        settle().await;
        assert_eq!(*shown.lock().unwrap(), vec!["first", "second"]);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stale_records_are_dropped() {
        let relay = Relay::new();
        let shown = Arc::new(Mutex::new(Vec::new()));
        let (_release_tx, release_rx) = mpsc::unbounded_channel();
        let notifier = GatedNotifier {
            shown: Arc::clone(&shown),
            release: release_rx,
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(present(relay.subscribe(), notifier, 5000, cancel.clone()));

        relay.publish(Notification::at("ancient", now_ms() - 60_000));
        settle().await;
        assert!(shown.lock().unwrap().is_empty());

        cancel.cancel();
        task.await.unwrap();
    }
}
