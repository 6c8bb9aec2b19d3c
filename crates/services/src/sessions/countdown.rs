use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events from a running countdown. Ticks are display-only; `Expired` fires
/// exactly once and is what drives the session's forced completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick { remaining_ms: i64 },
    Expired,
}

/// Cancellable scheduled task tracking a session deadline.
///
/// Remaining time is always rederived from `deadline - now`, never from a
/// stored counter, so a process that was absent for a while still expires at
/// the right wall-clock moment after resume.
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Tick roughly once per second.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

    /// Spawn the countdown task. Events arrive on the returned receiver;
    /// after `Expired` the task ends and the channel closes.
    #[must_use]
    pub fn spawn(deadline: DateTime<Utc>, period: Duration) -> (Self, mpsc::Receiver<CountdownEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(async move {
            loop {
                let remaining_ms = (deadline - Utc::now()).num_milliseconds();
                if remaining_ms <= 0 {
                    let _ = tx.send(CountdownEvent::Expired).await;
                    break;
                }
                if tx.send(CountdownEvent::Tick { remaining_ms }).await.is_err() {
                    break;
                }
                tokio::time::sleep(period).await;
            }
        });
        (Self { handle }, rx)
    }

    /// Stop the countdown without emitting `Expired`, e.g. when the session
    /// finishes on its own.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn emits_ticks_then_a_single_expired() {
        let deadline = Utc::now() + ChronoDuration::milliseconds(120);
        let (_countdown, mut rx) = Countdown::spawn(deadline, Duration::from_millis(30));

        let mut ticks = 0;
        let mut expired = 0;
        while let Some(event) = rx.recv().await {
            match event {
                CountdownEvent::Tick { remaining_ms } => {
                    assert!(remaining_ms > 0);
                    ticks += 1;
                }
                CountdownEvent::Expired => expired += 1,
            }
        }
        assert!(ticks >= 1);
        assert_eq!(expired, 1, "expired must fire exactly once");
    }

    #[tokio::test]
    async fn past_deadline_expires_immediately() {
        let deadline = Utc::now() - ChronoDuration::seconds(10);
        let (_countdown, mut rx) = Countdown::spawn(deadline, Duration::from_millis(10));
        assert_eq!(rx.recv().await, Some(CountdownEvent::Expired));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn abort_stops_the_stream_without_expiring() {
        let deadline = Utc::now() + ChronoDuration::seconds(60);
        let (countdown, mut rx) = Countdown::spawn(deadline, Duration::from_millis(10));

        assert!(matches!(rx.recv().await, Some(CountdownEvent::Tick { .. })));
        countdown.abort();

        // Drain whatever was in flight; the channel must close without an
        // Expired event.
        while let Some(event) = rx.recv().await {
            assert!(matches!(event, CountdownEvent::Tick { .. }));
        }
    }
}
