//! Re-armable wakeup signals.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// A re-armable one-shot event.
///
/// `set` latches the event, so it tolerates being raised when nobody
/// is waiting; `clear` re-arms it. A `set` racing with a concurrent
/// `wait` is never lost.
#[derive(Default)]
pub struct Event {
    raised: Mutex<bool>,
    notify: Notify,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the event and wake every current waiter.
    pub fn set(&self) {
        *self.raised.lock() = true;
        self.notify.notify_waiters();
    }

    /// Re-arm the event.
    pub fn clear(&self) {
        *self.raised.lock() = false;
    }

    /// Whether the event is currently latched.
    pub fn is_set(&self) -> bool {
        *self.raised.lock()
    }

    /// Wait until the event is set.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking the flag, otherwise a
            // set() landing between the check and the await is lost.
            notified.as_mut().enable();
            if *self.raised.lock() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_set_before_wait_returns_immediately() {
        let event = Event::new();
        event.set();
        timeout(Duration::from_secs(1), event.wait())
            .await
            .expect("latched event should not block");
    }

    #[tokio::test]
    async fn test_clear_rearms() {
        let event = Event::new();
        event.set();
        event.clear();
        assert!(!event.is_set());
        let result = timeout(Duration::from_millis(50), event.wait()).await;
        assert!(result.is_err(), "cleared event must block again");
    }

    #[tokio::test]
    async fn test_set_wakes_waiter() {
        let event = Arc::new(Event::new());
        let waiter = {
            let event = Arc::clone(&event);
            tokio::spawn(async move { event.wait().await })
        };
        tokio::task::yield_now().await;
        event.set();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter should not panic");
    }
}
