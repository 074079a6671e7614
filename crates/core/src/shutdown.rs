//! Cooperative shutdown signal
//!
//! Every loop in the daemon sleeps through `ShutdownListener::sleep`, which
//! returns early as soon as `Shutdown::trigger` is called.

use std::time::Duration;
use tokio::sync::watch;

/// Owner side of the shutdown signal
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Observer side of the shutdown signal (cheap to clone)
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a signal and its first listener
    pub fn new() -> (Self, ShutdownListener) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownListener { rx })
    }

    /// Request shutdown of every listener
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create another listener
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownListener {
    /// True once shutdown was requested (or the owner was dropped)
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Sleep for `duration` unless shutdown arrives first
    ///
    /// Returns `true` if the caller should keep running.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_shutdown(),
            changed = self.rx.changed() => match changed {
                Ok(()) => !*self.rx.borrow(),
                Err(_) => false,
            },
        }
    }

    /// Wait until shutdown is requested
    pub async fn wait(&mut self) {
        while !self.is_shutdown() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_shutdown() {
        let (_shutdown, mut listener) = Shutdown::new();
        assert!(listener.sleep(Duration::from_secs(30)).await);
        assert!(!listener.is_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_cuts_sleep_short() {
        let (shutdown, mut listener) = Shutdown::new();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let keep_running = listener.sleep(Duration::from_secs(3600)).await;
            (keep_running, start.elapsed())
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.trigger();

        let (keep_running, elapsed) = handle.await.unwrap();
        assert!(!keep_running);
        assert!(elapsed < Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_dropped_owner_counts_as_shutdown() {
        let (shutdown, mut listener) = Shutdown::new();
        drop(shutdown);
        assert!(listener.is_shutdown());
        assert!(!listener.sleep(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_extra_listeners_observe_trigger() {
        let (shutdown, listener) = Shutdown::new();
        let mut second = shutdown.listener();
        shutdown.trigger();
        second.wait().await;
        assert!(listener.is_shutdown());
        assert!(second.is_shutdown());
    }
}
