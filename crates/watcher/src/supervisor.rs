//! Monitored root supervision
//!
//! Periodically checks that the monitored root still exists (it is usually a
//! network share). While it is missing, incoming events are gated off and the
//! root is polled on a shorter interval until it comes back. Retention
//! housekeeping runs on every regular tick.

use anyhow::Result;
use dirwatch_core::ShutdownListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared flag telling the event binding whether the root is reachable
#[derive(Debug, Clone)]
pub struct Availability {
    online: Arc<AtomicBool>,
}

impl Availability {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Callbacks driven by the supervisor loop
///
/// An error from any callback stops the supervisor and is returned from
/// `PathSupervisor::run`.
pub trait Housekeeper: Send {
    /// Regular periodic work (retention trim)
    fn housekeep(&mut self) -> Result<()>;

    /// The root just disappeared
    fn on_path_lost(&mut self) -> Result<()> {
        Ok(())
    }

    /// The root is reachable again after an outage
    fn on_path_restored(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Existence poller for the monitored root
pub struct PathSupervisor {
    /// Monitored root directory
    root: PathBuf,

    /// Regular check interval (default: 5 minutes)
    interval: Duration,

    /// Poll interval while the root is missing (default: 30 seconds)
    reconnect_interval: Duration,

    /// Gate shared with the event binding
    availability: Availability,
}

impl PathSupervisor {
    pub fn new(
        root: PathBuf,
        interval: Duration,
        reconnect_interval: Duration,
        availability: Availability,
    ) -> Self {
        Self {
            root,
            interval,
            reconnect_interval,
            availability,
        }
    }

    /// Run until shutdown or until a housekeeper callback fails
    pub async fn run<H: Housekeeper>(
        self,
        mut housekeeper: H,
        mut shutdown: ShutdownListener,
    ) -> Result<()> {
        info!(
            "Starting path supervision of {} (interval: {:?})",
            self.root.display(),
            self.interval
        );

        loop {
            if !root_exists(&self.root) {
                warn!("Lost connection to monitored path: {}", self.root.display());
                self.availability.set_online(false);
                housekeeper.on_path_lost()?;

                if !self.wait_for_root(&mut shutdown).await {
                    break;
                }

                info!("Connection to monitored path restored: {}", self.root.display());
                self.availability.set_online(true);
                housekeeper.on_path_restored()?;
            }

            housekeeper.housekeep()?;

            if !shutdown.sleep(self.interval).await {
                break;
            }
        }

        debug!("Path supervision stopped");
        Ok(())
    }

    /// Poll until the root exists; false if shutdown arrived first
    async fn wait_for_root(&self, shutdown: &mut ShutdownListener) -> bool {
        while !root_exists(&self.root) {
            if !shutdown.sleep(self.reconnect_interval).await {
                return false;
            }
        }
        true
    }
}

/// True if `path` currently resolves
pub fn root_exists(path: &Path) -> bool {
    matches!(path.try_exists(), Ok(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirwatch_core::Shutdown;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Counts {
        housekeeps: usize,
        lost: usize,
        restored: usize,
    }

    #[derive(Clone, Default)]
    struct CountingHousekeeper {
        counts: Arc<Mutex<Counts>>,
    }

    impl Housekeeper for CountingHousekeeper {
        fn housekeep(&mut self) -> Result<()> {
            self.counts.lock().housekeeps += 1;
            Ok(())
        }

        fn on_path_lost(&mut self) -> Result<()> {
            self.counts.lock().lost += 1;
            Ok(())
        }

        fn on_path_restored(&mut self) -> Result<()> {
            self.counts.lock().restored += 1;
            Ok(())
        }
    }

    struct FailingHousekeeper;

    impl Housekeeper for FailingHousekeeper {
        fn housekeep(&mut self) -> Result<()> {
            anyhow::bail!("trim failed")
        }
    }

    #[tokio::test]
    async fn test_housekeeping_runs_periodically() {
        let temp_dir = TempDir::new().unwrap();
        let housekeeper = CountingHousekeeper::default();
        let (shutdown, listener) = Shutdown::new();

        let supervisor = PathSupervisor::new(
            temp_dir.path().to_path_buf(),
            Duration::from_millis(20),
            Duration::from_millis(10),
            Availability::default(),
        );
        let handle = tokio::spawn(supervisor.run(housekeeper.clone(), listener));

        tokio::time::sleep(Duration::from_millis(150)).await;
        shutdown.trigger();
        handle.await.unwrap().unwrap();

        let counts = housekeeper.counts.lock();
        assert!(counts.housekeeps >= 2);
        assert_eq!(counts.lost, 0);
    }

    #[tokio::test]
    async fn test_lost_root_gates_events_until_it_returns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("share");
        fs::create_dir(&root).unwrap();

        let availability = Availability::default();
        let housekeeper = CountingHousekeeper::default();
        let (shutdown, listener) = Shutdown::new();

        let supervisor = PathSupervisor::new(
            root.clone(),
            Duration::from_millis(30),
            Duration::from_millis(10),
            availability.clone(),
        );
        let handle = tokio::spawn(supervisor.run(housekeeper.clone(), listener));

        tokio::time::sleep(Duration::from_millis(50)).await;
        fs::remove_dir(&root).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!availability.is_online());
        let housekeeps_while_offline = {
            let counts = housekeeper.counts.lock();
            assert_eq!(counts.lost, 1);
            assert_eq!(counts.restored, 0);
            counts.housekeeps
        };

        // No housekeeping while waiting for the root
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(housekeeper.counts.lock().housekeeps, housekeeps_while_offline);

        fs::create_dir(&root).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(availability.is_online());
        {
            let counts = housekeeper.counts.lock();
            assert_eq!(counts.restored, 1);
            assert!(counts.housekeeps > housekeeps_while_offline);
        }

        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        let (shutdown, listener) = Shutdown::new();

        let supervisor = PathSupervisor::new(
            missing,
            Duration::from_secs(300),
            Duration::from_secs(30),
            Availability::default(),
        );
        let handle = tokio::spawn(supervisor.run(CountingHousekeeper::default(), listener));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_housekeeper_error_stops_supervisor() {
        let temp_dir = TempDir::new().unwrap();
        let (_shutdown, listener) = Shutdown::new();

        let supervisor = PathSupervisor::new(
            temp_dir.path().to_path_buf(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            Availability::default(),
        );

        let err = supervisor.run(FailingHousekeeper, listener).await.unwrap_err();
        assert!(err.to_string().contains("trim failed"));
    }

    #[test]
    fn test_root_exists() {
        let temp_dir = TempDir::new().unwrap();
        assert!(root_exists(temp_dir.path()));
        assert!(!root_exists(&temp_dir.path().join("nope")));
    }
}
