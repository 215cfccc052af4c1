//! Privilege session management.
//!
//! Elevated privileges are obtained once at startup and kept alive by a
//! background task that re-touches the sudo timestamp, so batch operations
//! never block on a hidden password prompt mid-run. The keepalive is a
//! cancellable task joined deterministically on shutdown, never a detached
//! timer.

use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sudo::RunningAs;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::ui::prelude::*;

/// Period between keepalive refreshes.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Horizon after which the elevation timestamp lapses without a refresh.
/// Matches sudo's default `timestamp_timeout` of five minutes.
pub const SESSION_EXPIRY: Duration = Duration::from_secs(300);

/// How a privileged command should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
    /// Already root, run the command bare.
    Root,
    /// Authenticated sudo session, prefix with `sudo -n`.
    Sudo,
    /// No usable session. Privileged calls must fail fast.
    Unauthenticated,
}

/// Shared privilege session state.
///
/// Single-writer rule: only the keepalive task writes `last_refresh`; every
/// other code path is read-only.
#[derive(Debug)]
pub struct PrivilegeSession {
    root: bool,
    authenticated: bool,
    last_refresh: Mutex<Instant>,
}

impl PrivilegeSession {
    fn new(root: bool, authenticated: bool) -> Self {
        Self {
            root,
            authenticated,
            last_refresh: Mutex::new(Instant::now()),
        }
    }

    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// True once the elevation timestamp would have lapsed without a refresh.
    pub fn expired(&self) -> bool {
        if self.root {
            return false;
        }
        if !self.authenticated {
            return true;
        }
        self.last_refresh
            .lock()
            .expect("privilege session lock poisoned")
            .elapsed()
            > SESSION_EXPIRY
    }

    pub fn mode(&self) -> PrivilegeMode {
        if self.root {
            PrivilegeMode::Root
        } else if self.authenticated && !self.expired() {
            PrivilegeMode::Sudo
        } else {
            PrivilegeMode::Unauthenticated
        }
    }

    fn touch(&self) {
        *self
            .last_refresh
            .lock()
            .expect("privilege session lock poisoned") = Instant::now();
    }
}

/// Performs one elevation-timestamp refresh.
///
/// A trait seam so the keepalive loop is testable without a real sudo.
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self) -> Result<()>;
}

/// Production refresher: `sudo -n -v` re-touches the timestamp without ever
/// prompting.
pub struct SudoRefresher;

#[async_trait]
impl Refresher for SudoRefresher {
    async fn refresh(&self) -> Result<()> {
        let status = tokio::process::Command::new("sudo")
            .args(["-n", "-v"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            anyhow::bail!("sudo -n -v exited with {status}");
        }
        Ok(())
    }
}

struct Keepalive {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the privilege session and its keepalive task.
pub struct PrivilegeManager {
    session: Arc<PrivilegeSession>,
    keepalive: Option<Keepalive>,
    interval: Duration,
}

impl PrivilegeManager {
    /// A manager for read-only flows. Privileged calls through this session
    /// fail fast with `PERMISSION_DENIED`.
    pub fn unauthenticated() -> Self {
        Self {
            session: Arc::new(PrivilegeSession::new(false, false)),
            keepalive: None,
            interval: KEEPALIVE_INTERVAL,
        }
    }

    /// Obtain elevated privileges once, interactively.
    ///
    /// A failed or declined authentication does not error: it yields an
    /// unauthenticated session, so later privileged calls fail fast instead
    /// of re-prompting from a hidden context.
    pub fn acquire() -> Self {
        let session = match sudo::check() {
            RunningAs::Root => PrivilegeSession::new(true, true),
            _ => {
                // Interactive prompt, inherits the terminal.
                let authenticated = Command::new("sudo")
                    .arg("-v")
                    .status()
                    .map(|status| status.success())
                    .unwrap_or(false);

                if !authenticated {
                    emit(
                        Level::Warn,
                        "privilege.acquire.failed",
                        &format!(
                            "{} Authentication failed; privileged operations will be rejected",
                            char::from(NerdFont::Lock)
                        ),
                        None,
                    );
                }
                PrivilegeSession::new(false, authenticated)
            }
        };

        Self {
            session: Arc::new(session),
            keepalive: None,
            interval: KEEPALIVE_INTERVAL,
        }
    }

    /// Override the keepalive period. Must be called before
    /// [`Self::start_keepalive`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[cfg(test)]
    pub(crate) fn for_tests(root: bool, authenticated: bool, interval: Duration) -> Self {
        Self {
            session: Arc::new(PrivilegeSession::new(root, authenticated)),
            keepalive: None,
            interval,
        }
    }

    pub fn session(&self) -> Arc<PrivilegeSession> {
        self.session.clone()
    }

    /// Launch the background keepalive task.
    ///
    /// No-op when there is nothing to keep alive: root sessions never expire
    /// and unauthenticated sessions must stay rejected.
    pub fn start_keepalive(&mut self) {
        self.start_keepalive_with(Arc::new(SudoRefresher));
    }

    pub fn start_keepalive_with(&mut self, refresher: Arc<dyn Refresher>) {
        if self.keepalive.is_some() || self.session.mode() != PrivilegeMode::Sudo {
            return;
        }

        let (stop, mut stopped) = watch::channel(false);
        let session = self.session.clone();
        // A zero period would make tokio's interval panic.
        let period = if self.interval.is_zero() {
            KEEPALIVE_INTERVAL
        } else {
            self.interval
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The interval fires immediately; consume that tick so the first
            // refresh happens one period after acquisition.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        match refresher.refresh().await {
                            Ok(()) => session.touch(),
                            Err(err) => emit(
                                Level::Warn,
                                "privilege.keepalive.failed",
                                &format!("Failed to refresh privilege session: {err}"),
                                None,
                            ),
                        }
                    }
                }
            }
        });

        self.keepalive = Some(Keepalive { stop, handle });
    }

    /// Cancel the keepalive task and wait for it to finish.
    pub async fn shutdown(&mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            let _ = keepalive.stop.send(true);
            let _ = keepalive.handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Refresher for CountingRefresher {
        async fn refresh(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingRefresher;

    #[async_trait]
    impl Refresher for FailingRefresher {
        async fn refresh(&self) -> Result<()> {
            anyhow::bail!("timestamp gone")
        }
    }

    #[test]
    fn test_unauthenticated_session_is_expired() {
        let manager = PrivilegeManager::unauthenticated();
        let session = manager.session();
        assert!(!session.authenticated());
        assert!(session.expired());
        assert_eq!(session.mode(), PrivilegeMode::Unauthenticated);
    }

    #[test]
    fn test_root_session_never_expires() {
        let manager = PrivilegeManager::for_tests(true, true, KEEPALIVE_INTERVAL);
        let session = manager.session();
        assert!(!session.expired());
        assert_eq!(session.mode(), PrivilegeMode::Root);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_keeps_session_alive() {
        let mut manager = PrivilegeManager::for_tests(false, true, KEEPALIVE_INTERVAL);
        let session = manager.session();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        manager.start_keepalive_with(refresher.clone());

        // Well past the expiry horizon with no foreground activity.
        tokio::time::sleep(SESSION_EXPIRY + Duration::from_secs(120)).await;

        assert!(!session.expired(), "keepalive should have refreshed");
        assert_eq!(session.mode(), PrivilegeMode::Sudo);
        assert!(refresher.calls.load(Ordering::SeqCst) >= 5);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_after_shutdown() {
        let mut manager = PrivilegeManager::for_tests(false, true, KEEPALIVE_INTERVAL);
        let session = manager.session();
        manager.start_keepalive_with(Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        }));

        manager.shutdown().await;
        tokio::time::sleep(SESSION_EXPIRY + Duration::from_secs(60)).await;

        assert!(session.expired());
        assert_eq!(session.mode(), PrivilegeMode::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_leaves_timestamp_stale() {
        let mut manager = PrivilegeManager::for_tests(false, true, KEEPALIVE_INTERVAL);
        let session = manager.session();
        manager.start_keepalive_with(Arc::new(FailingRefresher));

        tokio::time::sleep(SESSION_EXPIRY + Duration::from_secs(120)).await;

        // Refreshes failing means the timestamp was never touched.
        assert!(session.expired());

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_without_keepalive_is_noop() {
        let mut manager = PrivilegeManager::unauthenticated();
        manager.shutdown().await;
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_not_started_for_unauthenticated_session() {
        let mut manager = PrivilegeManager::for_tests(false, false, KEEPALIVE_INTERVAL);
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
        });
        manager.start_keepalive_with(refresher.clone());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }
}
