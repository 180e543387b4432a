/// Session-state coordinator
/// Mirrors the host's login status, derives session validity from it and
/// owns the recurring liveness check that logs out an expired session.
///
/// Overlapping operations are not serialized: whichever host call resolves
/// last decides the local state. Calls that resolve after `shutdown` are
/// dropped instead of being applied.
mod clock;

pub use clock::{Clock, SystemClock};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bridge::{HostBridge, LoginInfo, SessionStatus};
use crate::error::HostResult;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Everything a page needs to render session state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::logged_out(),
            loading: true,
            error: None,
        }
    }
}

/// Derived values the route guard evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView {
    pub is_logged_in: bool,
    pub is_valid: bool,
    pub loading: bool,
}

pub struct SessionCoordinator {
    inner: Arc<Inner>,
    liveness: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    host: Arc<dyn HostBridge>,
    clock: Arc<dyn Clock>,
    check_interval: Duration,
    state: watch::Sender<SessionSnapshot>,
    epoch: AtomicU64,
    started: AtomicBool,
}

impl SessionCoordinator {
    pub fn new(host: Arc<dyn HostBridge>, clock: Arc<dyn Clock>, check_interval: Duration) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                host,
                clock,
                check_interval,
                state,
                epoch: AtomicU64::new(0),
                started: AtomicBool::new(false),
            }),
            liveness: Mutex::new(None),
        }
    }

    pub fn with_system_clock(host: Arc<dyn HostBridge>) -> Self {
        Self::new(host, Arc::new(SystemClock), DEFAULT_CHECK_INTERVAL)
    }

    /// First activation: starts the liveness task and fetches the status once.
    /// Later calls do nothing.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("Session coordinator already started");
            return;
        }

        let inner = self.inner.clone();
        let period = inner.check_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner.check_liveness().await;
            }
        });
        *self.liveness.lock() = Some(handle);
        info!("Session liveness check every {:?}", period);

        self.inner.fetch_status().await;
    }

    /// Stops the liveness task and detaches in-flight host calls from local state
    pub fn shutdown(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.liveness.lock().take() {
            handle.abort();
            debug!("Session liveness check stopped");
        }
    }

    pub async fn fetch_status(&self) {
        self.inner.fetch_status().await
    }

    pub async fn set_status(&self, is_logged_in: bool, user_info: Option<LoginInfo>) -> HostResult<()> {
        self.inner.set_status(is_logged_in, user_info).await
    }

    pub async fn logout(&self) -> HostResult<()> {
        self.inner.logout().await
    }

    /// Logged in, expiration known, and now strictly before it. Never does I/O.
    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.state.borrow().status.is_logged_in
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn user_info(&self) -> Option<LoginInfo> {
        self.inner.state.borrow().status.user_info.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn view(&self) -> SessionView {
        let snapshot = self.inner.state.borrow();
        SessionView {
            is_logged_in: snapshot.status.is_logged_in,
            is_valid: snapshot.status.is_valid_at(self.inner.clock.now_secs()),
            loading: snapshot.loading,
        }
    }

    /// Notified on every local state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn is_valid(&self) -> bool {
        self.state.borrow().status.is_valid_at(self.clock.now_secs())
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Apply `f` unless the coordinator was torn down since `epoch`
    fn apply(&self, epoch: u64, f: impl FnOnce(&mut SessionSnapshot)) -> bool {
        if self.current_epoch() != epoch {
            debug!("Discarding session update from a torn down coordinator");
            return false;
        }
        self.state.send_modify(f);
        true
    }

    async fn fetch_status(&self) {
        let epoch = self.current_epoch();
        self.apply(epoch, |s| {
            s.loading = true;
            s.error = None;
        });

        let result = self.host.get_login_status().await;

        self.apply(epoch, |s| {
            match result {
                Ok(status) => s.status = status,
                Err(e) => {
                    error!("Failed to fetch login status: {}", e);
                    s.error = Some(e.to_string());
                }
            }
            s.loading = false;
        });
    }

    async fn set_status(&self, is_logged_in: bool, user_info: Option<LoginInfo>) -> HostResult<()> {
        let epoch = self.current_epoch();
        self.apply(epoch, |s| s.error = None);

        if let Err(e) = self
            .host
            .set_login_status(is_logged_in, user_info.clone())
            .await
        {
            self.apply(epoch, |s| s.error = Some(e.to_string()));
            return Err(e);
        }

        self.apply(epoch, |s| {
            s.status = SessionStatus {
                is_logged_in,
                user_info,
            }
        });
        Ok(())
    }

    async fn logout(&self) -> HostResult<()> {
        let epoch = self.current_epoch();
        self.apply(epoch, |s| s.error = None);

        if let Err(e) = self.host.logout().await {
            self.apply(epoch, |s| s.error = Some(e.to_string()));
            return Err(e);
        }

        if self.apply(epoch, |s| s.status = SessionStatus::logged_out()) {
            self.fetch_status().await;
        }
        Ok(())
    }

    async fn check_liveness(&self) {
        let logged_in = self.state.borrow().status.is_logged_in;
        if logged_in && !self.is_valid() {
            info!("Session expired, logging out");
            if let Err(e) = self.logout().await {
                warn!("Automatic logout failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::testing::{ManualClock, MockHost, T0};

    fn coordinator() -> (Arc<MockHost>, Arc<ManualClock>, Arc<SessionCoordinator>) {
        let clock = Arc::new(ManualClock::new(T0));
        let host = Arc::new(MockHost::with_clock(clock.clone()));
        let coordinator = Arc::new(SessionCoordinator::new(
            host.clone(),
            clock.clone(),
            DEFAULT_CHECK_INTERVAL,
        ));
        (host, clock, coordinator)
    }

    fn info(expiration: i64) -> LoginInfo {
        LoginInfo {
            password: Some("CARD-1".to_string()),
            expiration_timestamp: Some(expiration),
            login_time: Some(T0),
        }
    }

    #[tokio::test]
    async fn test_start_fetches_exactly_once() {
        let (host, _clock, coordinator) = coordinator();
        assert!(coordinator.is_loading());

        coordinator.start().await;
        coordinator.start().await;

        assert_eq!(host.calls("get_login_status"), 1);
        assert!(!coordinator.is_loading());
        assert!(!coordinator.is_logged_in());
    }

    #[tokio::test]
    async fn test_fetch_twice_is_idempotent() {
        let (host, _clock, coordinator) = coordinator();
        host.set_status(SessionStatus::logged_in(info(T0 + 3600)));

        coordinator.fetch_status().await;
        let first = coordinator.snapshot();
        coordinator.fetch_status().await;
        let second = coordinator.snapshot();

        assert_eq!(first, second);
        assert!(coordinator.is_valid());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stale_status() {
        let (host, _clock, coordinator) = coordinator();
        host.set_status(SessionStatus::logged_in(info(T0 + 3600)));
        coordinator.fetch_status().await;

        host.fail_next("get_login_status", HostError::Transport("bridge closed".to_string()));
        coordinator.fetch_status().await;

        let snapshot = coordinator.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.status.is_logged_in);
        assert_eq!(snapshot.error.as_deref(), Some("network request failed: bridge closed"));
    }

    #[tokio::test]
    async fn test_set_status_mirrors_after_push() {
        let (host, _clock, coordinator) = coordinator();
        coordinator.set_status(true, Some(info(T0 + 60))).await.unwrap();

        assert!(coordinator.is_logged_in());
        assert!(coordinator.is_valid());
        assert_eq!(host.status(), SessionStatus::logged_in(info(T0 + 60)));
    }

    #[tokio::test]
    async fn test_set_status_failure_propagates_without_local_change() {
        let (host, _clock, coordinator) = coordinator();
        host.fail_next("set_login_status", HostError::rejected("denied"));

        let err = coordinator.set_status(true, Some(info(T0 + 60))).await.unwrap_err();
        assert_eq!(err, HostError::rejected("denied"));
        assert!(!coordinator.is_logged_in());
        assert_eq!(coordinator.error().as_deref(), Some("denied"));
    }

    #[tokio::test]
    async fn test_logout_clears_and_reconciles() {
        let (host, _clock, coordinator) = coordinator();
        coordinator.set_status(true, Some(info(T0 + 60))).await.unwrap();

        coordinator.logout().await.unwrap();

        assert!(!coordinator.is_logged_in());
        assert!(coordinator.user_info().is_none());
        assert_eq!(host.calls("logout"), 1);
        assert_eq!(host.calls("get_login_status"), 1);
    }

    #[tokio::test]
    async fn test_logout_failure_propagates() {
        let (host, _clock, coordinator) = coordinator();
        coordinator.set_status(true, Some(info(T0 + 60))).await.unwrap();
        host.fail_next("logout", HostError::Transport("timeout".to_string()));

        assert!(coordinator.logout().await.is_err());
        assert!(coordinator.is_logged_in());
        assert!(coordinator.error().is_some());
    }

    #[tokio::test]
    async fn test_validity_follows_clock() {
        let (_host, clock, coordinator) = coordinator();
        coordinator.set_status(true, Some(info(T0 + 10))).await.unwrap();
        assert!(coordinator.is_valid());

        clock.advance(10);
        assert!(!coordinator.is_valid());
        assert!(coordinator.is_logged_in());

        coordinator.set_status(false, Some(info(T0 + 10_000))).await.unwrap();
        assert!(!coordinator.is_valid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_check_logs_out_expired_session() {
        let (host, clock, coordinator) = coordinator();
        host.accept_key("CARD-1", 3600);
        let (accepted, expiration) = host.login("CARD-1").await.unwrap();
        assert!(accepted);
        assert_eq!(expiration, T0 + 3600);

        coordinator.start().await;
        assert!(coordinator.is_logged_in());
        assert!(coordinator.is_valid());

        clock.advance(3601);
        assert!(!coordinator.is_valid());

        let mut rx = coordinator.subscribe();
        tokio::time::timeout(Duration::from_secs(120), async {
            while rx.borrow_and_update().status.is_logged_in {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        assert!(!coordinator.is_logged_in());
        assert_eq!(host.calls("logout"), 1);
        assert!(!host.status().is_logged_in);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_check_leaves_valid_session_alone() {
        let (host, _clock, coordinator) = coordinator();
        host.set_status(SessionStatus::logged_in(info(T0 + 3600)));
        coordinator.start().await;

        tokio::time::sleep(Duration::from_secs(60 * 5 + 1)).await;

        assert!(coordinator.is_logged_in());
        assert_eq!(host.calls("logout"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_liveness_check() {
        let (host, clock, coordinator) = coordinator();
        host.set_status(SessionStatus::logged_in(info(T0 + 30)));
        coordinator.start().await;
        coordinator.shutdown();

        clock.advance(120);
        tokio::time::sleep(Duration::from_secs(180)).await;

        assert_eq!(host.calls("logout"), 0);
    }

    #[tokio::test]
    async fn test_late_response_after_shutdown_is_discarded() {
        let (host, _clock, coordinator) = coordinator();
        host.set_status(SessionStatus::logged_in(info(T0 + 3600)));
        let gate = host.gate("get_login_status");

        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.fetch_status().await })
        };
        while host.calls("get_login_status") == 0 {
            tokio::task::yield_now().await;
        }

        coordinator.shutdown();
        gate.notify_one();
        pending.await.unwrap();

        assert!(!coordinator.is_logged_in());
    }

    #[tokio::test]
    async fn test_view_reports_guard_inputs() {
        let (host, _clock, coordinator) = coordinator();
        assert_eq!(
            coordinator.view(),
            SessionView {
                is_logged_in: false,
                is_valid: false,
                loading: true
            }
        );

        host.set_status(SessionStatus::logged_in(info(T0 + 5)));
        coordinator.fetch_status().await;
        assert_eq!(
            coordinator.view(),
            SessionView {
                is_logged_in: true,
                is_valid: true,
                loading: false
            }
        );
    }
}
