/// In-process reference host
/// Implements every bridge operation locally: card verification over HTTP,
/// login state behind a mutex, a per-login background monitor, and the user
/// record stored as YAML.
mod monitor;
mod store;
mod verify;

pub use store::YamlStore;
pub use verify::{check_expiration, hardware_id, CardVerifier, HttpCardVerifier};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::app::{APP_NAME, APP_VERSION};
use crate::bridge::{AppInfo, HostBridge, LoginInfo, SessionStatus};
use crate::error::{HostError, HostResult};
use crate::session::{Clock, SystemClock};
use crate::user_data::UserData;

pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(10);

struct MonitorHandle {
    id: u64,
    shutdown: broadcast::Sender<()>,
}

#[derive(Default)]
pub(crate) struct LoginState {
    is_logged_in: bool,
    user_info: Option<LoginInfo>,
    monitor: Option<MonitorHandle>,
    next_monitor_id: u64,
}

impl LoginState {
    fn monitor_id(&self) -> Option<u64> {
        self.monitor.as_ref().map(|m| m.id)
    }

    /// Logged out, monitor signalled to stop
    fn clear(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.shutdown.send(());
        }
        self.is_logged_in = false;
        self.user_info = None;
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            is_logged_in: self.is_logged_in,
            user_info: self.user_info.clone(),
        }
    }
}

pub struct LocalHost {
    verifier: Arc<dyn CardVerifier>,
    store: YamlStore,
    clock: Arc<dyn Clock>,
    monitor_interval: Duration,
    state: Arc<Mutex<LoginState>>,
}

impl LocalHost {
    pub fn new(verifier: Arc<dyn CardVerifier>, store: YamlStore) -> Self {
        Self {
            verifier,
            store,
            clock: Arc::new(SystemClock),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            state: Arc::new(Mutex::new(LoginState::default())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn store(&self) -> &YamlStore {
        &self.store
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.lock().monitor.is_some()
    }

    /// Replaces any running monitor
    fn start_monitoring(&self, key: &str) {
        let (shutdown, receiver) = broadcast::channel(1);
        let id = {
            let mut state = self.state.lock();
            if let Some(previous) = state.monitor.take() {
                let _ = previous.shutdown.send(());
            }
            state.next_monitor_id += 1;
            let id = state.next_monitor_id;
            state.monitor = Some(MonitorHandle { id, shutdown });
            id
        };

        monitor::spawn(
            id,
            key.to_string(),
            self.verifier.clone(),
            self.state.clone(),
            self.monitor_interval,
            receiver,
        );
    }
}

#[async_trait]
impl HostBridge for LocalHost {
    async fn login(&self, password: &str) -> HostResult<(bool, i64)> {
        if password.is_empty() {
            return Err(HostError::rejected("card key must not be empty"));
        }
        info!("Starting card key verification");
        let expiration = self.verifier.verify(password).await?;

        {
            let mut state = self.state.lock();
            state.is_logged_in = true;
            state.user_info = Some(LoginInfo {
                password: Some(password.to_string()),
                expiration_timestamp: Some(expiration),
                login_time: Some(self.clock.now_secs()),
            });
        }
        self.start_monitoring(password);

        info!("Card key accepted, expires at {}", expiration);
        Ok((true, expiration))
    }

    async fn start_session_monitor(&self, password: &str) -> HostResult<()> {
        if self.is_monitoring() {
            debug!("Session monitor already running");
            return Ok(());
        }
        self.start_monitoring(password);
        Ok(())
    }

    async fn get_login_status(&self) -> HostResult<SessionStatus> {
        Ok(self.state.lock().status())
    }

    async fn set_login_status(
        &self,
        is_logged_in: bool,
        user_info: Option<LoginInfo>,
    ) -> HostResult<()> {
        let mut state = self.state.lock();
        state.is_logged_in = is_logged_in;
        state.user_info = user_info;
        Ok(())
    }

    async fn logout(&self) -> HostResult<()> {
        self.state.lock().clear();
        info!("Logged out");
        Ok(())
    }

    async fn check_session_expiration(&self, expiration_timestamp: i64) -> HostResult<i64> {
        check_expiration(expiration_timestamp, self.clock.now_secs())
    }

    async fn load_data(&self) -> HostResult<UserData> {
        self.store.load().await
    }

    async fn save_data(&self, data: UserData) -> HostResult<()> {
        self.store.save(&data).await
    }

    async fn app_info(&self) -> HostResult<AppInfo> {
        Ok(AppInfo {
            app: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
        })
    }
}
