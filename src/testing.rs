//! In-memory host and clock used by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::bridge::{AppInfo, HostBridge, LoginInfo, SessionStatus};
use crate::error::{HostError, HostResult};
use crate::session::Clock;
use crate::user_data::UserData;

pub const T0: i64 = 1_700_000_000;

#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Host double with per-operation call counters, one-shot failure injection
/// and gates that hold an operation until released.
pub struct MockHost {
    clock: Arc<ManualClock>,
    status: Mutex<SessionStatus>,
    data: Mutex<UserData>,
    accepted: Mutex<HashMap<String, i64>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, VecDeque<HostError>>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
    monitored: Mutex<Vec<String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(ManualClock::new(T0)))
    }

    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            status: Mutex::new(SessionStatus::logged_out()),
            data: Mutex::new(UserData::new()),
            accepted: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            monitored: Mutex::new(Vec::new()),
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_secs()
    }

    /// Accept `key` with an expiration `ttl_secs` after the current mock time
    pub fn accept_key(&self, key: &str, ttl_secs: i64) {
        self.accepted
            .lock()
            .insert(key.to_string(), self.now() + ttl_secs);
    }

    pub fn set_status(&self, status: SessionStatus) {
        *self.status.lock() = status;
    }

    pub fn status(&self) -> SessionStatus {
        self.status.lock().clone()
    }

    pub fn stored_data(&self) -> UserData {
        self.data.lock().clone()
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    pub fn monitored_keys(&self) -> Vec<String> {
        self.monitored.lock().clone()
    }

    pub fn fail_next(&self, op: &'static str, error: HostError) {
        self.failures.lock().entry(op).or_default().push_back(error);
    }

    /// Hold every call to `op` until the returned handle is notified
    pub fn gate(&self, op: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().insert(op, notify.clone());
        notify
    }

    async fn enter(&self, op: &'static str) -> HostResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        let gate = self.gates.lock().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.failures.lock().get_mut(op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostBridge for MockHost {
    async fn login(&self, password: &str) -> HostResult<(bool, i64)> {
        self.enter("login").await?;
        if password.is_empty() {
            return Err(HostError::rejected("card key must not be empty"));
        }
        let expiration = self.accepted.lock().get(password).copied();
        match expiration {
            Some(expiration) => {
                *self.status.lock() = SessionStatus::logged_in(LoginInfo {
                    password: Some(password.to_string()),
                    expiration_timestamp: Some(expiration),
                    login_time: Some(self.now()),
                });
                Ok((true, expiration))
            }
            None => Err(HostError::rejected("card key not recognised")),
        }
    }

    async fn start_session_monitor(&self, password: &str) -> HostResult<()> {
        self.enter("start_session_monitor").await?;
        self.monitored.lock().push(password.to_string());
        Ok(())
    }

    async fn get_login_status(&self) -> HostResult<SessionStatus> {
        self.enter("get_login_status").await?;
        Ok(self.status.lock().clone())
    }

    async fn set_login_status(
        &self,
        is_logged_in: bool,
        user_info: Option<LoginInfo>,
    ) -> HostResult<()> {
        self.enter("set_login_status").await?;
        *self.status.lock() = SessionStatus {
            is_logged_in,
            user_info,
        };
        Ok(())
    }

    async fn logout(&self) -> HostResult<()> {
        self.enter("logout").await?;
        *self.status.lock() = SessionStatus::logged_out();
        Ok(())
    }

    async fn check_session_expiration(&self, expiration_timestamp: i64) -> HostResult<i64> {
        self.enter("check_session_expiration").await?;
        if self.now() < expiration_timestamp {
            Ok(expiration_timestamp)
        } else {
            Err(HostError::Expired)
        }
    }

    async fn load_data(&self) -> HostResult<UserData> {
        self.enter("load_data").await?;
        Ok(self.data.lock().clone())
    }

    async fn save_data(&self, data: UserData) -> HostResult<()> {
        self.enter("save_data").await?;
        *self.data.lock() = data;
        Ok(())
    }

    async fn app_info(&self) -> HostResult<AppInfo> {
        self.enter("app_info").await?;
        Ok(AppInfo {
            app: "keygate-test".to_string(),
            version: "0.0.0".to_string(),
        })
    }
}
