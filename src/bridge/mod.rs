/// Host bridge
/// The front end never verifies keys, times sessions or touches disk itself.
/// Every such operation is a request to the host behind this trait.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HostResult;
use crate::user_data::UserData;

/// Login details recorded by the host once a key is accepted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_time: Option<i64>,
}

/// Login status as reported by the host.
/// `user_info` only carries meaning while `is_logged_in` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub is_logged_in: bool,
    #[serde(default)]
    pub user_info: Option<LoginInfo>,
}

impl SessionStatus {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn logged_in(info: LoginInfo) -> Self {
        Self {
            is_logged_in: true,
            user_info: Some(info),
        }
    }

    pub fn expiration_timestamp(&self) -> Option<i64> {
        self.user_info.as_ref().and_then(|i| i.expiration_timestamp)
    }

    /// Logged in and `now_secs` strictly before the expiration.
    /// A missing expiration is never valid.
    pub fn is_valid_at(&self, now_secs: i64) -> bool {
        if !self.is_logged_in {
            return false;
        }
        match self.expiration_timestamp() {
            Some(expiration) => now_secs < expiration,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app: String,
    pub version: String,
}

/// Request/response operations exposed by the host process
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Verify a card key. Returns whether it was accepted and its expiration (epoch seconds).
    async fn login(&self, password: &str) -> HostResult<(bool, i64)>;

    /// Start host-side periodic re-verification of the key
    async fn start_session_monitor(&self, password: &str) -> HostResult<()>;

    async fn get_login_status(&self) -> HostResult<SessionStatus>;

    async fn set_login_status(
        &self,
        is_logged_in: bool,
        user_info: Option<LoginInfo>,
    ) -> HostResult<()>;

    /// Clear the host-side session and stop its monitor
    async fn logout(&self) -> HostResult<()>;

    /// Returns the timestamp back while it is still in the future; an error means expired
    async fn check_session_expiration(&self, expiration_timestamp: i64) -> HostResult<i64>;

    /// Whole-document read of the persisted user record
    async fn load_data(&self) -> HostResult<UserData>;

    /// Whole-document write of the persisted user record
    async fn save_data(&self, data: UserData) -> HostResult<()>;

    async fn app_info(&self) -> HostResult<AppInfo>;
}
