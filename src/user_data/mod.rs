/// User data accessor
/// Key/value helpers over the single record persisted by the host.
/// Every call reads the whole record, applies one change and writes the whole
/// record back. There is no partial update and no concurrency control: with
/// two writers the last whole-record write wins.
mod model;
mod record;

pub use model::{UserDataModel, UserDataSnapshot};
pub use record::{DataValue, UserData, EXPIRATION_TIME, SCHEMA_VERSION, SECRET_KEY};

use std::sync::Arc;
use tracing::debug;

use crate::bridge::HostBridge;
use crate::error::HostResult;

#[derive(Clone)]
pub struct UserDataAccessor {
    host: Arc<dyn HostBridge>,
}

impl UserDataAccessor {
    pub fn new(host: Arc<dyn HostBridge>) -> Self {
        Self { host }
    }

    pub async fn load(&self) -> HostResult<UserData> {
        self.host.load_data().await
    }

    pub async fn save(&self, data: UserData) -> HostResult<()> {
        self.host.save_data(data).await
    }

    pub async fn get_field(&self, key: &str) -> HostResult<Option<DataValue>> {
        let data = self.load().await?;
        Ok(data.get(key).cloned())
    }

    pub async fn set_field(&self, key: &str, value: impl Into<DataValue>) -> HostResult<()> {
        let mut data = self.load().await?;
        data.insert(key, value);
        debug!("Writing user data field {}", key);
        self.save(data).await
    }

    pub async fn delete_field(&self, key: &str) -> HostResult<()> {
        let mut data = self.load().await?;
        data.remove(key);
        debug!("Removing user data field {}", key);
        self.save(data).await
    }

    /// Saved card key, empty when none was stored
    pub async fn secret_key(&self) -> HostResult<String> {
        let value = self.get_field(SECRET_KEY).await?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    pub async fn save_secret_key(&self, secret_key: &str) -> HostResult<()> {
        self.set_field(SECRET_KEY, secret_key).await
    }

    pub async fn clear_secret_key(&self) -> HostResult<()> {
        self.delete_field(SECRET_KEY).await
    }

    pub async fn expiration_time(&self) -> HostResult<Option<i64>> {
        let value = self.get_field(EXPIRATION_TIME).await?;
        Ok(value.and_then(|v| v.as_i64()).filter(|t| *t != 0))
    }

    pub async fn save_expiration_time(&self, timestamp: i64) -> HostResult<()> {
        self.set_field(EXPIRATION_TIME, timestamp).await
    }

    /// Asks the host whether the stored expiration is still ahead.
    /// `None` when nothing is stored, when it expired, or when the check failed.
    pub async fn check_session_expiration(&self) -> Option<i64> {
        let expiration = match self.expiration_time().await {
            Ok(Some(ts)) => ts,
            Ok(None) => return None,
            Err(e) => {
                debug!("Could not read expiration time: {}", e);
                return None;
            }
        };

        match self.host.check_session_expiration(expiration).await {
            Ok(ts) => Some(ts),
            Err(e) => {
                debug!("Stored session is no longer valid: {}", e);
                None
            }
        }
    }
}
