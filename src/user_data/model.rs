use parking_lot::RwLock;
use tracing::{error, warn};

use super::{DataValue, UserData, UserDataAccessor};
use crate::error::HostResult;

/// What a user data page renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDataSnapshot {
    pub data: UserData,
    pub loading: bool,
    pub error: Option<String>,
}

/// Cached view of the user record for pages that list and edit fields.
/// Reads absorb failures into `error` and keep the last good copy.
/// Writes return the failure to the caller and refresh the cache on success.
pub struct UserDataModel {
    accessor: UserDataAccessor,
    state: RwLock<UserDataSnapshot>,
}

impl UserDataModel {
    pub fn new(accessor: UserDataAccessor) -> Self {
        Self {
            accessor,
            state: RwLock::new(UserDataSnapshot {
                loading: true,
                ..UserDataSnapshot::default()
            }),
        }
    }

    pub fn snapshot(&self) -> UserDataSnapshot {
        self.state.read().clone()
    }

    pub fn data(&self) -> UserData {
        self.state.read().data.clone()
    }

    pub async fn reload(&self) {
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        let result = self.accessor.load().await;

        let mut state = self.state.write();
        match result {
            Ok(data) => state.data = data,
            Err(e) => {
                error!("Failed to load user data: {}", e);
                state.error = Some(e.to_string());
            }
        }
        state.loading = false;
    }

    pub async fn save(&self, data: UserData) -> HostResult<()> {
        self.state.write().error = None;
        match self.accessor.save(data.clone()).await {
            Ok(()) => {
                self.state.write().data = data;
                Ok(())
            }
            Err(e) => Err(self.record_error(e)),
        }
    }

    pub async fn update_field(&self, key: &str, value: impl Into<DataValue>) -> HostResult<()> {
        self.state.write().error = None;
        if let Err(e) = self.accessor.set_field(key, value).await {
            return Err(self.record_error(e));
        }
        self.reload().await;
        Ok(())
    }

    pub async fn remove_field(&self, key: &str) -> HostResult<()> {
        self.state.write().error = None;
        if let Err(e) = self.accessor.delete_field(key).await {
            return Err(self.record_error(e));
        }
        self.reload().await;
        Ok(())
    }

    /// Fresh read of one field; falls back to the cached copy on failure
    pub async fn field(&self, key: &str) -> Option<DataValue> {
        match self.accessor.get_field(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read field {}: {}", key, e);
                let mut state = self.state.write();
                state.error = Some(e.to_string());
                state.data.get(key).cloned()
            }
        }
    }

    fn record_error(&self, e: crate::error::HostError) -> crate::error::HostError {
        self.state.write().error = Some(e.to_string());
        e
    }
}
