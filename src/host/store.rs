use std::path::{Path, PathBuf};
use tracing::debug;

use crate::app::{APP_ID, USER_DATA_FILE};
use crate::error::{HostError, HostResult};
use crate::user_data::UserData;

/// The user record as a single YAML document on disk
#[derive(Debug, Clone)]
pub struct YamlStore {
    path: PathBuf,
}

impl YamlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/<app id>/user_data.yml`
    pub fn default_path() -> HostResult<PathBuf> {
        let dir = dirs::data_dir()
            .ok_or_else(|| HostError::Storage("could not determine data directory".to_string()))?;
        Ok(dir.join(APP_ID).join(USER_DATA_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or empty document reads as an empty record
    pub async fn load(&self) -> HostResult<UserData> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!("No user data at {:?}", self.path);
            return Ok(UserData::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(UserData::new());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub async fn save(&self, data: &UserData) -> HostResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_yaml::to_string(data)?;
        tokio::fs::write(&self.path, content).await?;
        debug!("Saved user data to {:?}", self.path);
        Ok(())
    }
}
