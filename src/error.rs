use thiserror::Error;

/// Failures crossing the host bridge.
/// The display text doubles as the user-facing message shown in dialogs.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    /// The host (or the verification backend behind it) could not be reached
    #[error("network request failed: {0}")]
    Transport(String),

    /// The host answered but refused the request
    #[error("{0}")]
    Rejected(String),

    #[error("session expired, please log in again")]
    Expired,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// No host is attached to this bridge
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

impl HostError {
    pub fn rejected(message: impl Into<String>) -> Self {
        HostError::Rejected(message.into())
    }
}

impl From<std::io::Error> for HostError {
    fn from(e: std::io::Error) -> Self {
        HostError::Storage(e.to_string())
    }
}

impl From<serde_yaml::Error> for HostError {
    fn from(e: serde_yaml::Error) -> Self {
        HostError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for HostError {
    fn from(e: serde_json::Error) -> Self {
        HostError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for HostError {
    fn from(e: reqwest::Error) -> Self {
        HostError::Transport(e.to_string())
    }
}

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}
