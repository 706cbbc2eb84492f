use thiserror::Error;

use crate::types::AccountId;

/// Voicemail bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Bad input, e.g. a callback without a recipient
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A retried delivery still has no reachable recipient
    #[error("Retried delivery but {to} still doesn't have an account")]
    PersistentNonDelivery { to: String },

    /// The platform API answered with a non-success status
    #[error("{path} (on behalf of {account_id}) returned {status}")]
    RemoteRejected {
        path: String,
        account_id: AccountId,
        status: u16,
    },

    /// The SMS provider answered with an unexpected status
    #[error("{path} returned {status}")]
    NotificationRejected { path: String, status: u16 },

    /// Network, serialization or deadline failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backing store unavailable or inconsistent
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Create a new InvalidRequest error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new Transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new Storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Short, stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PersistentNonDelivery { .. } => "persistent_non_delivery",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::NotificationRejected { .. } => "notification_rejected",
            Self::Transport(_) => "transport",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
        }
    }
}

impl From<sqlx::Error> for BridgeError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {}", err))
    }
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
