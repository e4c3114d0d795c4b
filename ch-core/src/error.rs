//! Global error types for the ClassHub client.
//!
//! All error categories across the workspace are unified into a single
//! `HubError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using HubError.
pub type HubResult<T> = Result<T, HubError>;

/// Unified error type covering all error categories in ClassHub.
#[derive(Error, Debug)]
pub enum HubError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Authentication errors --
    /// No access token is available, or the server rejected it.
    /// Never retried automatically.
    #[error("authentication error: {0}")]
    Auth(String),

    // -- Connection errors --
    /// The negotiate request to the hub failed.
    #[error("negotiate failed: {0}")]
    Negotiate(String),

    /// The hub protocol handshake was rejected.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// WebSocket-level connection error.
    #[error("socket error: {0}")]
    Socket(String),

    /// The connection dropped before an operation completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// An outbound operation was attempted while not connected.
    #[error("not connected to the chat hub")]
    NotConnected,

    // -- Invocation errors --
    /// The server completed a hub invocation with an error.
    #[error("invocation {target} failed: {message}")]
    Invocation {
        /// Hub method name that was invoked.
        target: String,
        /// Error message from the server completion.
        message: String,
    },

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for HubError {
    fn from(e: toml::de::Error) -> Self {
        HubError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_error_display() {
        let err = HubError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn test_invocation_error_display() {
        let err = HubError::Invocation {
            target: "SendGroupMessage".into(),
            message: "group not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "invocation SendGroupMessage failed: group not found"
        );
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(
            HubError::NotConnected.to_string(),
            "not connected to the chat hub"
        );
    }
}
