use crate::config::ConfigError;
use thiserror::Error;

/// Errors that stop the authenticator service
///
/// Per-message problems never surface here; they are logged and the
/// message is dropped.
#[derive(Error, Debug)]
pub enum AuthenticatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Transport error on {endpoint}: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Service task ended unexpectedly: {0}")]
    TaskFailed(String),

    #[error("Authenticator service has stopped")]
    Closed,
}

impl AuthenticatorError {
    pub fn transport(endpoint: &'static str, source: std::io::Error) -> Self {
        AuthenticatorError::Transport { endpoint, source }
    }
}
