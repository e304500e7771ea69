//! Error types for the Commonweal SDK

use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, HubError>;

/// SDK error types
///
/// Variants carry owned strings so a result can be cloned out to every
/// caller waiting on a deduplicated request.
#[derive(Error, Debug, Clone)]
pub enum HubError {
    /// No signed-in session for an operation that requires one
    #[error("Sign-in required")]
    AuthRequired,

    /// Signed in but lacking the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Gateway returned a non-success response
    #[error("Gateway error {status}: {message}")]
    Gateway { status: u16, message: String },

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rejected before reaching the gateway
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        HubError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Serialization(err.to_string())
    }
}
