//! Error types for the VoteChain kiosk

use thiserror::Error;

/// Result type alias for kiosk operations
pub type Result<T> = std::result::Result<T, KioskError>;

/// Errors that can occur outside the voter-facing flow
///
/// Failures inside a session are carried by [`votechain_core::Outcome`] and
/// never surface as a `KioskError`.
#[derive(Debug, Error)]
pub enum KioskError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Boot self-test failed
    #[error("Hardware self-test failed: {0}")]
    SelfTest(String),
}

impl From<serde_json::Error> for KioskError {
    fn from(e: serde_json::Error) -> Self {
        KioskError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for KioskError {
    fn from(e: reqwest::Error) -> Self {
        KioskError::Http(e.to_string())
    }
}
