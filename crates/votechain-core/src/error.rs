//! Error types for the VoteChain core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Invalid domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid national ID: {0}")]
    InvalidNationalId(String),

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(u8),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedPayload(e.to_string())
    }
}

/// Why a single kiosk step did not succeed
///
/// This is the cause carried by [`crate::Outcome::Failed`]. `ResetRequested`
/// and `InputTimeout` also have dedicated outcome variants; they appear here
/// so that a fault can be logged or shown without losing the distinction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("Input timed out")]
    InputTimeout,

    #[error("Input cancelled")]
    InputCancelled,

    #[error("Reset requested")]
    ResetRequested,

    #[error("Fingerprint sensor failure")]
    SensorFailure,

    #[error("Fingerprint did not match")]
    NoMatch,

    #[error("Network unavailable")]
    NetworkUnavailable,

    #[error("Backend rejected request: {reason}")]
    BackendRejected { reason: String },
}

impl Fault {
    /// Whether this fault must be acknowledged with the reset button
    pub fn requires_acknowledgement(&self) -> bool {
        matches!(
            self,
            Fault::SensorFailure
                | Fault::NoMatch
                | Fault::NetworkUnavailable
                | Fault::BackendRejected { .. }
        )
    }
}
