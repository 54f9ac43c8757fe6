//! Backend client
//!
//! A thin typed wrapper over the VoteChain HTTP API. Each operation is a
//! single request with its own timeout and no retries of its own; the session
//! machine decides what to do on failure.

pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use http::HttpBackend;

use async_trait::async_trait;
use thiserror::Error;

use votechain_core::{
    AdminCommand, Candidate, CheckInResult, NationalId, ReceiptLookup, TxHash,
    VoteSubmissionResult,
};

/// Transport-level failure talking to the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Unexpected response (HTTP {status}): {detail}")]
    Protocol { status: u16, detail: String },
}

/// Operations the kiosk needs from the backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Look up a voter by national ID
    async fn check_in(&self, national_id: &NationalId) -> Result<CheckInResult, BackendError>;

    /// Record a vote
    ///
    /// Transport failures are folded into [`VoteSubmissionResult::NetworkFailure`].
    async fn submit_vote(
        &self,
        national_id: &NationalId,
        candidate: Candidate,
    ) -> VoteSubmissionResult;

    /// Fetch the receipt code attached to a transaction, if any yet
    async fn lookup_receipt(&self, tx_hash: &TxHash) -> Result<ReceiptLookup, BackendError>;

    /// Best-effort admin command poll; any failure is `AdminCommand::None`
    async fn poll_admin_command(&self) -> AdminCommand;

    /// Fire-and-forget enrollment report; failures are logged only
    async fn report_enrollment_result(&self, fingerprint_id: u16, success: bool);

    /// Liveness probe used by the boot self-test
    async fn health(&self) -> Result<(), BackendError>;
}
