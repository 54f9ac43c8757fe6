//! Scripted backend for tests
//!
//! Responses are queued per operation and consumed in order, each with an
//! optional delay measured on the tokio clock. An empty queue answers with a
//! failure (or `None`/`Pending` for the best-effort operations).

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use votechain_core::{
    AdminCommand, Candidate, CheckInResult, NationalId, ReceiptLookup, TxHash,
    VoteSubmissionResult,
};

use super::{Backend, BackendError};

/// A call the kiosk made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CheckIn(String),
    SubmitVote(String, Candidate),
    LookupReceipt(TxHash),
    PollAdminCommand,
    ReportEnrollment { fingerprint_id: u16, success: bool },
    Health,
}

#[derive(Default)]
struct Script {
    check_ins: VecDeque<(Duration, Result<CheckInResult, BackendError>)>,
    votes: VecDeque<(Duration, VoteSubmissionResult)>,
    lookups: VecDeque<(Duration, Result<ReceiptLookup, BackendError>)>,
    commands: VecDeque<AdminCommand>,
    healthy: bool,
    calls: Vec<BackendCall>,
}

#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Script>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_check_in(self, result: Result<CheckInResult, BackendError>) -> Self {
        self.with_check_in_after(Duration::ZERO, result)
    }

    pub fn with_check_in_after(
        self,
        delay: Duration,
        result: Result<CheckInResult, BackendError>,
    ) -> Self {
        self.script().check_ins.push_back((delay, result));
        self
    }

    pub fn with_vote(self, result: VoteSubmissionResult) -> Self {
        self.with_vote_after(Duration::ZERO, result)
    }

    pub fn with_vote_after(self, delay: Duration, result: VoteSubmissionResult) -> Self {
        self.script().votes.push_back((delay, result));
        self
    }

    pub fn with_lookup(self, result: Result<ReceiptLookup, BackendError>) -> Self {
        self.script().lookups.push_back((Duration::ZERO, result));
        self
    }

    pub fn with_lookup_after(
        self,
        delay: Duration,
        result: Result<ReceiptLookup, BackendError>,
    ) -> Self {
        self.script().lookups.push_back((delay, result));
        self
    }

    pub fn with_command(self, command: AdminCommand) -> Self {
        self.script().commands.push_back(command);
        self
    }

    pub fn healthy(self) -> Self {
        self.script().healthy = true;
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.script().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&BackendCall) -> bool) -> usize {
        self.script().calls.iter().filter(|c| matches(c)).count()
    }

    pub fn vote_calls(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::SubmitVote(..)))
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn check_in(&self, national_id: &NationalId) -> Result<CheckInResult, BackendError> {
        let next = {
            let mut script = self.script();
            script
                .calls
                .push(BackendCall::CheckIn(national_id.as_str().to_string()));
            script.check_ins.pop_front()
        };
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(BackendError::Connect("no scripted check-in".to_string())),
        }
    }

    async fn submit_vote(
        &self,
        national_id: &NationalId,
        candidate: Candidate,
    ) -> VoteSubmissionResult {
        let next = {
            let mut script = self.script();
            script.calls.push(BackendCall::SubmitVote(
                national_id.as_str().to_string(),
                candidate,
            ));
            script.votes.pop_front()
        };
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => VoteSubmissionResult::NetworkFailure,
        }
    }

    async fn lookup_receipt(&self, tx_hash: &TxHash) -> Result<ReceiptLookup, BackendError> {
        let next = {
            let mut script = self.script();
            script.calls.push(BackendCall::LookupReceipt(tx_hash.clone()));
            script.lookups.pop_front()
        };
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(ReceiptLookup::Pending),
        }
    }

    async fn poll_admin_command(&self) -> AdminCommand {
        let mut script = self.script();
        script.calls.push(BackendCall::PollAdminCommand);
        script.commands.pop_front().unwrap_or_default()
    }

    async fn report_enrollment_result(&self, fingerprint_id: u16, success: bool) {
        self.script().calls.push(BackendCall::ReportEnrollment {
            fingerprint_id,
            success,
        });
    }

    async fn health(&self) -> Result<(), BackendError> {
        let mut script = self.script();
        script.calls.push(BackendCall::Health);
        if script.healthy {
            Ok(())
        } else {
            Err(BackendError::Connect("mock backend offline".to_string()))
        }
    }
}
