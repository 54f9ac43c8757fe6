//! Session data, state labels and end reasons

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use votechain_core::{AttemptBudget, Candidate, Fault, NationalId, Receipt, Rejection, VoterRecord};

use crate::policy::Deadline;

/// States of one voter interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    AwaitIdInput,
    CheckIn,
    VerifyFinger,
    SelectCandidate,
    SubmitVote,
    Receipt,
    AwaitResetAck,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::AwaitIdInput => "AWAIT_ID_INPUT",
            SessionState::CheckIn => "CHECK_IN",
            SessionState::VerifyFinger => "VERIFY_FINGER",
            SessionState::SelectCandidate => "SELECT_CANDIDATE",
            SessionState::SubmitVote => "SUBMIT_VOTE",
            SessionState::Receipt => "RECEIPT",
            SessionState::AwaitResetAck => "AWAIT_RESET_ACK",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transient data for one voter
#[derive(Debug, Clone)]
pub struct Session {
    pub national_id: Option<NationalId>,
    /// Snapshot from check-in
    pub voter: Option<VoterRecord>,
    pub attempts: AttemptBudget,
    pub selected: Option<Candidate>,
    pub receipt: Option<Receipt>,
    pub started_at: Instant,
    pub started_wall: DateTime<Utc>,
    last_input: Instant,
    idle_timeout: Duration,
}

impl Session {
    pub fn new(attempts: AttemptBudget, idle_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            national_id: None,
            voter: None,
            attempts,
            selected: None,
            receipt: None,
            started_at: now,
            started_wall: Utc::now(),
            last_input: now,
            idle_timeout,
        }
    }

    /// Record operator input, restarting the idle window
    pub fn touch(&mut self) {
        self.last_input = Instant::now();
    }

    pub fn idle_deadline(&self) -> Deadline {
        Deadline::at(self.last_input + self.idle_timeout)
    }

    pub fn idle_expired(&self) -> bool {
        self.idle_deadline().expired()
    }

    /// Deadline measured from session start
    pub fn deadline_from_start(&self, budget: Duration) -> Deadline {
        Deadline::at(self.started_at + budget)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Why a session ended without a denial or a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    Reset,
    Timeout,
    Cancelled,
}

/// Why a voter was turned away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Not registered or already voted
    NotRegistered,
    CheckInRejected(Rejection),
    NetworkUnavailable,
    /// Fingerprint attempts exhausted on sensor failures
    ScanFailed,
    /// Fingerprint attempts exhausted with a wrong or unknown finger last
    FingerMismatch,
}

impl Denial {
    pub fn fault(&self) -> Fault {
        match self {
            Denial::NotRegistered => Fault::BackendRejected {
                reason: "voter not found or already voted".to_string(),
            },
            Denial::CheckInRejected(rejection) => Fault::BackendRejected {
                reason: rejection.message.clone(),
            },
            Denial::NetworkUnavailable => Fault::NetworkUnavailable,
            Denial::ScanFailed => Fault::SensorFailure,
            Denial::FingerMismatch => Fault::NoMatch,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Returned to idle without operator acknowledgement
    Abandoned(AbandonReason),
    /// Turned away at check-in or verification; acknowledged
    Denied(Denial),
    /// The vote was not recorded
    SubmissionFailed(Fault),
    /// The vote was recorded
    Submitted(Receipt),
}

impl SessionEnd {
    pub fn vote_recorded(&self) -> bool {
        matches!(self, SessionEnd::Submitted(_))
    }
}

/// Summary of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub end: SessionEnd,
    /// Every state entered, in order, ending with `Idle`
    pub history: Vec<SessionState>,
    pub duration: Duration,
}

impl SessionReport {
    pub fn visited(&self, state: SessionState) -> bool {
        self.history.contains(&state)
    }

    /// Last state before returning to idle
    pub fn final_state(&self) -> Option<SessionState> {
        self.history
            .iter()
            .rev()
            .copied()
            .find(|s| *s != SessionState::Idle)
    }

    pub fn times_entered(&self, state: SessionState) -> usize {
        self.history.iter().filter(|s| **s == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_window_restarts_on_touch() {
        let mut session = Session::new(AttemptBudget::default(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert!(!session.idle_expired());
        session.touch();
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert!(!session.idle_expired());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(session.idle_expired());
        assert!(session.deadline_from_start(Duration::from_secs(60)).expired());
    }

    #[test]
    fn test_report_final_state() {
        let report = SessionReport {
            end: SessionEnd::Abandoned(AbandonReason::Reset),
            history: vec![
                SessionState::AwaitIdInput,
                SessionState::CheckIn,
                SessionState::AwaitResetAck,
                SessionState::Idle,
            ],
            duration: Duration::ZERO,
        };
        assert_eq!(report.final_state(), Some(SessionState::AwaitResetAck));
        assert!(report.visited(SessionState::CheckIn));
        assert!(!report.visited(SessionState::Receipt));
    }

    #[test]
    fn test_denial_faults_need_acknowledgement() {
        for denial in [
            Denial::NotRegistered,
            Denial::NetworkUnavailable,
            Denial::ScanFailed,
            Denial::FingerMismatch,
        ] {
            assert!(denial.fault().requires_acknowledgement());
        }
    }
}
