//! Voter session state machine
//!
//! One [`SessionMachine`] drives a single voter from national ID entry to the
//! receipt (or a denial) and returns to idle. Every state handler performs
//! one bounded step and names the next state. START acts as reset in every
//! state except the two that wait for it explicitly (receipt and reset
//! acknowledgement). During a network call a reset press is latched and
//! honoured once the call returns.

pub mod receipt;
pub mod state;

use std::time::Duration;

use tokio::time;
use tracing::{info, warn};

use votechain_core::{
    AttemptBudget, AttemptVerdict, CandidateSelection, CheckInResult, Fault,
    FingerprintMatchResult, NationalId, Outcome, Receipt, SelectionEvent, VoteSubmissionResult,
};

use crate::backend::Backend;
use crate::config::KioskConfig;
use crate::devices::{BeepPattern, Button};
use crate::input::Input;
use crate::policy::{bounded, Deadline};
use crate::progress::{CancelSignal, ProgressReporter};
use crate::screen::{Panel, Screen};

pub use receipt::{resolve_receipt, ReceiptPolling};
pub use state::{AbandonReason, Denial, Session, SessionEnd, SessionReport, SessionState};

const CANCEL_NOTICE: Duration = Duration::from_secs(1);
const RETRY_NOTICE: Duration = Duration::from_secs(1);
const TIMEOUT_NOTICE: Duration = Duration::from_secs(2);
const THANK_YOU_NOTICE: Duration = Duration::from_secs(2);

pub struct SessionMachine<'a> {
    input: &'a mut Input,
    panel: &'a mut Panel,
    backend: &'a dyn Backend,
    config: &'a KioskConfig,
    session: Session,
    history: Vec<SessionState>,
    end: Option<SessionEnd>,
}

impl<'a> SessionMachine<'a> {
    pub fn new(
        input: &'a mut Input,
        panel: &'a mut Panel,
        backend: &'a dyn Backend,
        config: &'a KioskConfig,
    ) -> Self {
        let session = Session::new(
            AttemptBudget::new(config.session.finger_attempts),
            config.timeouts.session_idle,
        );
        Self {
            input,
            panel,
            backend,
            config,
            session,
            history: Vec::new(),
            end: None,
        }
    }

    /// Run from AWAIT_ID_INPUT until the session is back at IDLE
    pub async fn run(mut self) -> SessionReport {
        info!("Session started at {}", self.session.started_wall.to_rfc3339());
        let mut state = SessionState::AwaitIdInput;
        self.history.push(state);

        while state != SessionState::Idle {
            let next = match state {
                SessionState::AwaitIdInput => self.await_id_input().await,
                SessionState::CheckIn => self.check_in().await,
                SessionState::VerifyFinger => self.verify_finger().await,
                SessionState::SelectCandidate => self.select_candidate().await,
                SessionState::SubmitVote => self.submit_vote().await,
                SessionState::Receipt => self.show_receipt().await,
                SessionState::AwaitResetAck => self.await_reset_ack().await,
                SessionState::Idle => SessionState::Idle,
            };
            info!("Session state: {} -> {}", state, next);
            self.history.push(next);
            state = next;
        }

        let end = self
            .end
            .take()
            .unwrap_or(SessionEnd::Abandoned(AbandonReason::Reset));
        let duration = self.session.elapsed();
        info!("Session ended after {:?}: {:?}", duration, end);
        SessionReport {
            end,
            history: self.history,
            duration,
        }
    }

    fn abandon(&mut self, reason: AbandonReason) -> SessionState {
        self.end = Some(SessionEnd::Abandoned(reason));
        SessionState::Idle
    }

    fn deny(&mut self, denial: Denial) -> SessionState {
        let (screen, beep) = match &denial {
            Denial::NotRegistered => (Screen::not_registered(), BeepPattern::Error),
            Denial::CheckInRejected(rejection) => {
                (Screen::check_in_rejected(rejection), BeepPattern::Error)
            }
            Denial::NetworkUnavailable => (Screen::network_error(), BeepPattern::Error),
            Denial::ScanFailed => (Screen::access_denied("Scan Failed"), BeepPattern::Denied),
            Denial::FingerMismatch => {
                (Screen::access_denied("Finger Mismatch"), BeepPattern::Denied)
            }
        };
        warn!("Session denied: {}", denial.fault());
        self.panel.show(&screen);
        self.panel.play(beep);
        self.end = Some(SessionEnd::Denied(denial));
        SessionState::AwaitResetAck
    }

    async fn await_id_input(&mut self) -> SessionState {
        let max_len = self.config.input.national_id_max_len;
        let deadline = self.session.deadline_from_start(self.config.timeouts.id_entry);
        self.panel.show(&Screen::id_entry(""));
        self.panel.play(BeepPattern::Prompt);

        let panel = &mut *self.panel;
        let outcome = self
            .input
            .collect_digits(max_len, deadline, |buffer| {
                panel.show(&Screen::id_entry(&buffer.echo_line()))
            })
            .await;

        match outcome {
            Outcome::Ok(digits) => match NationalId::new(digits) {
                Ok(id) => {
                    info!("National ID entered: {}", id.masked());
                    self.session.national_id = Some(id);
                    self.session.touch();
                    SessionState::CheckIn
                }
                Err(e) => {
                    warn!("{}", e);
                    self.abandon(AbandonReason::Cancelled)
                }
            },
            Outcome::Failed(Fault::InputCancelled) => {
                info!("ID entry cancelled");
                self.panel.show(&Screen::cancelled());
                self.input.pause(CANCEL_NOTICE).await;
                self.abandon(AbandonReason::Cancelled)
            }
            Outcome::TimedOut => {
                info!("ID entry timed out");
                self.abandon(AbandonReason::Timeout)
            }
            Outcome::ResetRequested => self.abandon(AbandonReason::Reset),
            Outcome::Failed(fault) => {
                warn!("ID entry failed: {}", fault);
                self.abandon(AbandonReason::Cancelled)
            }
        }
    }

    async fn check_in(&mut self) -> SessionState {
        let Some(id) = self.session.national_id.clone() else {
            return self.abandon(AbandonReason::Cancelled);
        };
        self.panel.show(&Screen::checking(id.as_str()));
        if self.input.reset_pending().await {
            return self.abandon(AbandonReason::Reset);
        }

        let timeout = self.config.timeouts.check_in;
        let mut retries = self.config.session.check_in_retries;
        let backend = self.backend;
        loop {
            let call = bounded(timeout, async {
                backend.check_in(&id).await.map_err(|e| {
                    warn!("Check-in failed: {}", e);
                    Fault::NetworkUnavailable
                })
            });
            let (outcome, reset) = self.input.guard_reset(call).await;
            if reset {
                info!("Honouring reset after check-in");
                return self.abandon(AbandonReason::Reset);
            }

            match outcome {
                Outcome::Ok(CheckInResult::Eligible(voter)) if voter.has_voted => {
                    return self.deny(Denial::NotRegistered);
                }
                Outcome::Ok(CheckInResult::Eligible(voter)) => {
                    info!(
                        "Voter {} checked in; expecting fingerprint #{}",
                        voter.name, voter.expected_fingerprint_id
                    );
                    self.session.voter = Some(voter);
                    self.session.touch();
                    return SessionState::VerifyFinger;
                }
                Outcome::Ok(CheckInResult::NotFound) | Outcome::Ok(CheckInResult::AlreadyVoted) => {
                    return self.deny(Denial::NotRegistered);
                }
                Outcome::Ok(CheckInResult::Rejected(rejection)) => {
                    return self.deny(Denial::CheckInRejected(rejection));
                }
                _ if retries > 0 => {
                    retries -= 1;
                    info!("Retrying check-in ({} retries left)", retries);
                }
                _ => return self.deny(Denial::NetworkUnavailable),
            }
        }
    }

    /// One verification attempt; a retry re-enters this state
    async fn verify_finger(&mut self) -> SessionState {
        let Some(expected) = self
            .session
            .voter
            .as_ref()
            .map(|v| v.expected_fingerprint_id)
        else {
            return self.abandon(AbandonReason::Cancelled);
        };
        if self.session.idle_expired() {
            info!("Session idle timeout during verification");
            return self.abandon(AbandonReason::Timeout);
        }

        self.panel.show(&Screen::verifying());
        let deadline = Deadline::after(self.config.timeouts.finger_scan)
            .earliest(self.session.idle_deadline());

        let failure = match self.input.scan_fingerprint(deadline).await {
            FingerprintMatchResult::Matched(id) if id == expected => {
                info!("Fingerprint matched #{}", id);
                self.session.touch();
                self.panel.play(BeepPattern::Success);
                return SessionState::SelectCandidate;
            }
            FingerprintMatchResult::Matched(id) => {
                warn!("Fingerprint matched #{} but voter expects #{}", id, expected);
                Denial::FingerMismatch
            }
            FingerprintMatchResult::NoMatch => {
                info!("Fingerprint not recognised");
                Denial::FingerMismatch
            }
            FingerprintMatchResult::SensorFailure => {
                info!("Fingerprint scan failed");
                Denial::ScanFailed
            }
            FingerprintMatchResult::ResetRequested => {
                return self.abandon(AbandonReason::Reset);
            }
        };

        match self.session.attempts.record_failure() {
            AttemptVerdict::Retry { next, of } => {
                let reason = match failure {
                    Denial::ScanFailed => "Scan Failed",
                    _ => "Wrong Finger",
                };
                self.panel.show(&Screen::scan_retry(reason, next, of));
                self.panel.play(BeepPattern::Error);
                if self.input.pause(RETRY_NOTICE).await.is_reset() {
                    return self.abandon(AbandonReason::Reset);
                }
                SessionState::VerifyFinger
            }
            AttemptVerdict::Exhausted => self.deny(failure),
        }
    }

    async fn select_candidate(&mut self) -> SessionState {
        let name = self
            .session
            .voter
            .as_ref()
            .map(|v| v.name.clone())
            .unwrap_or_default();
        self.panel.show(&Screen::greeting(&name));

        let mut selection = CandidateSelection::new();
        loop {
            let outcome = self
                .input
                .await_button_press(
                    &[Button::CandidateA, Button::CandidateB],
                    Some(self.session.idle_deadline()),
                )
                .await;

            match outcome {
                Outcome::Ok(button) => {
                    let Some(candidate) = button.candidate() else {
                        continue;
                    };
                    self.session.touch();
                    self.panel.play(BeepPattern::Prompt);
                    match selection.press(candidate) {
                        SelectionEvent::Armed(c) => {
                            info!("{} armed", c);
                            self.panel.show(&Screen::confirm(c));
                        }
                        SelectionEvent::Confirmed(c) => {
                            info!("{} confirmed", c);
                            self.session.selected = Some(c);
                            return SessionState::SubmitVote;
                        }
                    }
                }
                Outcome::TimedOut => {
                    info!("Session idle timeout during candidate selection");
                    self.panel.show(&Screen::session_timed_out());
                    self.input.pause(TIMEOUT_NOTICE).await;
                    return self.abandon(AbandonReason::Timeout);
                }
                Outcome::ResetRequested => return self.abandon(AbandonReason::Reset),
                Outcome::Failed(fault) => {
                    warn!("Candidate selection failed: {}", fault);
                    return self.abandon(AbandonReason::Cancelled);
                }
            }
        }
    }

    async fn submit_vote(&mut self) -> SessionState {
        let (Some(id), Some(candidate)) =
            (self.session.national_id.clone(), self.session.selected)
        else {
            return self.abandon(AbandonReason::Cancelled);
        };
        if self.input.reset_pending().await {
            return self.abandon(AbandonReason::Reset);
        }

        self.panel.show(&Screen::submitting());
        let timeout = self.config.timeouts.vote;
        let reporter = ProgressReporter::new(timeout, self.config.session.reporter_cadence)
            .start_on(CancelSignal::new(), self.panel.display());

        let backend = self.backend;
        let call = bounded(timeout, async {
            Ok::<_, Fault>(backend.submit_vote(&id, candidate).await)
        });
        let (outcome, reset) = self.input.guard_reset(call).await;
        reporter.stop(self.config.timeouts.reporter_grace).await;

        let result = match outcome {
            Outcome::Ok(result) => result,
            _ => {
                warn!("Vote submission exceeded {:?}", timeout);
                VoteSubmissionResult::NetworkFailure
            }
        };

        match result {
            VoteSubmissionResult::Confirmed {
                tx_hash,
                receipt_code,
            } => {
                info!("Vote for {} confirmed in {}", candidate, tx_hash);
                self.panel.show(&Screen::vote_confirmed());
                self.panel.play(BeepPattern::Success);

                let receipt = match receipt_code {
                    Some(code) => Receipt::with_code(code, tx_hash, candidate),
                    None if reset => Receipt::placeholder(tx_hash, candidate),
                    None => {
                        let polling = ReceiptPolling::from(&self.config.timeouts);
                        resolve_receipt(self.backend, &tx_hash, candidate, &polling).await
                    }
                };
                self.end = Some(SessionEnd::Submitted(receipt.clone()));
                if reset {
                    info!("Honouring reset after confirmed vote; skipping receipt");
                    return SessionState::Idle;
                }
                self.session.receipt = Some(receipt);
                self.session.touch();
                SessionState::Receipt
            }
            VoteSubmissionResult::Rejected { reason } => {
                warn!("Vote rejected: {}", reason.message);
                self.end = Some(SessionEnd::SubmissionFailed(Fault::BackendRejected {
                    reason: reason.message.clone(),
                }));
                if reset {
                    return SessionState::Idle;
                }
                self.panel.show(&Screen::vote_rejected(&reason));
                self.panel.play(BeepPattern::Error);
                SessionState::AwaitResetAck
            }
            VoteSubmissionResult::NetworkFailure => {
                warn!("Vote not recorded: backend unreachable");
                self.end = Some(SessionEnd::SubmissionFailed(Fault::NetworkUnavailable));
                if reset {
                    return SessionState::Idle;
                }
                self.panel.show(&Screen::connection_failed());
                self.panel.play(BeepPattern::Error);
                SessionState::AwaitResetAck
            }
        }
    }

    /// Hold the receipt up until START or the idle window closes
    async fn show_receipt(&mut self) -> SessionState {
        let Some(receipt) = self.session.receipt.clone() else {
            return SessionState::Idle;
        };
        let mut pages = vec![Screen::receipt(&receipt)];
        if receipt.placeholder {
            pages.push(Screen::verify_manually(&receipt.tx_hash));
        }

        let mut page = 0usize;
        loop {
            if page == 0 || pages.len() > 1 {
                self.panel.show(&pages[page % pages.len()]);
            }
            let deadline = Deadline::after(self.config.session.receipt_page)
                .earliest(self.session.idle_deadline());
            match self
                .input
                .await_button_press(&[Button::Start], Some(deadline))
                .await
            {
                Outcome::Ok(_) => {
                    self.panel.show(&Screen::thank_you());
                    time::sleep(THANK_YOU_NOTICE).await;
                    return SessionState::Idle;
                }
                Outcome::TimedOut if self.session.idle_expired() => {
                    info!("Receipt screen timed out");
                    return SessionState::Idle;
                }
                Outcome::TimedOut => page += 1,
                Outcome::ResetRequested | Outcome::Failed(_) => return SessionState::Idle,
            }
        }
    }

    /// Wait, without a deadline, for START after a denial or failure
    async fn await_reset_ack(&mut self) -> SessionState {
        self.input.await_button_press(&[Button::Start], None).await;
        info!("Reset acknowledged");
        SessionState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::BackendError;
    use crate::devices::sim::{simulated, SimFinger, SimHandles};
    use crate::input::InputTiming;
    use tokio::time::Instant;
    use votechain_core::keycode::KEY_ESC;
    use votechain_core::{Candidate, Rejection, TxHash, VoterRecord};

    const MS: Duration = Duration::from_millis(1);
    const ID: &str = "123456789012";

    struct Rig {
        input: Input,
        panel: Panel,
        sim: SimHandles,
        config: KioskConfig,
    }

    impl Rig {
        fn new() -> Self {
            let (devices, sim) = simulated();
            let config = KioskConfig::default();
            let input = Input::new(
                devices.buttons,
                devices.keypad,
                devices.sensor,
                InputTiming::from(&config.input),
            );
            let panel = Panel::new(devices.display, devices.feedback);
            Self {
                input,
                panel,
                sim,
                config,
            }
        }

        async fn run(&mut self, backend: &MockBackend) -> SessionReport {
            SessionMachine::new(&mut self.input, &mut self.panel, backend, &self.config)
                .run()
                .await
        }

        /// Type the full ID starting 100ms from now
        fn type_id(&self) -> Instant {
            self.sim
                .keys
                .digits_at(Instant::now() + 100 * MS, 100 * MS, ID)
        }
    }

    fn eligible(fingerprint: u16) -> Result<CheckInResult, BackendError> {
        Ok(CheckInResult::Eligible(VoterRecord {
            name: "Asha".to_string(),
            expected_fingerprint_id: fingerprint,
            has_voted: false,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_vote() {
        let mut rig = Rig::new();
        let start = Instant::now();
        rig.type_id();
        rig.sim.sensor.enroll(7, 70);
        rig.sim
            .sensor
            .touch_at(SimFinger::Print(70), start + 2000 * MS, 3000 * MS);
        rig.sim
            .buttons
            .press_at(Button::CandidateA, start + 6000 * MS, 200 * MS);
        rig.sim
            .buttons
            .press_at(Button::CandidateA, start + 7000 * MS, 200 * MS);
        rig.sim
            .buttons
            .press_at(Button::Start, start + 10_000 * MS, 200 * MS);

        let backend = MockBackend::new().with_check_in(eligible(7)).with_vote(
            VoteSubmissionResult::Confirmed {
                tx_hash: TxHash::new("0xabc"),
                receipt_code: Some("GQ7F2".to_string()),
            },
        );
        let report = rig.run(&backend).await;

        assert_eq!(
            report.history,
            vec![
                SessionState::AwaitIdInput,
                SessionState::CheckIn,
                SessionState::VerifyFinger,
                SessionState::SelectCandidate,
                SessionState::SubmitVote,
                SessionState::Receipt,
                SessionState::Idle,
            ]
        );
        match &report.end {
            SessionEnd::Submitted(receipt) => {
                assert_eq!(receipt.code, "GQ7F2");
                assert_eq!(receipt.candidate, Candidate::A);
            }
            other => panic!("unexpected end: {:?}", other),
        }
        assert!(rig.sim.display.shown("Code: GQ7F2"));
        assert!(rig.sim.display.shown("CONFIRM VOTE:"));
        assert!(rig.sim.display.shown("Vote Submitted!"));
        assert_eq!(backend.vote_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_candidate_rearms() {
        let mut rig = Rig::new();
        let start = Instant::now();
        rig.type_id();
        rig.sim.sensor.enroll(7, 70);
        rig.sim
            .sensor
            .touch_at(SimFinger::Print(70), start + 2000 * MS, 3000 * MS);
        for (at, button) in [
            (6000, Button::CandidateA),
            (7000, Button::CandidateB),
            (8000, Button::CandidateB),
            (12_000, Button::Start),
        ] {
            rig.sim.buttons.press_at(button, start + at * MS, 200 * MS);
        }

        let backend = MockBackend::new()
            .with_check_in(eligible(7))
            .with_vote(VoteSubmissionResult::NetworkFailure);
        let report = rig.run(&backend).await;

        assert_eq!(
            backend.calls().last(),
            Some(&crate::backend::mock::BackendCall::SubmitVote(
                ID.to_string(),
                Candidate::B
            ))
        );
        assert_eq!(
            report.end,
            SessionEnd::SubmissionFailed(Fault::NetworkUnavailable)
        );
        assert_eq!(report.final_state(), Some(SessionState::AwaitResetAck));
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_entry_times_out() {
        let mut rig = Rig::new();
        let start = Instant::now();
        rig.sim.keys.digits_at(start + 100 * MS, 100 * MS, "1234");

        let report = rig.run(&MockBackend::new()).await;
        assert_eq!(report.end, SessionEnd::Abandoned(AbandonReason::Timeout));
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(60));
        assert!(elapsed < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_cancels_entry() {
        let mut rig = Rig::new();
        let start = Instant::now();
        rig.sim.keys.digits_at(start + 100 * MS, 100 * MS, "12");
        rig.sim.keys.key_at(start + 500 * MS, KEY_ESC);

        let backend = MockBackend::new();
        let report = rig.run(&backend).await;
        assert_eq!(report.end, SessionEnd::Abandoned(AbandonReason::Cancelled));
        assert!(rig.sim.display.shown("Cancelled"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_registered_waits_for_reset() {
        let mut rig = Rig::new();
        let start = Instant::now();
        rig.type_id();
        rig.sim
            .buttons
            .press_at(Button::Start, start + 120_000 * MS, 200 * MS);

        let backend = MockBackend::new().with_check_in(Ok(CheckInResult::AlreadyVoted));
        let report = rig.run(&backend).await;

        assert_eq!(report.end, SessionEnd::Denied(Denial::NotRegistered));
        assert_eq!(report.final_state(), Some(SessionState::AwaitResetAck));
        assert!(Instant::now() - start >= Duration::from_secs(120));
        assert!(rig.sim.display.shown("Not Found/Voted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_in_rejection_message_shown() {
        let mut rig = Rig::new();
        let start = Instant::now();
        rig.type_id();
        rig.sim
            .buttons
            .press_at(Button::Start, start + 5000 * MS, 200 * MS);

        let backend = MockBackend::new().with_check_in(Ok(CheckInResult::Rejected(
            Rejection::new("Invalid Aadhaar"),
        )));
        let report = rig.run(&backend).await;
        assert!(matches!(
            report.end,
            SessionEnd::Denied(Denial::CheckInRejected(_))
        ));
        assert!(rig.sim.display.shown("Invalid Aadhaar"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_in_retry_then_network_error() {
        let mut rig = Rig::new();
        rig.config.session.check_in_retries = 1;
        let start = Instant::now();
        rig.type_id();
        rig.sim
            .buttons
            .press_at(Button::Start, start + 30_000 * MS, 200 * MS);

        let backend = MockBackend::new()
            .with_check_in(Err(BackendError::Timeout))
            .with_check_in(Err(BackendError::Connect("refused".to_string())));
        let report = rig.run(&backend).await;

        assert_eq!(report.end, SessionEnd::Denied(Denial::NetworkUnavailable));
        assert_eq!(
            backend.count(|c| matches!(c, crate::backend::mock::BackendCall::CheckIn(_))),
            2
        );
        assert!(rig.sim.display.shown("Network Error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_check_in_is_honoured_after_call() {
        let mut rig = Rig::new();
        let typed = rig.type_id();
        rig.sim
            .buttons
            .press_at(Button::Start, typed + 1000 * MS, 200 * MS);

        let backend =
            MockBackend::new().with_check_in_after(Duration::from_secs(3), eligible(7));
        let report = rig.run(&backend).await;

        assert_eq!(report.end, SessionEnd::Abandoned(AbandonReason::Reset));
        assert!(!report.visited(SessionState::VerifyFinger));
        assert!(Instant::now() >= typed + Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_right_before_check_in_skips_call() {
        let mut rig = Rig::new();
        let typed = rig.type_id();
        // Lands between the last two ID samples; only one sample sees it
        rig.sim
            .buttons
            .press_at(Button::Start, typed - 20 * MS, 1000 * MS);

        let backend = MockBackend::new().with_check_in(eligible(7));
        let report = rig.run(&backend).await;

        assert_eq!(report.end, SessionEnd::Abandoned(AbandonReason::Reset));
        assert_eq!(report.final_state(), Some(SessionState::CheckIn));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_settle_cancels_submission() {
        let mut rig = Rig::new();
        let start = Instant::now();
        rig.type_id();
        rig.sim.sensor.enroll(7, 70);
        rig.sim
            .sensor
            .touch_at(SimFinger::Print(70), start + 2000 * MS, 3000 * MS);
        rig.sim
            .buttons
            .press_at(Button::CandidateA, start + 6000 * MS, 200 * MS);
        rig.sim
            .buttons
            .press_at(Button::CandidateA, start + 7000 * MS, 200 * MS);
        // Pressed after the confirming press, while the kiosk settles
        rig.sim
            .buttons
            .press_at(Button::Start, start + 7120 * MS, 1000 * MS);

        let backend = MockBackend::new()
            .with_check_in(eligible(7))
            .with_vote_after(
                Duration::from_secs(3),
                VoteSubmissionResult::Confirmed {
                    tx_hash: TxHash::new("0xabc"),
                    receipt_code: Some("GQ7F2".to_string()),
                },
            );
        let report = rig.run(&backend).await;

        assert_eq!(backend.vote_calls(), 0);
        assert_eq!(report.end, SessionEnd::Abandoned(AbandonReason::Reset));
        assert_eq!(report.final_state(), Some(SessionState::SubmitVote));
        assert!(Instant::now() < start + 7500 * MS);
    }
}
