//! Admin command polling and remote fingerprint enrollment
//!
//! While idle the kiosk asks the backend for a pending command on every
//! cycle. An `ENROLL` command captures the same finger twice, stores the
//! model in the requested sensor slot and reports the result back.

use std::time::Duration;

use thiserror::Error;
use tokio::time;
use tracing::{debug, info, warn};

use votechain_core::{AdminCommand, Outcome};

use crate::backend::Backend;
use crate::config::Timeouts;
use crate::devices::{
    BeepPattern, IndicatorColor, IndicatorMode, SensorError, SENSOR_ENROLL_MISMATCH,
};
use crate::input::Input;
use crate::policy::Deadline;
use crate::screen::{Panel, Screen};

const REMOVE_NOTICE: Duration = Duration::from_secs(2);
const RESULT_NOTICE: Duration = Duration::from_secs(2);

/// Why an enrollment did not store a template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentFailure {
    #[error("No finger placed for capture {0}")]
    NoFinger(u8),

    #[error("Finger not removed between captures")]
    NotRemoved,

    #[error("Enrollment aborted by reset")]
    Reset,

    #[error("The two captures did not match")]
    Mismatch,

    #[error("Sensor error: {0}")]
    Sensor(String),

    #[error("Could not store template #{location}: {reason}")]
    Store { location: u16, reason: String },
}

/// Deadlines for one enrollment
#[derive(Debug, Clone)]
pub struct EnrollmentTiming {
    pub scan: Duration,
    pub removal: Duration,
    pub report: Duration,
}

impl From<&Timeouts> for EnrollmentTiming {
    fn from(t: &Timeouts) -> Self {
        Self {
            scan: t.enrollment_scan,
            removal: t.finger_removal,
            report: t.enrollment_report,
        }
    }
}

/// Fetch the pending admin command, treating any failure as none
pub async fn poll_command(backend: &dyn Backend, timeout: Duration) -> AdminCommand {
    match time::timeout(timeout, backend.poll_admin_command()).await {
        Ok(command) => command,
        Err(_) => {
            debug!("Admin poll exceeded {:?}", timeout);
            AdminCommand::None
        }
    }
}

/// Run a remote enrollment request end to end and report it
pub async fn enroll(
    input: &mut Input,
    panel: &mut Panel,
    backend: &dyn Backend,
    timing: &EnrollmentTiming,
    target: u16,
    voter_name: &str,
) -> Result<(), EnrollmentFailure> {
    info!("Enrollment requested for {} as #{}", voter_name, target);
    panel.play(BeepPattern::Attention);
    panel.show(&Screen::enroll_place(target));
    input
        .indicate(IndicatorColor::Purple, IndicatorMode::Breathing)
        .await;

    let result = capture_and_store(input, panel, timing, target).await;
    match &result {
        Ok(()) => {
            info!("Enrolled {} as #{}", voter_name, target);
            panel.show(&Screen::enroll_success());
            panel.play(BeepPattern::Enrolled);
            input.indicate(IndicatorColor::Blue, IndicatorMode::On).await;
        }
        Err(e) => {
            warn!("Enrollment of #{} failed: {}", target, e);
            panel.show(&Screen::enroll_failed());
            panel.play(BeepPattern::EnrollFailed);
            input.indicate(IndicatorColor::Red, IndicatorMode::On).await;
        }
    }

    let report = backend.report_enrollment_result(target, result.is_ok());
    if time::timeout(timing.report, report).await.is_err() {
        warn!("Enrollment report for #{} timed out", target);
    }
    time::sleep(RESULT_NOTICE).await;
    result
}

async fn capture_and_store(
    input: &mut Input,
    panel: &mut Panel,
    timing: &EnrollmentTiming,
    target: u16,
) -> Result<(), EnrollmentFailure> {
    capture(input, 1, Deadline::after(timing.scan)).await?;

    panel.show(&Screen::enroll_remove());
    panel.play(BeepPattern::Prompt);
    time::sleep(REMOVE_NOTICE).await;
    match input
        .await_finger_removed(Deadline::after(timing.removal))
        .await
    {
        Outcome::Ok(()) => {}
        Outcome::TimedOut => return Err(EnrollmentFailure::NotRemoved),
        Outcome::ResetRequested => return Err(EnrollmentFailure::Reset),
        Outcome::Failed(fault) => return Err(EnrollmentFailure::Sensor(fault.to_string())),
    }

    panel.show(&Screen::enroll_again());
    capture(input, 2, Deadline::after(timing.scan)).await?;

    input.sensor().create_model().await.map_err(|e| match e {
        SensorError::Status(SENSOR_ENROLL_MISMATCH) => EnrollmentFailure::Mismatch,
        other => EnrollmentFailure::Sensor(other.to_string()),
    })?;
    input
        .sensor()
        .store_model(target)
        .await
        .map_err(|e| EnrollmentFailure::Store {
            location: target,
            reason: e.to_string(),
        })
}

async fn capture(input: &mut Input, slot: u8, deadline: Deadline) -> Result<(), EnrollmentFailure> {
    match input.capture_template(slot, deadline).await {
        Outcome::Ok(()) => Ok(()),
        Outcome::TimedOut => Err(EnrollmentFailure::NoFinger(slot)),
        Outcome::ResetRequested => Err(EnrollmentFailure::Reset),
        Outcome::Failed(fault) => Err(EnrollmentFailure::Sensor(fault.to_string())),
    }
}
