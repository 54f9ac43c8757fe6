//! Kiosk main loop

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info};

use votechain_core::{AdminCommand, Outcome};

use crate::admin::{self, EnrollmentFailure, EnrollmentTiming};
use crate::backend::Backend;
use crate::config::KioskConfig;
use crate::devices::{Button, Devices};
use crate::error::{KioskError, Result};
use crate::health::{self, HealthReport};
use crate::input::{Input, InputTiming};
use crate::policy::Deadline;
use crate::screen::{Panel, Screen};
use crate::session::{SessionMachine, SessionReport};

/// What one pass of the idle loop did
#[derive(Debug)]
pub enum Cycle {
    Enrollment {
        target: u16,
        result: std::result::Result<(), EnrollmentFailure>,
    },
    Session(SessionReport),
    /// Nothing happened
    Idle,
}

pub struct Kiosk {
    input: Input,
    panel: Panel,
    backend: Arc<dyn Backend>,
    config: KioskConfig,
    idle_shown: bool,
    sessions: u64,
}

impl Kiosk {
    pub fn new(devices: Devices, backend: Arc<dyn Backend>, config: KioskConfig) -> Self {
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
            backend,
            config,
            idle_shown: false,
            sessions: 0,
        }
    }

    /// Sessions started since boot
    pub fn sessions_started(&self) -> u64 {
        self.sessions
    }

    /// Run the boot self-test; a dead sensor is an error
    pub async fn self_test(&mut self) -> Result<HealthReport> {
        let report = health::self_test(
            &mut self.input,
            &mut self.panel,
            self.backend.as_ref(),
            self.config.timeouts.check_in,
        )
        .await;
        if report.is_fatal() {
            return Err(KioskError::SelfTest(report.sensor.to_string()));
        }
        Ok(report)
    }

    /// One pass of the idle loop
    ///
    /// Admin commands take priority over voters. Otherwise the idle screen
    /// is shown (once) and START is awaited for a short interval.
    pub async fn cycle(&mut self) -> Cycle {
        let command =
            admin::poll_command(self.backend.as_ref(), self.config.timeouts.admin_poll).await;
        if let AdminCommand::Enroll {
            target_fingerprint_id,
            voter_name,
        } = command
        {
            let timing = EnrollmentTiming::from(&self.config.timeouts);
            let result = admin::enroll(
                &mut self.input,
                &mut self.panel,
                self.backend.as_ref(),
                &timing,
                target_fingerprint_id,
                &voter_name,
            )
            .await;
            self.idle_shown = false;
            return Cycle::Enrollment {
                target: target_fingerprint_id,
                result,
            };
        }

        if !self.idle_shown {
            self.panel.show(&Screen::idle());
            self.idle_shown = true;
            debug!("Idle; polling for commands");
        }

        let wait = Deadline::after(self.config.timeouts.idle_wait);
        match self
            .input
            .await_button_press(&[Button::Start], Some(wait))
            .await
        {
            Outcome::Ok(_) => {
                self.sessions += 1;
                info!("Session #{} starting", self.sessions);
                let report = SessionMachine::new(
                    &mut self.input,
                    &mut self.panel,
                    self.backend.as_ref(),
                    &self.config,
                )
                .run()
                .await;
                self.idle_shown = false;
                self.input.settle().await;
                Cycle::Session(report)
            }
            _ => Cycle::Idle,
        }
    }

    /// Cycle until `shutdown` resolves
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("VoteChain kiosk live");
        loop {
            let cycle = tokio::select! {
                _ = &mut shutdown => break,
                cycle = self.cycle() => cycle,
            };
            self.log_cycle(cycle);
        }
        info!("Kiosk stopped after {} sessions", self.sessions);
    }

    fn log_cycle(&self, cycle: Cycle) {
        match cycle {
            Cycle::Enrollment {
                target,
                result: Err(e),
            } => error!("Enrollment #{} failed: {}", target, e),
            Cycle::Enrollment {
                target,
                result: Ok(()),
            } => info!("Enrollment #{} complete", target),
            Cycle::Session(report) => info!(
                "Session #{} finished in {:?} (vote recorded: {})",
                self.sessions,
                report.duration,
                report.end.vote_recorded()
            ),
            Cycle::Idle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{BackendCall, MockBackend};
    use crate::devices::sim::{simulated, SimFinger};
    use crate::session::{AbandonReason, SessionEnd};
    use std::time::Duration;
    use tokio::time::Instant;

    const MS: Duration = Duration::from_millis(1);

    #[tokio::test(start_paused = true)]
    async fn test_enrollment_preempts_idle() {
        let (devices, sim) = simulated();
        let backend = Arc::new(MockBackend::new().with_command(AdminCommand::Enroll {
            target_fingerprint_id: 6,
            voter_name: "Meera".to_string(),
        }));
        let start = Instant::now();
        sim.sensor
            .touch_at(SimFinger::Print(60), start + 500 * MS, 2500 * MS);
        sim.sensor
            .touch_at(SimFinger::Print(60), start + 5000 * MS, 2500 * MS);

        let mut kiosk = Kiosk::new(devices, backend.clone(), KioskConfig::default());
        match kiosk.cycle().await {
            Cycle::Enrollment { target, result } => {
                assert_eq!(target, 6);
                assert_eq!(result, Ok(()));
            }
            other => panic!("unexpected cycle: {:?}", other),
        }
        assert_eq!(sim.sensor.template(6), Some(60));
        assert!(backend
            .calls()
            .contains(&BackendCall::ReportEnrollment {
                fingerprint_id: 6,
                success: true
            }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_shown_once() {
        let (devices, sim) = simulated();
        let backend = Arc::new(MockBackend::new());
        let mut kiosk = Kiosk::new(devices, backend.clone(), KioskConfig::default());

        for _ in 0..3 {
            assert!(matches!(kiosk.cycle().await, Cycle::Idle));
        }
        let idle_frames = sim
            .display
            .frames()
            .iter()
            .filter(|f| f.contains("VOTE"))
            .count();
        assert_eq!(idle_frames, 1);
        assert_eq!(backend.count(|c| *c == BackendCall::PollAdminCommand), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_session() {
        let (devices, sim) = simulated();
        sim.buttons.press_after(Button::Start, 100 * MS, 200 * MS);
        // Second press during ID entry resets the session
        sim.buttons.press_after(Button::Start, 2000 * MS, 200 * MS);

        let mut kiosk = Kiosk::new(devices, Arc::new(MockBackend::new()), KioskConfig::default());
        match kiosk.cycle().await {
            Cycle::Session(report) => {
                assert_eq!(report.end, SessionEnd::Abandoned(AbandonReason::Reset))
            }
            other => panic!("unexpected cycle: {:?}", other),
        }
        assert_eq!(kiosk.sessions_started(), 1);
        assert!(sim.display.shown("Enter National ID"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let (devices, _sim) = simulated();
        let mut kiosk = Kiosk::new(devices, Arc::new(MockBackend::new()), KioskConfig::default());

        let start = Instant::now();
        kiosk
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(Instant::now() - start < Duration::from_secs(6));
        assert_eq!(kiosk.sessions_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_test_fails_without_sensor() {
        let (devices, sim) = simulated();
        sim.sensor.set_responsive(false);
        let mut kiosk = Kiosk::new(devices, Arc::new(MockBackend::new()), KioskConfig::default());
        assert!(matches!(
            kiosk.self_test().await,
            Err(KioskError::SelfTest(_))
        ));
    }
}
