//! Boot self-test

use std::fmt;
use std::time::Duration;

use tokio::time;
use tracing::{error, info, warn};

use crate::backend::Backend;
use crate::devices::{BeepPattern, Button, LedState};
use crate::input::Input;
use crate::screen::{Panel, Screen};

const SENSOR_PROBE: Duration = Duration::from_secs(2);
const LED_FLASH: Duration = Duration::from_millis(500);
const RESULT_NOTICE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentStatus {
    Ok,
    /// Usable, with a problem worth logging
    Degraded(String),
    Failed(String),
}

impl ComponentStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ComponentStatus::Failed(_))
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentStatus::Ok => f.write_str("OK"),
            ComponentStatus::Degraded(why) => write!(f, "WARN {}", why),
            ComponentStatus::Failed(why) => write!(f, "FAIL {}", why),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub sensor: ComponentStatus,
    pub buttons: ComponentStatus,
    pub backend: ComponentStatus,
}

impl HealthReport {
    /// The kiosk cannot verify voters without the sensor
    pub fn is_fatal(&self) -> bool {
        self.sensor.is_failed()
    }

    fn lines(&self) -> [String; 3] {
        [
            format!("Sensor: {}", short(&self.sensor)),
            format!("Buttons: {}", short(&self.buttons)),
            format!("Backend: {}", short(&self.backend)),
        ]
    }
}

fn short(status: &ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Ok => "OK",
        ComponentStatus::Degraded(_) => "WARN",
        ComponentStatus::Failed(_) => "FAIL",
    }
}

/// Probe every device and the backend
///
/// A failed sensor leaves the error screen up with the red LED lit. Backend
/// reachability is informational only.
pub async fn self_test(
    input: &mut Input,
    panel: &mut Panel,
    backend: &dyn Backend,
    backend_timeout: Duration,
) -> HealthReport {
    let sensor = match time::timeout(SENSOR_PROBE, input.sensor().verify()).await {
        Ok(Ok(())) => ComponentStatus::Ok,
        Ok(Err(e)) => ComponentStatus::Failed(e.to_string()),
        Err(_) => ComponentStatus::Failed("no response".to_string()),
    };

    panel.leds(LedState::BOTH);
    time::sleep(LED_FLASH).await;
    panel.leds(LedState::OFF);

    let stuck: Vec<&str> = Button::ALL
        .iter()
        .filter(|b| input.is_asserted(**b))
        .map(|b| b.name())
        .collect();
    let buttons = if stuck.is_empty() {
        ComponentStatus::Ok
    } else {
        ComponentStatus::Degraded(format!("held at boot: {}", stuck.join(", ")))
    };

    let backend = match time::timeout(backend_timeout, backend.health()).await {
        Ok(Ok(())) => ComponentStatus::Ok,
        Ok(Err(e)) => ComponentStatus::Degraded(e.to_string()),
        Err(_) => ComponentStatus::Degraded("health check timed out".to_string()),
    };

    let report = HealthReport {
        sensor,
        buttons,
        backend,
    };
    info!(
        "Self-test: sensor {}, buttons {}, backend {}",
        report.sensor, report.buttons, report.backend
    );

    if report.is_fatal() {
        error!("Fingerprint sensor unavailable: {}", report.sensor);
        panel.show(&Screen::sensor_error());
        panel.play(BeepPattern::Error);
        return report;
    }
    if report.backend != ComponentStatus::Ok {
        warn!("Backend not reachable at boot; sessions will report network errors");
    }

    panel.show(&Screen::self_test(report.lines()));
    time::sleep(RESULT_NOTICE).await;
    panel.play(BeepPattern::Success);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::devices::sim::{simulated, FeedbackEvent, SimHandles};
    use crate::input::InputTiming;

    fn rig() -> (Input, Panel, SimHandles) {
        let (devices, sim) = simulated();
        let input = Input::new(
            devices.buttons,
            devices.keypad,
            devices.sensor,
            InputTiming::default(),
        );
        (input, Panel::new(devices.display, devices.feedback), sim)
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_kiosk() {
        let (mut input, mut panel, sim) = rig();
        let backend = MockBackend::new().healthy();

        let report = self_test(&mut input, &mut panel, &backend, Duration::from_secs(5)).await;
        assert_eq!(report.sensor, ComponentStatus::Ok);
        assert_eq!(report.buttons, ComponentStatus::Ok);
        assert_eq!(report.backend, ComponentStatus::Ok);
        assert!(!report.is_fatal());
        assert!(sim.display.shown("Sensor: OK"));
        assert!(sim
            .feedback
            .events()
            .contains(&FeedbackEvent::Leds(LedState::BOTH)));
        assert_eq!(sim.feedback.leds(), LedState::OFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_backend_is_not_fatal() {
        let (mut input, mut panel, sim) = rig();
        sim.buttons
            .press_now(Button::CandidateA, Duration::from_secs(10));

        let report = self_test(&mut input, &mut panel, &MockBackend::new(), Duration::from_secs(5)).await;
        assert!(matches!(report.backend, ComponentStatus::Degraded(_)));
        assert!(matches!(report.buttons, ComponentStatus::Degraded(_)));
        assert!(!report.is_fatal());
        assert!(sim.display.shown("Backend: WARN"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_sensor_is_fatal() {
        let (mut input, mut panel, sim) = rig();
        sim.sensor.set_responsive(false);

        let report = self_test(&mut input, &mut panel, &MockBackend::new().healthy(), Duration::from_secs(5)).await;
        assert!(report.is_fatal());
        assert!(sim.display.shown("FINGERPRINT ERROR"));
        assert_eq!(sim.feedback.leds(), LedState::RED);
    }
}
