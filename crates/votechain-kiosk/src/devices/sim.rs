//! In-memory devices driven by timed scripts
//!
//! Each simulated device comes with a cloneable script handle. Button presses
//! and finger touches are windows on the tokio clock, so a test running with
//! a paused clock can lay out a whole voter interaction up front. The console
//! front panel uses the same handles, scheduling events at "now".

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{
    BeepPattern, Button, Buttons, Devices, Display, Feedback, FingerprintSensor, ImageStatus,
    IndicatorColor, IndicatorMode, Keypad, LedState, SensorError, SensorResult,
    SENSOR_BAD_LOCATION, SENSOR_ENROLL_MISMATCH, SENSOR_NO_IMAGE,
};

/// Highest template location the simulated sensor accepts
pub const SIM_SENSOR_CAPACITY: u16 = 127;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
struct Window {
    from: Instant,
    until: Instant,
}

impl Window {
    fn new(at: Instant, hold: Duration) -> Self {
        Self {
            from: at,
            until: at + hold,
        }
    }

    fn contains(&self, now: Instant) -> bool {
        self.from <= now && now < self.until
    }
}

// ---------------------------------------------------------------------------
// Buttons
// ---------------------------------------------------------------------------

/// Schedules button presses
#[derive(Clone, Default)]
pub struct ButtonScript {
    presses: Arc<Mutex<Vec<(Button, Window)>>>,
}

impl ButtonScript {
    /// Hold `button` down from `at` for `hold`
    pub fn press_at(&self, button: Button, at: Instant, hold: Duration) {
        lock(&self.presses).push((button, Window::new(at, hold)));
    }

    pub fn press_after(&self, button: Button, delay: Duration, hold: Duration) {
        self.press_at(button, Instant::now() + delay, hold);
    }

    pub fn press_now(&self, button: Button, hold: Duration) {
        self.press_at(button, Instant::now(), hold);
    }
}

pub struct SimulatedButtons {
    script: ButtonScript,
}

impl SimulatedButtons {
    pub fn new() -> (Self, ButtonScript) {
        let script = ButtonScript::default();
        (
            Self {
                script: script.clone(),
            },
            script,
        )
    }
}

impl Buttons for SimulatedButtons {
    fn is_pressed(&self, button: Button) -> bool {
        let now = Instant::now();
        let mut presses = lock(&self.script.presses);
        presses.retain(|(_, w)| w.until > now);
        presses
            .iter()
            .any(|(b, w)| *b == button && w.contains(now))
    }
}

// ---------------------------------------------------------------------------
// Keypad
// ---------------------------------------------------------------------------

/// Schedules raw keycodes
#[derive(Clone, Default)]
pub struct KeyScript {
    queue: Arc<Mutex<Vec<(Instant, u16)>>>,
}

impl KeyScript {
    pub fn key_at(&self, at: Instant, keycode: u16) {
        let mut queue = lock(&self.queue);
        let pos = queue.partition_point(|(t, _)| *t <= at);
        queue.insert(pos, (at, keycode));
    }

    pub fn key_now(&self, keycode: u16) {
        self.key_at(Instant::now(), keycode);
    }

    /// Type each digit `gap` apart starting at `start`; returns the time of the last key
    pub fn digits_at(&self, start: Instant, gap: Duration, digits: &str) -> Instant {
        let mut at = start;
        for (i, d) in digits.bytes().filter(u8::is_ascii_digit).enumerate() {
            at = start + gap * i as u32;
            self.key_at(at, votechain_core::Key::digit_keycode(d - b'0'));
        }
        at
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }
}

pub struct SimulatedKeypad {
    script: KeyScript,
}

impl SimulatedKeypad {
    pub fn new() -> (Self, KeyScript) {
        let script = KeyScript::default();
        (
            Self {
                script: script.clone(),
            },
            script,
        )
    }
}

impl Keypad for SimulatedKeypad {
    fn read_keycode(&mut self) -> Option<u16> {
        let mut queue = lock(&self.script.queue);
        match queue.first() {
            Some((at, _)) if *at <= Instant::now() => Some(queue.remove(0).1),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Fingerprint sensor
// ---------------------------------------------------------------------------

/// What rests on the simulated sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFinger {
    /// A finger with a stable print identity
    Print(u16),
    /// A finger the sensor cannot image
    Smudged,
}

#[derive(Debug)]
struct SensorState {
    touches: Vec<(SimFinger, Window)>,
    /// location -> print
    templates: BTreeMap<u16, u16>,
    image: Option<u16>,
    slots: [Option<u16>; 2],
    model: Option<u16>,
    responsive: bool,
    indicator: Option<(IndicatorColor, IndicatorMode)>,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            touches: Vec::new(),
            templates: BTreeMap::new(),
            image: None,
            slots: [None; 2],
            model: None,
            responsive: true,
            indicator: None,
        }
    }
}

/// Schedules touches and inspects the simulated template store
#[derive(Clone, Default)]
pub struct SensorScript {
    state: Arc<Mutex<SensorState>>,
}

impl SensorScript {
    pub fn touch_at(&self, finger: SimFinger, at: Instant, hold: Duration) {
        lock(&self.state)
            .touches
            .push((finger, Window::new(at, hold)));
    }

    pub fn touch_after(&self, finger: SimFinger, delay: Duration, hold: Duration) {
        self.touch_at(finger, Instant::now() + delay, hold);
    }

    pub fn touch_now(&self, finger: SimFinger, hold: Duration) {
        self.touch_at(finger, Instant::now(), hold);
    }

    /// Preload a template
    pub fn enroll(&self, location: u16, print: u16) {
        lock(&self.state).templates.insert(location, print);
    }

    pub fn template(&self, location: u16) -> Option<u16> {
        lock(&self.state).templates.get(&location).copied()
    }

    pub fn template_count(&self) -> usize {
        lock(&self.state).templates.len()
    }

    /// Simulate a disconnected sensor
    pub fn set_responsive(&self, responsive: bool) {
        lock(&self.state).responsive = responsive;
    }

    pub fn indicator(&self) -> Option<(IndicatorColor, IndicatorMode)> {
        lock(&self.state).indicator
    }
}

pub struct SimulatedSensor {
    script: SensorScript,
}

impl SimulatedSensor {
    pub fn new() -> (Self, SensorScript) {
        let script = SensorScript::default();
        (
            Self {
                script: script.clone(),
            },
            script,
        )
    }

    fn state(&self) -> SensorResult<MutexGuard<'_, SensorState>> {
        let state = lock(&self.script.state);
        if state.responsive {
            Ok(state)
        } else {
            Err(SensorError::NotResponding)
        }
    }
}

#[async_trait]
impl FingerprintSensor for SimulatedSensor {
    async fn verify(&mut self) -> SensorResult<()> {
        self.state().map(|_| ())
    }

    async fn get_image(&mut self) -> SensorResult<ImageStatus> {
        let now = Instant::now();
        let mut state = self.state()?;
        state.touches.retain(|(_, w)| w.until > now);
        let finger = state
            .touches
            .iter()
            .find(|(_, w)| w.contains(now))
            .map(|(f, _)| *f);
        Ok(match finger {
            Some(SimFinger::Print(print)) => {
                state.image = Some(print);
                ImageStatus::Captured
            }
            Some(SimFinger::Smudged) => {
                state.image = None;
                ImageStatus::ImageFail
            }
            None => {
                state.image = None;
                ImageStatus::NoFinger
            }
        })
    }

    async fn extract_template(&mut self, slot: u8) -> SensorResult<()> {
        let mut state = self.state()?;
        let print = state.image.ok_or(SensorError::Status(SENSOR_NO_IMAGE))?;
        let index = if slot == 2 { 1 } else { 0 };
        state.slots[index] = Some(print);
        Ok(())
    }

    async fn search(&mut self) -> SensorResult<Option<u16>> {
        let state = self.state()?;
        let print = state.slots[0].ok_or(SensorError::Status(SENSOR_NO_IMAGE))?;
        Ok(state
            .templates
            .iter()
            .find(|(_, p)| **p == print)
            .map(|(location, _)| *location))
    }

    async fn create_model(&mut self) -> SensorResult<()> {
        let mut state = self.state()?;
        match state.slots {
            [Some(a), Some(b)] if a == b => {
                state.model = Some(a);
                Ok(())
            }
            _ => Err(SensorError::Status(SENSOR_ENROLL_MISMATCH)),
        }
    }

    async fn store_model(&mut self, location: u16) -> SensorResult<()> {
        let mut state = self.state()?;
        if location == 0 || location > SIM_SENSOR_CAPACITY {
            return Err(SensorError::Status(SENSOR_BAD_LOCATION));
        }
        let print = state.model.ok_or(SensorError::Status(SENSOR_ENROLL_MISMATCH))?;
        state.templates.insert(location, print);
        Ok(())
    }

    async fn set_indicator(
        &mut self,
        color: IndicatorColor,
        mode: IndicatorMode,
    ) -> SensorResult<()> {
        self.state()?.indicator = Some((color, mode));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// One flushed display buffer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub lines: [String; 3],
    pub progress: Option<(f64, char)>,
}

impl Frame {
    pub fn line(&self, row: usize) -> &str {
        self.lines.get(row).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|l| l.contains(text))
    }
}

/// Read side of a [`RecordingDisplay`]
#[derive(Clone, Default)]
pub struct DisplayLog {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl DisplayLog {
    pub fn frames(&self) -> Vec<Frame> {
        lock(&self.frames).clone()
    }

    pub fn last(&self) -> Option<Frame> {
        lock(&self.frames).last().cloned()
    }

    /// Whether any flushed frame shows `text`
    pub fn shown(&self, text: &str) -> bool {
        lock(&self.frames).iter().any(|f| f.contains(text))
    }

    pub fn progress_frames(&self) -> usize {
        lock(&self.frames)
            .iter()
            .filter(|f| f.progress.is_some())
            .count()
    }
}

/// Display that records every flushed frame
pub struct RecordingDisplay {
    current: Frame,
    log: DisplayLog,
}

impl RecordingDisplay {
    pub fn new() -> (Self, DisplayLog) {
        let log = DisplayLog::default();
        (
            Self {
                current: Frame::default(),
                log: log.clone(),
            },
            log,
        )
    }
}

impl Display for RecordingDisplay {
    fn clear(&mut self) {
        self.current = Frame::default();
    }

    fn draw_text(&mut self, row: usize, text: &str) {
        if let Some(line) = self.current.lines.get_mut(row) {
            *line = text.to_string();
        }
    }

    fn draw_progress(&mut self, fraction: f64, spinner: char) {
        self.current.progress = Some((fraction, spinner));
    }

    fn flush(&mut self) -> crate::Result<()> {
        lock(&self.log.frames).push(self.current.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEvent {
    Leds(LedState),
    Beep(BeepPattern),
}

/// Read side of a [`RecordingFeedback`]
#[derive(Clone, Default)]
pub struct FeedbackLog {
    events: Arc<Mutex<Vec<FeedbackEvent>>>,
}

impl FeedbackLog {
    pub fn events(&self) -> Vec<FeedbackEvent> {
        lock(&self.events).clone()
    }

    pub fn beeps(&self) -> Vec<BeepPattern> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                FeedbackEvent::Beep(p) => Some(*p),
                FeedbackEvent::Leds(_) => None,
            })
            .collect()
    }

    /// Most recent LED state
    pub fn leds(&self) -> LedState {
        lock(&self.events)
            .iter()
            .rev()
            .find_map(|e| match e {
                FeedbackEvent::Leds(l) => Some(*l),
                FeedbackEvent::Beep(_) => None,
            })
            .unwrap_or_default()
    }
}

pub struct RecordingFeedback {
    log: FeedbackLog,
}

impl RecordingFeedback {
    pub fn new() -> (Self, FeedbackLog) {
        let log = FeedbackLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl Feedback for RecordingFeedback {
    fn set_leds(&mut self, leds: LedState) {
        lock(&self.log.events).push(FeedbackEvent::Leds(leds));
    }

    fn play(&mut self, pattern: BeepPattern) {
        lock(&self.log.events).push(FeedbackEvent::Beep(pattern));
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Script handles for a fully simulated front panel
#[derive(Clone)]
pub struct SimHandles {
    pub buttons: ButtonScript,
    pub keys: KeyScript,
    pub sensor: SensorScript,
    pub display: DisplayLog,
    pub feedback: FeedbackLog,
}

/// Build a fully simulated [`Devices`] bundle
pub fn simulated() -> (Devices, SimHandles) {
    let (buttons, button_script) = SimulatedButtons::new();
    let (keypad, key_script) = SimulatedKeypad::new();
    let (sensor, sensor_script) = SimulatedSensor::new();
    let (display, display_log) = RecordingDisplay::new();
    let (feedback, feedback_log) = RecordingFeedback::new();

    let devices = Devices {
        buttons: Box::new(buttons),
        keypad: Box::new(keypad),
        sensor: Box::new(sensor),
        display: Arc::new(Mutex::new(display)),
        feedback: Box::new(feedback),
    };
    let handles = SimHandles {
        buttons: button_script,
        keys: key_script,
        sensor: sensor_script,
        display: display_log,
        feedback: feedback_log,
    };
    (devices, handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_core::keycode::KEY_ENTER;

    const MS: Duration = Duration::from_millis(1);

    #[tokio::test(start_paused = true)]
    async fn test_button_window() {
        let (buttons, script) = SimulatedButtons::new();
        script.press_after(Button::CandidateA, 100 * MS, 200 * MS);

        assert!(!buttons.is_pressed(Button::CandidateA));
        tokio::time::sleep(150 * MS).await;
        assert!(buttons.is_pressed(Button::CandidateA));
        assert!(!buttons.is_pressed(Button::Start));
        tokio::time::sleep(200 * MS).await;
        assert!(!buttons.is_pressed(Button::CandidateA));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_release_in_time_order() {
        let (mut keypad, script) = SimulatedKeypad::new();
        let start = Instant::now();
        script.key_at(start + 300 * MS, KEY_ENTER);
        script.digits_at(start + 100 * MS, 50 * MS, "12");

        assert_eq!(keypad.read_keycode(), None);
        tokio::time::sleep(400 * MS).await;
        let codes: Vec<u16> = std::iter::from_fn(|| keypad.read_keycode()).collect();
        assert_eq!(
            codes,
            vec![
                votechain_core::Key::digit_keycode(1),
                votechain_core::Key::digit_keycode(2),
                KEY_ENTER
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_search_and_enroll() {
        let (mut sensor, script) = SimulatedSensor::new();
        script.enroll(7, 42);

        assert_eq!(sensor.get_image().await.unwrap(), ImageStatus::NoFinger);
        assert_eq!(
            sensor.extract_template(1).await,
            Err(SensorError::Status(SENSOR_NO_IMAGE))
        );

        script.touch_now(SimFinger::Print(42), Duration::from_secs(1));
        assert_eq!(sensor.get_image().await.unwrap(), ImageStatus::Captured);
        sensor.extract_template(1).await.unwrap();
        assert_eq!(sensor.search().await.unwrap(), Some(7));

        sensor.extract_template(2).await.unwrap();
        sensor.create_model().await.unwrap();
        sensor.store_model(9).await.unwrap();
        assert_eq!(script.template(9), Some(42));
        assert!(sensor.store_model(0).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_mismatched_scans() {
        let (mut sensor, script) = SimulatedSensor::new();
        script.touch_now(SimFinger::Print(1), 100 * MS);
        sensor.get_image().await.unwrap();
        sensor.extract_template(1).await.unwrap();

        tokio::time::sleep(200 * MS).await;
        script.touch_now(SimFinger::Print(2), 100 * MS);
        sensor.get_image().await.unwrap();
        sensor.extract_template(2).await.unwrap();

        assert_eq!(
            sensor.create_model().await,
            Err(SensorError::Status(SENSOR_ENROLL_MISMATCH))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_sensor() {
        let (mut sensor, script) = SimulatedSensor::new();
        script.set_responsive(false);
        assert_eq!(sensor.verify().await, Err(SensorError::NotResponding));
        assert_eq!(sensor.get_image().await, Err(SensorError::NotResponding));
    }

    #[test]
    fn test_recording_display() {
        let (mut display, log) = RecordingDisplay::new();
        display.clear();
        display.draw_text(0, "VOTE");
        display.draw_text(1, "CHAIN");
        display.draw_text(5, "ignored");
        display.flush().unwrap();

        let frame = log.last().unwrap();
        assert_eq!(frame.line(0), "VOTE");
        assert_eq!(frame.line(2), "");
        assert!(log.shown("CHAIN"));
        assert_eq!(log.progress_frames(), 0);
    }
}
