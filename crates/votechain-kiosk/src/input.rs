//! Input abstraction over buttons, keypad and fingerprint sensor
//!
//! All waits sample the devices on a fixed [`Ticker`]. Button presses are
//! accepted on a debounced released-to-pressed edge: the button must read
//! asserted on `debounce_samples` consecutive samples, and it must be released
//! before it can fire again. After an accepted press the caller is held for
//! the settle delay so contact bounce cannot produce a second press.
//!
//! The START button doubles as reset. Every wait that is not itself waiting for
//! START returns [`Outcome::ResetRequested`] as soon as a START press is
//! accepted, whatever its own deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time;
use tracing::{debug, info, warn};

use votechain_core::{DigitBuffer, EntryEvent, Fault, FingerprintMatchResult, Key, Outcome};

use crate::config::InputSettings;
use crate::devices::{
    Button, Buttons, FingerprintSensor, ImageStatus, IndicatorColor, IndicatorMode, Keypad,
};
use crate::policy::{Deadline, Ticker};

/// Sampling parameters
#[derive(Debug, Clone)]
pub struct InputTiming {
    pub poll_interval: Duration,
    pub debounce_samples: u8,
    pub settle: Duration,
    pub finger_hold: Duration,
}

impl Default for InputTiming {
    fn default() -> Self {
        Self::from(&InputSettings::default())
    }
}

impl From<&InputSettings> for InputTiming {
    fn from(settings: &InputSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval,
            debounce_samples: settings.debounce_samples.max(1),
            settle: settings.settle,
            finger_hold: settings.finger_hold,
        }
    }
}

/// Buttons whose press was accepted on one sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pressed([bool; 3]);

impl Pressed {
    pub fn contains(&self, button: Button) -> bool {
        self.0[button.index()]
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|p| *p)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Debounce {
    streak: u8,
    fired: bool,
}

/// Edge detector for the three buttons
#[derive(Debug)]
struct ButtonTracker {
    states: [Debounce; 3],
    required: u8,
}

impl ButtonTracker {
    fn new(required: u8) -> Self {
        Self {
            states: [Debounce::default(); 3],
            required: required.max(1),
        }
    }

    /// Whether the current hold of `button` has already produced its press
    fn accepted(&self, button: Button) -> bool {
        self.states[button.index()].fired
    }

    fn sample(&mut self, buttons: &dyn Buttons) -> Pressed {
        let mut pressed = Pressed::default();
        for button in Button::ALL {
            let state = &mut self.states[button.index()];
            if buttons.is_pressed(button) {
                state.streak = state.streak.saturating_add(1);
                if !state.fired && state.streak >= self.required {
                    state.fired = true;
                    pressed.0[button.index()] = true;
                }
            } else {
                *state = Debounce::default();
            }
        }
        pressed
    }
}

/// Owner of the input devices
pub struct Input {
    buttons: Box<dyn Buttons>,
    keypad: Box<dyn Keypad>,
    sensor: Box<dyn FingerprintSensor>,
    tracker: ButtonTracker,
    timing: InputTiming,
}

impl Input {
    pub fn new(
        buttons: Box<dyn Buttons>,
        keypad: Box<dyn Keypad>,
        sensor: Box<dyn FingerprintSensor>,
        timing: InputTiming,
    ) -> Self {
        Self {
            buttons,
            keypad,
            sensor,
            tracker: ButtonTracker::new(timing.debounce_samples),
            timing,
        }
    }

    /// Direct sensor access for enrollment and the self-test
    pub fn sensor(&mut self) -> &mut dyn FingerprintSensor {
        self.sensor.as_mut()
    }

    /// Raw, undebounced level of a button
    pub fn is_asserted(&self, button: Button) -> bool {
        self.buttons.is_pressed(button)
    }

    fn ticker(&self) -> Ticker {
        Ticker::new(self.timing.poll_interval)
    }

    fn sample(&mut self) -> Pressed {
        self.tracker.sample(self.buttons.as_ref())
    }

    /// Whether START is being pressed right before a network call
    ///
    /// A press still inside its debounce window is sampled until it is
    /// accepted or released, so a press made during the settle delay counts.
    pub async fn reset_pending(&mut self) -> bool {
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            if self.sample().contains(Button::Start) {
                return true;
            }
            if !self.is_asserted(Button::Start) || self.tracker.accepted(Button::Start) {
                return false;
            }
        }
    }

    /// Hold off after an accepted press
    pub async fn settle(&self) {
        time::sleep(self.timing.settle).await;
    }

    /// Sleep for `duration`, ending early on reset
    pub async fn pause(&mut self, duration: Duration) -> Outcome<()> {
        let deadline = Deadline::after(duration);
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            if self.sample().contains(Button::Start) {
                return Outcome::ResetRequested;
            }
            if deadline.expired() {
                return Outcome::Ok(());
            }
        }
    }

    /// Wait for one decodable key
    pub async fn await_key(&mut self, deadline: Deadline) -> Outcome<Key> {
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            if self.sample().contains(Button::Start) {
                return Outcome::ResetRequested;
            }
            while let Some(code) = self.keypad.read_keycode() {
                match Key::from_keycode(code) {
                    Some(key) => return Outcome::Ok(key),
                    None => debug!("Ignoring keycode {}", code),
                }
            }
            if deadline.expired() {
                return Outcome::TimedOut;
            }
        }
    }

    /// Collect up to `max_len` digits
    ///
    /// `echo` is called with the buffer after every accepted keystroke.
    pub async fn collect_digits<F>(
        &mut self,
        max_len: usize,
        deadline: Deadline,
        mut echo: F,
    ) -> Outcome<String>
    where
        F: FnMut(&DigitBuffer),
    {
        let mut buffer = DigitBuffer::new(max_len);
        loop {
            let key = match self.await_key(deadline).await {
                Outcome::Ok(key) => key,
                Outcome::TimedOut => return Outcome::TimedOut,
                Outcome::ResetRequested => return Outcome::ResetRequested,
                Outcome::Failed(fault) => return Outcome::Failed(fault),
            };
            let event = buffer.push(key);
            echo(&buffer);
            match event {
                EntryEvent::Submitted(digits) => return Outcome::Ok(digits),
                EntryEvent::Cancelled => return Outcome::Failed(Fault::InputCancelled),
                EntryEvent::Edited | EntryEvent::Unchanged => {}
            }
        }
    }

    /// Wait until one of `wanted` is pressed
    ///
    /// With no deadline the wait only ends on a press (or on reset when START
    /// is not among `wanted`).
    pub async fn await_button_press(
        &mut self,
        wanted: &[Button],
        deadline: Option<Deadline>,
    ) -> Outcome<Button> {
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            let pressed = self.sample();
            if pressed.contains(Button::Start) && !wanted.contains(&Button::Start) {
                return Outcome::ResetRequested;
            }
            if let Some(button) = wanted.iter().copied().find(|b| pressed.contains(*b)) {
                self.settle().await;
                return Outcome::Ok(button);
            }
            if deadline.is_some_and(|d| d.expired()) {
                return Outcome::TimedOut;
            }
        }
    }

    /// Wait for a finger, then let it rest for the hold time
    pub async fn await_finger(&mut self, deadline: Deadline) -> Outcome<()> {
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            if self.sample().contains(Button::Start) {
                return Outcome::ResetRequested;
            }
            if deadline.expired() {
                return Outcome::TimedOut;
            }
            match time::timeout_at(deadline.instant(), self.sensor.get_image()).await {
                Err(_) => return Outcome::TimedOut,
                Ok(Err(e)) => {
                    warn!("Sensor read failed: {}", e);
                    return Outcome::Failed(Fault::SensorFailure);
                }
                Ok(Ok(ImageStatus::NoFinger)) => continue,
                Ok(Ok(ImageStatus::ImageFail)) => {
                    debug!("Unusable fingerprint image");
                    return Outcome::Failed(Fault::SensorFailure);
                }
                Ok(Ok(ImageStatus::Captured)) => break,
            }
        }

        debug!("Finger detected, holding for {:?}", self.timing.finger_hold);
        if self.pause(self.timing.finger_hold).await.is_reset() {
            return Outcome::ResetRequested;
        }
        match self.sensor.get_image().await {
            Ok(status) => {
                if status != ImageStatus::Captured {
                    debug!("Finger moved during hold: {:?}", status);
                }
                Outcome::Ok(())
            }
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                Outcome::Failed(Fault::SensorFailure)
            }
        }
    }

    /// Capture a finger into character slot `slot`
    pub async fn capture_template(&mut self, slot: u8, deadline: Deadline) -> Outcome<()> {
        match self.await_finger(deadline).await {
            Outcome::Ok(()) => {}
            other => return other,
        }
        match self.sensor.extract_template(slot).await {
            Ok(()) => Outcome::Ok(()),
            Err(e) => {
                warn!("Template extraction failed: {}", e);
                Outcome::Failed(Fault::SensorFailure)
            }
        }
    }

    /// One fingerprint verification attempt
    pub async fn scan_fingerprint(&mut self, deadline: Deadline) -> FingerprintMatchResult {
        self.indicate(IndicatorColor::Red, IndicatorMode::Breathing)
            .await;

        let result = match self.capture_template(1, deadline).await {
            Outcome::Ok(()) => match self.sensor.search().await {
                Ok(Some(id)) => FingerprintMatchResult::Matched(id),
                Ok(None) => FingerprintMatchResult::NoMatch,
                Err(e) => {
                    warn!("Fingerprint search failed: {}", e);
                    FingerprintMatchResult::SensorFailure
                }
            },
            Outcome::ResetRequested => FingerprintMatchResult::ResetRequested,
            Outcome::TimedOut | Outcome::Failed(_) => FingerprintMatchResult::SensorFailure,
        };

        let (color, mode) = match result {
            FingerprintMatchResult::Matched(_) => (IndicatorColor::Blue, IndicatorMode::On),
            FingerprintMatchResult::ResetRequested => (IndicatorColor::Purple, IndicatorMode::Off),
            _ => (IndicatorColor::Red, IndicatorMode::On),
        };
        self.indicate(color, mode).await;
        result
    }

    /// Wait until the sensor reports no finger
    pub async fn await_finger_removed(&mut self, deadline: Deadline) -> Outcome<()> {
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            if self.sample().contains(Button::Start) {
                return Outcome::ResetRequested;
            }
            if deadline.expired() {
                return Outcome::TimedOut;
            }
            match self.sensor.get_image().await {
                Ok(ImageStatus::NoFinger) => return Outcome::Ok(()),
                Ok(_) => {}
                Err(e) => {
                    warn!("Sensor read failed: {}", e);
                    return Outcome::Failed(Fault::SensorFailure);
                }
            }
        }
    }

    /// Drive `call` to completion while watching the reset button
    ///
    /// The call is never interrupted. Returns its output and whether a reset
    /// press was accepted while it ran.
    pub async fn guard_reset<F: Future>(&mut self, call: F) -> (F::Output, bool) {
        tokio::pin!(call);
        let mut latched = false;
        let mut ticker = self.ticker();
        loop {
            tokio::select! {
                biased;
                output = &mut call => return (output, latched),
                _ = ticker.tick() => {
                    if !latched && self.sample().contains(Button::Start) {
                        info!("Reset pressed during network call; honouring after it returns");
                        latched = true;
                    }
                }
            }
        }
    }

    pub async fn indicate(&mut self, color: IndicatorColor, mode: IndicatorMode) {
        if let Err(e) = self.sensor.set_indicator(color, mode).await {
            debug!("Sensor indicator failed: {}", e);
        }
    }
}
