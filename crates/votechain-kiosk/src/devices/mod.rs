//! Device capability traits for the kiosk front panel
//!
//! The session machine never touches hardware directly. It is handed a
//! [`Devices`] bundle of trait objects:
//! - three digital buttons (START/reset and the two candidate buttons)
//! - a keypad delivering raw input-event keycodes
//! - a fingerprint sensor with its own template store
//! - a three-line display
//! - LED and buzzer feedback driven by named patterns
//!
//! `sim` provides in-memory implementations used by tests and by the console
//! front panel in `console`.

pub mod console;
pub mod sim;

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

use votechain_core::Candidate;

/// Sensor confirmation code for "no finger image in the buffer"
pub const SENSOR_NO_IMAGE: u8 = 0x15;
/// Sensor confirmation code for "the two scans did not combine"
pub const SENSOR_ENROLL_MISMATCH: u8 = 0x0A;
/// Sensor confirmation code for "storage location out of range"
pub const SENSOR_BAD_LOCATION: u8 = 0x0B;

/// Physical push buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// START / reset
    Start,
    CandidateA,
    CandidateB,
}

impl Button {
    pub const ALL: [Button; 3] = [Button::Start, Button::CandidateA, Button::CandidateB];

    pub(crate) fn index(self) -> usize {
        match self {
            Button::Start => 0,
            Button::CandidateA => 1,
            Button::CandidateB => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Start => "START",
            Button::CandidateA => "A",
            Button::CandidateB => "B",
        }
    }

    /// Candidate bound to this button
    pub fn candidate(self) -> Option<Candidate> {
        match self {
            Button::Start => None,
            Button::CandidateA => Some(Candidate::A),
            Button::CandidateB => Some(Candidate::B),
        }
    }

    pub fn for_candidate(candidate: Candidate) -> Self {
        match candidate {
            Candidate::A => Button::CandidateA,
            Candidate::B => Button::CandidateB,
        }
    }
}

/// Level-triggered button reads
pub trait Buttons: Send {
    /// Whether the button is asserted right now
    fn is_pressed(&self, button: Button) -> bool;
}

/// Non-blocking keypad reads
pub trait Keypad: Send {
    /// Next queued keycode, if any
    fn read_keycode(&mut self) -> Option<u16>;
}

/// Result of one image capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Captured,
    NoFinger,
    /// A finger is present but the image is unusable
    ImageFail,
}

/// Sensor ring light color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Red,
    Blue,
    Purple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMode {
    Breathing,
    Flashing,
    On,
    Off,
}

/// Errors reported by a fingerprint sensor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("Sensor not responding")]
    NotResponding,

    #[error("Sensor returned code {0:#04x}")]
    Status(u8),
}

pub type SensorResult<T> = std::result::Result<T, SensorError>;

/// Fingerprint sensor with an on-chip template store
///
/// Operations mirror the sensor's command set: images are captured into an
/// image buffer, converted into one of two character slots, and either
/// searched against the store or combined into a model and stored.
#[async_trait]
pub trait FingerprintSensor: Send {
    /// Handshake; fails if the sensor is absent or the password is wrong
    async fn verify(&mut self) -> SensorResult<()>;

    /// Capture one image
    async fn get_image(&mut self) -> SensorResult<ImageStatus>;

    /// Convert the image buffer into character slot 1 or 2
    async fn extract_template(&mut self, slot: u8) -> SensorResult<()>;

    /// Search the store with slot 1; `None` means no template matched
    async fn search(&mut self) -> SensorResult<Option<u16>>;

    /// Combine slots 1 and 2 into a model
    async fn create_model(&mut self) -> SensorResult<()>;

    /// Store the model at `location`
    async fn store_model(&mut self, location: u16) -> SensorResult<()>;

    async fn set_indicator(&mut self, color: IndicatorColor, mode: IndicatorMode)
        -> SensorResult<()>;
}

/// Three-line display
pub trait Display: Send {
    fn clear(&mut self);

    /// Draw `text` on line `row` (0-based)
    fn draw_text(&mut self, row: usize, text: &str);

    /// Draw the submission progress bar
    fn draw_progress(&mut self, fraction: f64, spinner: char);

    /// Push the buffer to the panel
    fn flush(&mut self) -> crate::Result<()>;
}

/// Display shared between the session machine and the progress reporter
pub type SharedDisplay = Arc<Mutex<dyn Display>>;

/// Lock a shared display, recovering from a poisoned lock
pub fn lock_display(display: &SharedDisplay) -> MutexGuard<'_, dyn Display + 'static> {
    display.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Front-panel LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedState {
    pub green: bool,
    pub red: bool,
}

impl LedState {
    pub const OFF: LedState = LedState {
        green: false,
        red: false,
    };
    pub const GREEN: LedState = LedState {
        green: true,
        red: false,
    };
    pub const RED: LedState = LedState {
        green: false,
        red: true,
    };
    pub const BOTH: LedState = LedState {
        green: true,
        red: true,
    };
}

/// Named buzzer patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepPattern {
    Prompt,
    Success,
    Error,
    Denied,
    /// Admin command received
    Attention,
    Enrolled,
    EnrollFailed,
}

/// `(on, off)` beep durations
pub type Pulses = &'static [(Duration, Duration)];

const fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

const PROMPT: Pulses = &[(ms(50), ms(0))];
const SUCCESS: Pulses = &[(ms(80), ms(50)), (ms(80), ms(0))];
const ERROR: Pulses = &[(ms(500), ms(100)), (ms(200), ms(0))];
const DENIED: Pulses = &[(ms(200), ms(100)), (ms(200), ms(100)), (ms(200), ms(0))];
const ATTENTION: Pulses = &[(ms(100), ms(50)), (ms(100), ms(50)), (ms(100), ms(0))];
const ENROLLED: Pulses = &[(ms(100), ms(100)), (ms(100), ms(0))];
const ENROLL_FAILED: Pulses = &[(ms(500), ms(100)), (ms(500), ms(100)), (ms(500), ms(0))];

impl BeepPattern {
    /// `(on, off)` durations of each beep
    pub fn pulses(self) -> Pulses {
        match self {
            BeepPattern::Prompt => PROMPT,
            BeepPattern::Success => SUCCESS,
            BeepPattern::Error => ERROR,
            BeepPattern::Denied => DENIED,
            BeepPattern::Attention => ATTENTION,
            BeepPattern::Enrolled => ENROLLED,
            BeepPattern::EnrollFailed => ENROLL_FAILED,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BeepPattern::Prompt => "prompt",
            BeepPattern::Success => "success",
            BeepPattern::Error => "error",
            BeepPattern::Denied => "denied",
            BeepPattern::Attention => "attention",
            BeepPattern::Enrolled => "enrolled",
            BeepPattern::EnrollFailed => "enroll_failed",
        }
    }
}

/// LED and buzzer outputs
pub trait Feedback: Send {
    fn set_leds(&mut self, leds: LedState);

    /// Start a buzzer pattern; implementations must not block the caller
    fn play(&mut self, pattern: BeepPattern);
}

/// All devices the kiosk drives
pub struct Devices {
    pub buttons: Box<dyn Buttons>,
    pub keypad: Box<dyn Keypad>,
    pub sensor: Box<dyn FingerprintSensor>,
    pub display: SharedDisplay,
    pub feedback: Box<dyn Feedback>,
}
