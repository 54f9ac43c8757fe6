//! VoteChain Kiosk - Biometric voting kiosk runtime
//!
//! This crate provides:
//! - A session state machine driving one voter from ID entry to receipt
//! - Debounced, reset-aware input over buttons, keypad and fingerprint sensor
//! - A bounded HTTP client for the VoteChain backend
//! - A cancellable progress reporter for long vote submissions
//! - Remote fingerprint enrollment on admin command
//! - A console front panel that simulates the kiosk hardware

pub mod admin;
pub mod backend;
pub mod config;
pub mod devices;
pub mod error;
pub mod health;
pub mod input;
pub mod kiosk;
pub mod policy;
pub mod progress;
pub mod screen;
pub mod session;

pub use backend::{Backend, BackendError, HttpBackend};
pub use config::KioskConfig;
pub use error::{KioskError, Result};
pub use kiosk::{Cycle, Kiosk};
pub use session::{SessionEnd, SessionMachine, SessionReport, SessionState};
