//! VoteChain Core - Shared types, wire payloads, and input rules
//!
//! This crate provides the runtime-free building blocks of the VoteChain
//! biometric voting kiosk: the voter/session data model, the error taxonomy
//! every wait primitive reports through, keycode decoding, and the pure
//! decision rules (digit entry, double-press confirmation, attempt budget)
//! that the kiosk's session state machine is built on.

pub mod attempts;
pub mod entry;
pub mod error;
pub mod keycode;
pub mod outcome;
pub mod rejection;
pub mod selection;
pub mod types;
pub mod wire;

pub use attempts::{AttemptBudget, AttemptVerdict};
pub use entry::{DigitBuffer, EntryEvent};
pub use error::{Error, Fault, Result};
pub use keycode::Key;
pub use outcome::Outcome;
pub use rejection::{Rejection, RejectionKind};
pub use selection::{CandidateSelection, SelectionEvent};
pub use types::{
    AdminCommand, Candidate, CheckInResult, FingerprintMatchResult, NationalId, Receipt,
    ReceiptLookup, TxHash, VoteSubmissionResult, VoterRecord,
};

/// Fingerprint attempts allowed per session
pub const MAX_FINGER_ATTEMPTS: u32 = 2;

/// Maximum digits in a national ID
pub const NATIONAL_ID_MAX_LEN: usize = 12;

/// Receipt code shown when the backend never attached one
pub const PLACEHOLDER_RECEIPT: &str = "------";
