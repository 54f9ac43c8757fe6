//! Voter, vote, and command types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::rejection::Rejection;
use crate::{NATIONAL_ID_MAX_LEN, PLACEHOLDER_RECEIPT};

/// National ID as typed on the keypad (digits only, 1 to 12 characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
    pub fn new(digits: impl Into<String>) -> Result<Self> {
        let digits = digits.into();
        if digits.is_empty() || digits.len() > NATIONAL_ID_MAX_LEN {
            return Err(Error::InvalidNationalId(format!(
                "expected 1-{} digits, got {}",
                NATIONAL_ID_MAX_LEN,
                digits.len()
            )));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidNationalId("non-digit character".to_string()));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form for logs: only the last four digits are kept
    pub fn masked(&self) -> String {
        let keep = self.0.len().min(4);
        let hidden = self.0.len() - keep;
        format!("{}{}", "*".repeat(hidden), &self.0[hidden..])
    }
}

impl TryFrom<String> for NationalId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NationalId> for String {
    fn from(id: NationalId) -> Self {
        id.0
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Candidate selectable with the two ballot buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Candidate {
    A,
    B,
}

impl Candidate {
    pub const ALL: [Candidate; 2] = [Candidate::A, Candidate::B];

    /// Backend candidate id
    pub fn id(self) -> u8 {
        match self {
            Candidate::A => 1,
            Candidate::B => 2,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Candidate::A),
            2 => Ok(Candidate::B),
            other => Err(Error::UnknownCandidate(other)),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Candidate::A => "CANDIDATE A",
            Candidate::B => "CANDIDATE B",
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Read-only snapshot of a registered voter, as returned by check-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterRecord {
    /// Voter display name
    pub name: String,
    /// Template slot on the fingerprint sensor that must match
    pub expected_fingerprint_id: u16,
    /// Server-side voted flag (never trusted locally beyond this snapshot)
    pub has_voted: bool,
}

/// Command fetched from the admin channel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AdminCommand {
    #[default]
    None,
    Enroll {
        target_fingerprint_id: u16,
        voter_name: String,
    },
}

/// Outcome of one fingerprint scan attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintMatchResult {
    /// The sensor found a stored template
    Matched(u16),
    /// A finger was read but no template matched
    NoMatch,
    /// No usable image within the deadline, or the sensor reported an error
    SensorFailure,
    /// The reset button was pressed during the scan
    ResetRequested,
}

/// Outcome of a check-in lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInResult {
    Eligible(VoterRecord),
    NotFound,
    AlreadyVoted,
    Rejected(Rejection),
}

/// Ledger transaction hash returned for a recorded vote
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters followed by an ellipsis
    pub fn short(&self) -> String {
        let head: String = self.0.chars().take(12).collect();
        format!("{}...", head)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a vote submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteSubmissionResult {
    Confirmed {
        tx_hash: TxHash,
        receipt_code: Option<String>,
    },
    Rejected {
        reason: Rejection,
    },
    NetworkFailure,
}

/// Outcome of a receipt lookup by transaction hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptLookup {
    Found(String),
    Pending,
}

/// Voter-facing confirmation of a recorded vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub code: String,
    pub tx_hash: TxHash,
    pub candidate: Candidate,
    /// True when the backend never produced a code within the polling window
    pub placeholder: bool,
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    pub fn with_code(code: impl Into<String>, tx_hash: TxHash, candidate: Candidate) -> Self {
        Self {
            code: code.into(),
            tx_hash,
            candidate,
            placeholder: false,
            issued_at: Utc::now(),
        }
    }

    /// Receipt for a vote whose code must be verified manually by tx hash
    pub fn placeholder(tx_hash: TxHash, candidate: Candidate) -> Self {
        Self {
            code: PLACEHOLDER_RECEIPT.to_string(),
            tx_hash,
            candidate,
            placeholder: true,
            issued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_id_validation() {
        assert!(NationalId::new("123456789012").is_ok());
        assert!(NationalId::new("42").is_ok());
        assert!(NationalId::new("").is_err());
        assert!(NationalId::new("1234567890123").is_err());
        assert!(NationalId::new("12ab").is_err());
    }

    #[test]
    fn test_national_id_masked() {
        let id = NationalId::new("123456789012").unwrap();
        assert_eq!(id.masked(), "********9012");
        let short = NationalId::new("12").unwrap();
        assert_eq!(short.masked(), "12");
    }

    #[test]
    fn test_candidate_ids() {
        for candidate in Candidate::ALL {
            assert_eq!(Candidate::from_id(candidate.id()).unwrap(), candidate);
        }
        assert_eq!(Candidate::from_id(3), Err(Error::UnknownCandidate(3)));
        assert_eq!(Candidate::A.display_name(), "CANDIDATE A");
    }

    #[test]
    fn test_tx_hash_short() {
        let hash = TxHash::new("0x1234567890abcdef");
        assert_eq!(hash.short(), "0x1234567890...");
        assert_eq!(TxHash::new("0xabc").short(), "0xabc...");
    }

    #[test]
    fn test_placeholder_receipt() {
        let receipt = Receipt::placeholder(TxHash::new("0xabc"), Candidate::B);
        assert!(receipt.placeholder);
        assert_eq!(receipt.code, PLACEHOLDER_RECEIPT);
    }
}
