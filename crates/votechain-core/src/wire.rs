//! JSON payloads exchanged with the VoteChain backend
//!
//! Field names follow the deployed backend. Responses that carry data use a
//! `{status, message, data}` envelope; the receipt lookup and command poll
//! endpoints answer with flat objects.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rejection::Rejection;
use crate::types::{AdminCommand, TxHash, VoterRecord};

/// Admin command name for remote enrollment
pub const COMMAND_ENROLL: &str = "ENROLL";

/// Standard response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Structured error code, when the backend provides one
    #[serde(default)]
    pub code: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Rejection described by an error envelope
    pub fn rejection(&self) -> Rejection {
        Rejection {
            message: self.message.clone().unwrap_or_default(),
            code: self.code.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub aadhaar_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInData {
    pub name: String,
    pub fingerprint_id: u16,
    #[serde(default)]
    pub has_voted: bool,
}

impl From<CheckInData> for VoterRecord {
    fn from(data: CheckInData) -> Self {
        VoterRecord {
            name: data.name,
            expected_fingerprint_id: data.fingerprint_id,
            has_voted: data.has_voted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub aadhaar_id: String,
    pub candidate_id: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteData {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub receipt_code: Option<String>,
    /// Older backends name the receipt code `short_code`
    #[serde(default)]
    pub short_code: Option<String>,
}

impl VoteData {
    /// Receipt code under either name, ignoring empty strings
    pub fn code(&self) -> Option<String> {
        self.receipt_code
            .iter()
            .chain(self.short_code.iter())
            .find(|c| !c.is_empty())
            .cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupReceiptRequest {
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupReceiptResponse {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollCommandResponse {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub target_finger_id: Option<u16>,
    #[serde(default)]
    pub name: Option<String>,
}

impl PollCommandResponse {
    /// Interpret the poll; anything incomplete or unknown is no command
    pub fn into_command(self) -> AdminCommand {
        match (self.command.as_deref(), self.target_finger_id) {
            (Some(COMMAND_ENROLL), Some(target_fingerprint_id)) => AdminCommand::Enroll {
                target_fingerprint_id,
                voter_name: self.name.unwrap_or_default(),
            },
            _ => AdminCommand::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentReport {
    pub success: bool,
    pub fingerprint_id: u16,
}

/// Decode a command-poll body
pub fn decode_poll(body: &[u8]) -> Result<AdminCommand> {
    let response: PollCommandResponse = serde_json::from_slice(body)?;
    Ok(response.into_command())
}

/// Decode a receipt-lookup body into its code, if one is present
pub fn decode_lookup(body: &[u8]) -> Result<Option<String>> {
    let response: LookupReceiptResponse = serde_json::from_slice(body)?;
    Ok(response.code.filter(|c| !c.is_empty()))
}
