//! Classification of backend rejections into operator messages
//!
//! A structured `code` from the backend is preferred. Older backends only send
//! a free-text message, in which case the message is matched by substring;
//! that fallback is a known limitation and only covers the cases below.

use serde::{Deserialize, Serialize};

pub const CODE_ELECTION_INACTIVE: &str = "ELECTION_INACTIVE";
pub const CODE_TIMEOUT: &str = "TIMEOUT";
pub const CODE_DOUBLE_VOTE: &str = "DOUBLE_VOTE";

/// A rejection as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rejection {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Operator-facing category of a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    ElectionInactive,
    Timeout,
    DoubleVote,
    Other,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn kind(&self) -> RejectionKind {
        if let Some(code) = self.code.as_deref() {
            match code {
                CODE_ELECTION_INACTIVE => return RejectionKind::ElectionInactive,
                CODE_TIMEOUT => return RejectionKind::Timeout,
                CODE_DOUBLE_VOTE => return RejectionKind::DoubleVote,
                _ => {}
            }
        }

        let message = self.message.to_lowercase();
        if message.contains("not active")
            || message.contains("inactive")
            || message.contains("election")
        {
            RejectionKind::ElectionInactive
        } else if message.contains("timeout") {
            RejectionKind::Timeout
        } else {
            RejectionKind::Other
        }
    }

    /// Three display lines for the rejection screen
    pub fn display_lines(&self) -> [String; 3] {
        match self.kind() {
            RejectionKind::ElectionInactive => [
                "Vote Rejected".to_string(),
                "Election Not Active".to_string(),
                "Start election in admin".to_string(),
            ],
            RejectionKind::Timeout => [
                "Network Timeout".to_string(),
                "Retry".to_string(),
                "Blockchain slow".to_string(),
            ],
            RejectionKind::DoubleVote => [
                "Vote Rejected".to_string(),
                "Already Voted".to_string(),
                String::new(),
            ],
            RejectionKind::Other => {
                let reason = if self.message.is_empty() {
                    "Error".to_string()
                } else {
                    self.message.clone()
                };
                ["Vote Rejected".to_string(), reason, String::new()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Election contract not available yet.", RejectionKind::ElectionInactive)]
    #[case("Election is inactive", RejectionKind::ElectionInactive)]
    #[case("Voting is not active", RejectionKind::ElectionInactive)]
    #[case("RPC timeout waiting for receipt", RejectionKind::Timeout)]
    #[case("Double voting detected!", RejectionKind::Other)]
    #[case("", RejectionKind::Other)]
    fn test_message_sniffing(#[case] message: &str, #[case] expected: RejectionKind) {
        assert_eq!(Rejection::new(message).kind(), expected);
    }

    #[test]
    fn test_code_wins_over_message() {
        let rejection = Rejection::with_code("election closed", CODE_DOUBLE_VOTE);
        assert_eq!(rejection.kind(), RejectionKind::DoubleVote);

        let unknown = Rejection::with_code("timeout", "SOMETHING_ELSE");
        assert_eq!(unknown.kind(), RejectionKind::Timeout);
    }

    #[test]
    fn test_display_fallback() {
        let lines = Rejection::new("").display_lines();
        assert_eq!(lines[1], "Error");
        let lines = Rejection::new("Invalid candidate ID.").display_lines();
        assert_eq!(lines[1], "Invalid candidate ID.");
    }
}
