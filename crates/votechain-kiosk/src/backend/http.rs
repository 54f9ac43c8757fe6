//! reqwest implementation of [`Backend`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use votechain_core::rejection::CODE_DOUBLE_VOTE;
use votechain_core::wire::{
    decode_lookup, decode_poll, CheckInData, CheckInRequest, EnrollmentReport, Envelope,
    LookupReceiptRequest, VoteData, VoteRequest,
};
use votechain_core::{
    AdminCommand, Candidate, CheckInResult, NationalId, ReceiptLookup, Rejection, TxHash,
    VoteSubmissionResult, VoterRecord,
};

use super::{Backend, BackendError};
use crate::config::{KioskConfig, Timeouts};

pub const CHECK_IN_PATH: &str = "/api/voter/check-in";
pub const VOTE_PATH: &str = "/api/vote";
pub const LOOKUP_RECEIPT_PATH: &str = "/api/lookup-receipt";
pub const POLL_COMMANDS_PATH: &str = "/api/kiosk/poll-commands";
pub const ENROLLMENT_COMPLETE_PATH: &str = "/api/kiosk/enrollment-complete";
pub const HEALTH_PATH: &str = "/api/health";

/// Per-operation request timeouts
#[derive(Debug, Clone)]
pub struct BackendTimeouts {
    pub check_in: Duration,
    pub vote: Duration,
    pub receipt_lookup: Duration,
    pub admin_poll: Duration,
    pub enrollment_report: Duration,
    pub health: Duration,
}

impl From<&Timeouts> for BackendTimeouts {
    fn from(t: &Timeouts) -> Self {
        Self {
            check_in: t.check_in,
            vote: t.vote,
            receipt_lookup: t.receipt_lookup,
            admin_poll: t.admin_poll,
            enrollment_report: t.enrollment_report,
            health: t.check_in,
        }
    }
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self::from(&Timeouts::default())
    }
}

/// HTTP client for the VoteChain backend
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeouts: BackendTimeouts,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeouts: BackendTimeouts) -> crate::Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.check_in)
            .user_agent(concat!("votechain-kiosk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            timeouts,
        })
    }

    pub fn from_config(config: &KioskConfig) -> crate::Result<Self> {
        Self::new(config.backend_base(), BackendTimeouts::from(&config.timeouts))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn classify(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::Connect(e.to_string())
    } else {
        BackendError::Protocol {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            detail: e.to_string(),
        }
    }
}

async fn read(response: reqwest::Response) -> Result<(StatusCode, Vec<u8>), BackendError> {
    let status = response.status();
    let body = response.bytes().await.map_err(classify)?;
    Ok((status, body.to_vec()))
}

fn parse<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, BackendError> {
    serde_json::from_slice(body).map_err(|e| BackendError::Protocol {
        status: status.as_u16(),
        detail: e.to_string(),
    })
}

/// Rejection carried by an error response, falling back to the status text
fn rejection_from(status: StatusCode, body: &[u8]) -> Rejection {
    match serde_json::from_slice::<Envelope<serde_json::Value>>(body) {
        Ok(envelope) if envelope.message.is_some() || envelope.code.is_some() => {
            envelope.rejection()
        }
        _ => Rejection::new(status.canonical_reason().unwrap_or("Error")),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn check_in(&self, national_id: &NationalId) -> Result<CheckInResult, BackendError> {
        let request = CheckInRequest {
            aadhaar_id: national_id.as_str().to_string(),
        };
        let response = self
            .client
            .post(self.url(CHECK_IN_PATH))
            .timeout(self.timeouts.check_in)
            .json(&request)
            .send()
            .await
            .map_err(classify)?;
        let (status, body) = read(response).await?;

        match status {
            StatusCode::NOT_FOUND => Ok(CheckInResult::NotFound),
            StatusCode::FORBIDDEN => Ok(CheckInResult::AlreadyVoted),
            s if s.is_success() => {
                let envelope: Envelope<CheckInData> = parse(status, &body)?;
                let data = envelope.data.ok_or_else(|| BackendError::Protocol {
                    status: status.as_u16(),
                    detail: "check-in response has no data".to_string(),
                })?;
                let record = VoterRecord::from(data);
                if record.has_voted {
                    Ok(CheckInResult::AlreadyVoted)
                } else {
                    Ok(CheckInResult::Eligible(record))
                }
            }
            _ => Ok(CheckInResult::Rejected(rejection_from(status, &body))),
        }
    }

    async fn submit_vote(
        &self,
        national_id: &NationalId,
        candidate: Candidate,
    ) -> VoteSubmissionResult {
        let request = VoteRequest {
            aadhaar_id: national_id.as_str().to_string(),
            candidate_id: candidate.id(),
        };
        let sent = self
            .client
            .post(self.url(VOTE_PATH))
            .timeout(self.timeouts.vote)
            .json(&request)
            .send()
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                warn!("Vote submission failed: {}", classify(e));
                return VoteSubmissionResult::NetworkFailure;
            }
        };
        let (status, body) = match read(response).await {
            Ok(read) => read,
            Err(e) => {
                warn!("Vote response unreadable: {}", e);
                return VoteSubmissionResult::NetworkFailure;
            }
        };

        if status.is_success() {
            match parse::<Envelope<VoteData>>(status, &body) {
                Ok(Envelope {
                    data: Some(data), ..
                }) => {
                    info!("Vote recorded: {}", data.transaction_hash);
                    VoteSubmissionResult::Confirmed {
                        receipt_code: data.code(),
                        tx_hash: data.transaction_hash,
                    }
                }
                Ok(_) => {
                    error!("Vote response has no transaction data");
                    VoteSubmissionResult::NetworkFailure
                }
                Err(e) => {
                    error!("Vote response malformed: {}", e);
                    VoteSubmissionResult::NetworkFailure
                }
            }
        } else {
            let mut reason = rejection_from(status, &body);
            if status == StatusCode::FORBIDDEN && reason.code.is_none() {
                reason.code = Some(CODE_DOUBLE_VOTE.to_string());
            }
            warn!("Vote rejected (HTTP {}): {}", status.as_u16(), reason.message);
            VoteSubmissionResult::Rejected { reason }
        }
    }

    async fn lookup_receipt(&self, tx_hash: &TxHash) -> Result<ReceiptLookup, BackendError> {
        let request = LookupReceiptRequest {
            tx_hash: tx_hash.clone(),
        };
        let response = self
            .client
            .post(self.url(LOOKUP_RECEIPT_PATH))
            .timeout(self.timeouts.receipt_lookup)
            .json(&request)
            .send()
            .await
            .map_err(classify)?;
        let (status, body) = read(response).await?;

        if !status.is_success() {
            debug!("Receipt lookup returned HTTP {}", status.as_u16());
            return Ok(ReceiptLookup::Pending);
        }
        match decode_lookup(&body) {
            Ok(Some(code)) => Ok(ReceiptLookup::Found(code)),
            Ok(None) => Ok(ReceiptLookup::Pending),
            Err(e) => Err(BackendError::Protocol {
                status: status.as_u16(),
                detail: e.to_string(),
            }),
        }
    }

    async fn poll_admin_command(&self) -> AdminCommand {
        let sent = self
            .client
            .get(self.url(POLL_COMMANDS_PATH))
            .timeout(self.timeouts.admin_poll)
            .send()
            .await;
        let (status, body) = match sent.map_err(classify) {
            Ok(response) => match read(response).await {
                Ok(read) => read,
                Err(e) => {
                    debug!("Admin poll failed: {}", e);
                    return AdminCommand::None;
                }
            },
            Err(e) => {
                debug!("Admin poll failed: {}", e);
                return AdminCommand::None;
            }
        };
        if !status.is_success() {
            debug!("Admin poll returned HTTP {}", status.as_u16());
            return AdminCommand::None;
        }
        decode_poll(&body).unwrap_or_else(|e| {
            debug!("Admin poll unreadable: {}", e);
            AdminCommand::None
        })
    }

    async fn report_enrollment_result(&self, fingerprint_id: u16, success: bool) {
        let report = EnrollmentReport {
            success,
            fingerprint_id,
        };
        let sent = self
            .client
            .post(self.url(ENROLLMENT_COMPLETE_PATH))
            .timeout(self.timeouts.enrollment_report)
            .json(&report)
            .send()
            .await;
        match sent {
            Ok(response) if response.status().is_success() => {
                info!("Enrollment result reported for ID #{}", fingerprint_id);
            }
            Ok(response) => warn!(
                "Enrollment report for ID #{} rejected: HTTP {}",
                fingerprint_id,
                response.status().as_u16()
            ),
            Err(e) => warn!(
                "Enrollment report for ID #{} failed: {}",
                fingerprint_id,
                classify(e)
            ),
        }
    }

    async fn health(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(self.timeouts.health)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Protocol {
                status: status.as_u16(),
                detail: "health check failed".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use votechain_core::RejectionKind;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_timeouts() -> BackendTimeouts {
        BackendTimeouts {
            check_in: Duration::from_millis(300),
            vote: Duration::from_millis(300),
            receipt_lookup: Duration::from_millis(300),
            admin_poll: Duration::from_millis(300),
            enrollment_report: Duration::from_millis(300),
            health: Duration::from_millis(300),
        }
    }

    async fn setup() -> (MockServer, HttpBackend) {
        let server = MockServer::start().await;
        let backend = HttpBackend::new(format!("{}/", server.uri()), fast_timeouts()).unwrap();
        (server, backend)
    }

    fn voter_id() -> NationalId {
        NationalId::new("123456789012").unwrap()
    }

    #[tokio::test]
    async fn test_check_in_eligible() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(CHECK_IN_PATH))
            .and(body_json(json!({ "aadhaar_id": "123456789012" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "Voter eligible.",
                "data": { "name": "Asha", "fingerprint_id": 7, "photo_url": null }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = backend.check_in(&voter_id()).await.unwrap();
        assert_eq!(
            result,
            CheckInResult::Eligible(VoterRecord {
                name: "Asha".to_string(),
                expected_fingerprint_id: 7,
                has_voted: false,
            })
        );
    }

    #[tokio::test]
    async fn test_check_in_status_mapping() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(CHECK_IN_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": "error", "message": "Voter not found.", "data": null
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(CHECK_IN_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "status": "error", "message": "Voter has already voted.", "data": null
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(CHECK_IN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "error", "message": "Invalid Aadhaar ID format."
            })))
            .mount(&server)
            .await;

        let id = voter_id();
        assert_eq!(backend.check_in(&id).await.unwrap(), CheckInResult::NotFound);
        assert_eq!(
            backend.check_in(&id).await.unwrap(),
            CheckInResult::AlreadyVoted
        );
        assert_eq!(
            backend.check_in(&id).await.unwrap(),
            CheckInResult::Rejected(Rejection::new("Invalid Aadhaar ID format."))
        );
    }

    #[tokio::test]
    async fn test_check_in_timeout() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(CHECK_IN_PATH))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        assert_eq!(
            backend.check_in(&voter_id()).await,
            Err(BackendError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_check_in_unreachable() {
        let backend = HttpBackend::new("http://127.0.0.1:1", fast_timeouts()).unwrap();
        assert!(backend.check_in(&voter_id()).await.is_err());
        assert_eq!(backend.poll_admin_command().await, AdminCommand::None);
    }

    #[tokio::test]
    async fn test_vote_confirmed_with_short_code() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(VOTE_PATH))
            .and(body_json(json!({ "aadhaar_id": "123456789012", "candidate_id": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "Vote officially recorded on-chain.",
                "data": { "transaction_hash": "0xabc", "short_code": "GQ7F2" }
            })))
            .mount(&server)
            .await;

        let result = backend.submit_vote(&voter_id(), Candidate::B).await;
        assert_eq!(
            result,
            VoteSubmissionResult::Confirmed {
                tx_hash: TxHash::new("0xabc"),
                receipt_code: Some("GQ7F2".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_vote_confirmed_without_code() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(VOTE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": { "transaction_hash": "0xdef", "receipt_code": null }
            })))
            .mount(&server)
            .await;

        assert_eq!(
            backend.submit_vote(&voter_id(), Candidate::A).await,
            VoteSubmissionResult::Confirmed {
                tx_hash: TxHash::new("0xdef"),
                receipt_code: None,
            }
        );
    }

    #[tokio::test]
    async fn test_vote_rejections() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(VOTE_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "status": "error",
                "message": "Election contract not available yet. Please try again later."
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(VOTE_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "status": "error", "message": "Double voting detected!", "data": null
            })))
            .mount(&server)
            .await;

        match backend.submit_vote(&voter_id(), Candidate::A).await {
            VoteSubmissionResult::Rejected { reason } => {
                assert_eq!(reason.kind(), RejectionKind::ElectionInactive)
            }
            other => panic!("unexpected {:?}", other),
        }
        match backend.submit_vote(&voter_id(), Candidate::A).await {
            VoteSubmissionResult::Rejected { reason } => {
                assert_eq!(reason.kind(), RejectionKind::DoubleVote)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_vote_network_failures() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(VOTE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(VOTE_PATH))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        assert_eq!(
            backend.submit_vote(&voter_id(), Candidate::A).await,
            VoteSubmissionResult::NetworkFailure
        );
        assert_eq!(
            backend.submit_vote(&voter_id(), Candidate::A).await,
            VoteSubmissionResult::NetworkFailure
        );
    }

    #[tokio::test]
    async fn test_lookup_receipt() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(LOOKUP_RECEIPT_PATH))
            .and(body_json(json!({ "tx_hash": "0xabc" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "success", "code": "K2P9X" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(LOOKUP_RECEIPT_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": "error", "message": "Receipt not found."
            })))
            .mount(&server)
            .await;

        assert_eq!(
            backend.lookup_receipt(&TxHash::new("0xabc")).await.unwrap(),
            ReceiptLookup::Found("K2P9X".to_string())
        );
        assert_eq!(
            backend.lookup_receipt(&TxHash::new("0xother")).await.unwrap(),
            ReceiptLookup::Pending
        );
    }

    #[tokio::test]
    async fn test_poll_admin_command() {
        let (server, backend) = setup().await;
        Mock::given(method("GET"))
            .and(path(POLL_COMMANDS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "command": "ENROLL",
                "status": "WAITING_FOR_KIOSK",
                "target_finger_id": 12,
                "name": "Ravi",
                "aadhaar_id": "999988887777"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(POLL_COMMANDS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "command": "NONE" })))
            .mount(&server)
            .await;

        assert_eq!(
            backend.poll_admin_command().await,
            AdminCommand::Enroll {
                target_fingerprint_id: 12,
                voter_name: "Ravi".to_string()
            }
        );
        assert_eq!(backend.poll_admin_command().await, AdminCommand::None);
    }

    #[tokio::test]
    async fn test_poll_failures_are_none() {
        let (server, backend) = setup().await;
        Mock::given(method("GET"))
            .and(path(POLL_COMMANDS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(POLL_COMMANDS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(POLL_COMMANDS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "command": "ENROLL", "target_finger_id": 3 }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        for _ in 0..3 {
            assert_eq!(backend.poll_admin_command().await, AdminCommand::None);
        }
    }

    #[tokio::test]
    async fn test_report_enrollment_result() {
        let (server, backend) = setup().await;
        Mock::given(method("POST"))
            .and(path(ENROLLMENT_COMPLETE_PATH))
            .and(body_json(json!({ "success": true, "fingerprint_id": 12 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
            .expect(1)
            .mount(&server)
            .await;

        backend.report_enrollment_result(12, true).await;
    }

    #[tokio::test]
    async fn test_health() {
        let (server, backend) = setup().await;
        assert!(backend.health().await.is_err());

        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;
        assert!(backend.health().await.is_ok());
    }
}
