#![no_main]

use libfuzzer_sys::fuzz_target;
use votechain_core::wire::{decode_lookup, decode_poll, CheckInData, Envelope, VoteData};
use votechain_core::AdminCommand;

fuzz_target!(|data: &[u8]| {
    // Malformed bodies must fail cleanly, never panic
    if let Ok(AdminCommand::Enroll { voter_name, .. }) = decode_poll(data) {
        assert!(voter_name.len() <= data.len());
    }

    if let Ok(Some(code)) = decode_lookup(data) {
        assert!(!code.is_empty());
    }

    if let Ok(envelope) = serde_json::from_slice::<Envelope<CheckInData>>(data) {
        let _ = envelope.rejection().kind();
        let _ = envelope.rejection().display_lines();
    }

    if let Ok(envelope) = serde_json::from_slice::<Envelope<VoteData>>(data) {
        if let Some(code) = envelope.data.as_ref().and_then(VoteData::code) {
            assert!(!code.is_empty());
        }
    }
});
