#![no_main]

use libfuzzer_sys::fuzz_target;
use votechain_core::{DigitBuffer, EntryEvent, Key, NATIONAL_ID_MAX_LEN};

fuzz_target!(|keycodes: Vec<u16>| {
    let mut buffer = DigitBuffer::new(NATIONAL_ID_MAX_LEN);

    for code in keycodes {
        // Unknown keycodes never reach the buffer
        let Some(key) = Key::from_keycode(code) else {
            continue;
        };

        match buffer.push(key) {
            EntryEvent::Submitted(digits) => {
                assert!(!digits.is_empty());
                assert!(digits.len() <= NATIONAL_ID_MAX_LEN);
                assert!(digits.bytes().all(|b| b.is_ascii_digit()));
                buffer = DigitBuffer::new(NATIONAL_ID_MAX_LEN);
            }
            EntryEvent::Cancelled => assert!(buffer.digits().is_empty()),
            EntryEvent::Edited | EntryEvent::Unchanged => {}
        }

        assert!(buffer.digits().len() <= NATIONAL_ID_MAX_LEN);
        assert!(buffer.echo_line().len() <= NATIONAL_ID_MAX_LEN + 1);
    }
});
