#![no_main]

use libfuzzer_sys::fuzz_target;
use votechain_core::{Candidate, CandidateSelection, SelectionEvent};

fuzz_target!(|presses: Vec<bool>| {
    let mut selection = CandidateSelection::new();
    let mut previous: Option<Candidate> = None;

    for press in presses {
        let candidate = if press { Candidate::A } else { Candidate::B };

        match selection.press(candidate) {
            // Confirmation only ever follows a press of the same candidate
            SelectionEvent::Confirmed(c) => {
                assert_eq!(c, candidate);
                assert_eq!(previous, Some(candidate));
                return;
            }
            SelectionEvent::Armed(c) => {
                assert_eq!(c, candidate);
                assert_eq!(selection.armed(), Some(candidate));
            }
        }
        previous = Some(candidate);
    }
});
