//! Double-press candidate confirmation
//!
//! A vote is confirmed only when the same candidate button is accepted on two
//! consecutive presses. Pressing a different candidate re-arms the selection.

use crate::types::Candidate;

/// Result of one accepted candidate press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The candidate is now armed and awaits a second press
    Armed(Candidate),
    /// The armed candidate was pressed again
    Confirmed(Candidate),
}

/// Armed-candidate tracker
#[derive(Debug, Clone, Default)]
pub struct CandidateSelection {
    armed: Option<Candidate>,
}

impl CandidateSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> Option<Candidate> {
        self.armed
    }

    pub fn press(&mut self, candidate: Candidate) -> SelectionEvent {
        if self.armed == Some(candidate) {
            self.armed = None;
            SelectionEvent::Confirmed(candidate)
        } else {
            self.armed = Some(candidate);
            SelectionEvent::Armed(candidate)
        }
    }
}
