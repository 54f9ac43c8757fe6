//! Operator-facing screens
//!
//! The kiosk display has three text lines. Each screen also fixes the front
//! panel LEDs, so indicator state follows from which screen is up.

use tracing::{debug, warn};

use votechain_core::{Candidate, Receipt, Rejection, TxHash};

use crate::devices::{lock_display, BeepPattern, Feedback, LedState, SharedDisplay};

/// Three display lines plus the LED state to show with them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub lines: [String; 3],
    pub leds: Option<LedState>,
}

impl Screen {
    pub fn new(l1: impl Into<String>, l2: impl Into<String>, l3: impl Into<String>) -> Self {
        Self {
            lines: [l1.into(), l2.into(), l3.into()],
            leds: None,
        }
    }

    pub fn with_leds(mut self, leds: LedState) -> Self {
        self.leds = Some(leds);
        self
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|l| l.contains(text))
    }

    pub fn idle() -> Self {
        Self::new("VOTE", "CHAIN", "").with_leds(LedState::OFF)
    }

    pub fn id_entry(echo: &str) -> Self {
        let hint = if echo.is_empty() || echo == "_" {
            "Type on keyboard"
        } else {
            echo
        };
        Self::new("Enter National ID", hint, "_").with_leds(LedState::GREEN)
    }

    pub fn cancelled() -> Self {
        Self::new("Cancelled", "", "").with_leds(LedState::OFF)
    }

    pub fn checking(masked_id: &str) -> Self {
        Self::new("Checking DB...", masked_id, "").with_leds(LedState::BOTH)
    }

    pub fn not_registered() -> Self {
        Self::new("Check-in Failed", "Not Found/Voted", "Press START").with_leds(LedState::RED)
    }

    pub fn check_in_rejected(rejection: &Rejection) -> Self {
        let reason = if rejection.message.is_empty() {
            "Error".to_string()
        } else {
            rejection.message.clone()
        };
        Self::new("Check-in Failed", reason, "Press START").with_leds(LedState::RED)
    }

    pub fn network_error() -> Self {
        Self::new("Network Error", "Check Server", "Press START").with_leds(LedState::RED)
    }

    pub fn verifying() -> Self {
        Self::new("Verifying...", "Scan Finger", "Or Press START").with_leds(LedState::GREEN)
    }

    pub fn scan_retry(reason: &str, next: u32, of: u32) -> Self {
        Self::new(reason, "Try again", format!("Attempt {} of {}", next, of))
            .with_leds(LedState::RED)
    }

    pub fn access_denied(reason: &str) -> Self {
        Self::new("Access Denied", reason, "Press START").with_leds(LedState::RED)
    }

    pub fn greeting(name: &str) -> Self {
        Self::new(format!("Hi {}", name), "Select Candidate:", "A (Btn1) | B (Btn2)")
            .with_leds(LedState::GREEN)
    }

    pub fn confirm(candidate: Candidate) -> Self {
        Self::new("CONFIRM VOTE:", candidate.display_name(), "Press Again ->")
            .with_leds(LedState::GREEN)
    }

    pub fn session_timed_out() -> Self {
        Self::new("Session timed out", "Returning to idle", "").with_leds(LedState::OFF)
    }

    pub fn submitting() -> Self {
        Self::new("Submitting...", "Waiting for confirmation", "May take up to 90s")
            .with_leds(LedState::BOTH)
    }

    pub fn vote_confirmed() -> Self {
        Self::new("Vote Confirmed!", "Finalizing...", "").with_leds(LedState::GREEN)
    }

    pub fn receipt(receipt: &Receipt) -> Self {
        Self::new(
            "Vote Receipt:",
            format!("Code: {}", receipt.code),
            receipt.candidate.display_name(),
        )
        .with_leds(LedState::GREEN)
    }

    pub fn verify_manually(tx_hash: &TxHash) -> Self {
        Self::new("Verify Manually:", tx_hash.short(), "Use verify page").with_leds(LedState::GREEN)
    }

    pub fn thank_you() -> Self {
        Self::new("Vote Submitted!", "Thank you", "").with_leds(LedState::GREEN)
    }

    pub fn vote_rejected(rejection: &Rejection) -> Self {
        let [l1, l2, l3] = rejection.display_lines();
        Self::new(l1, l2, l3).with_leds(LedState::RED)
    }

    pub fn connection_failed() -> Self {
        Self::new("Connection Fail", "Retry", "Press START").with_leds(LedState::RED)
    }

    pub fn self_test(lines: [String; 3]) -> Self {
        let [l1, l2, l3] = lines;
        Self::new(l1, l2, l3).with_leds(LedState::OFF)
    }

    pub fn sensor_error() -> Self {
        Self::new("FINGERPRINT ERROR", "Check wiring & restart", "").with_leds(LedState::RED)
    }

    pub fn enroll_place(target: u16) -> Self {
        Self::new("ENROLL MODE", format!("ID #{}", target), "Place Finger...")
            .with_leds(LedState::BOTH)
    }

    pub fn enroll_remove() -> Self {
        Self::new("Remove Finger", "", "").with_leds(LedState::BOTH)
    }

    pub fn enroll_again() -> Self {
        Self::new("Place Again", "Verify...", "").with_leds(LedState::BOTH)
    }

    pub fn enroll_success() -> Self {
        Self::new("Enrollment", "SUCCESS!", "Saved.").with_leds(LedState::GREEN)
    }

    pub fn enroll_failed() -> Self {
        Self::new("Enrollment", "FAILED", "Try Again").with_leds(LedState::RED)
    }
}

/// Display plus feedback outputs
pub struct Panel {
    display: SharedDisplay,
    feedback: Box<dyn Feedback>,
}

impl Panel {
    pub fn new(display: SharedDisplay, feedback: Box<dyn Feedback>) -> Self {
        Self { display, feedback }
    }

    /// Handle for drawing from another task
    pub fn display(&self) -> SharedDisplay {
        self.display.clone()
    }

    /// Replace the display contents and apply the screen's LEDs
    ///
    /// Draw failures are logged; the session never stops over the display.
    pub fn show(&mut self, screen: &Screen) {
        debug!("[DISPLAY] {} | {} | {}", screen.lines[0], screen.lines[1], screen.lines[2]);
        if let Some(leds) = screen.leds {
            self.feedback.set_leds(leds);
        }
        let mut display = lock_display(&self.display);
        display.clear();
        for (row, line) in screen.lines.iter().enumerate() {
            display.draw_text(row, line);
        }
        if let Err(e) = display.flush() {
            warn!("Screen draw error: {}", e);
        }
    }

    pub fn leds(&mut self, leds: LedState) {
        self.feedback.set_leds(leds);
    }

    pub fn play(&mut self, pattern: BeepPattern) {
        self.feedback.play(pattern);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::sim::{RecordingDisplay, RecordingFeedback};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_receipt_screen() {
        let receipt = Receipt::with_code("GQ7F2", TxHash::new("0xabc"), Candidate::A);
        let screen = Screen::receipt(&receipt);
        assert_eq!(screen.lines[1], "Code: GQ7F2");
        assert_eq!(screen.lines[2], "CANDIDATE A");
    }

    #[test]
    fn test_manual_verify_truncates_hash() {
        let tx = TxHash::new("0x1234567890abcdef1234");
        let screen = Screen::verify_manually(&tx);
        assert_eq!(screen.lines[1], "0x1234567890...");
    }

    #[test]
    fn test_id_entry_hint() {
        assert_eq!(Screen::id_entry("_").lines[1], "Type on keyboard");
        assert_eq!(Screen::id_entry("12_").lines[1], "12_");
    }

    #[test]
    fn test_panel_show_sets_leds_and_lines() {
        let (display, log) = RecordingDisplay::new();
        let (feedback, feedback_log) = RecordingFeedback::new();
        let mut panel = Panel::new(Arc::new(Mutex::new(display)), Box::new(feedback));

        panel.show(&Screen::network_error());
        let frame = log.last().unwrap();
        assert_eq!(frame.line(0), "Network Error");
        assert_eq!(frame.line(2), "Press START");
        assert_eq!(feedback_log.leds(), LedState::RED);

        panel.show(&Screen::new("x", "", ""));
        assert_eq!(feedback_log.leds(), LedState::RED);
    }
}
