//! Bounded retry budget for fingerprint verification

use crate::MAX_FINGER_ATTEMPTS;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptVerdict {
    /// Another attempt is allowed; `next` is its 1-based number
    Retry { next: u32, of: u32 },
    /// The budget is used up
    Exhausted,
}

/// Counts failed attempts against a fixed budget
///
/// Scan failures and wrong-finger matches are charged to the same budget.
#[derive(Debug, Clone)]
pub struct AttemptBudget {
    max_attempts: u32,
    failed: u32,
}

impl Default for AttemptBudget {
    fn default() -> Self {
        Self::new(MAX_FINGER_ATTEMPTS)
    }
}

impl AttemptBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            failed: 0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Failed attempts so far
    pub fn failed(&self) -> u32 {
        self.failed
    }

    /// 1-based number of the attempt about to be made
    pub fn current(&self) -> u32 {
        (self.failed + 1).min(self.max_attempts)
    }

    pub fn is_exhausted(&self) -> bool {
        self.failed >= self.max_attempts
    }

    pub fn record_failure(&mut self) -> AttemptVerdict {
        self.failed = (self.failed + 1).min(self.max_attempts);
        if self.is_exhausted() {
            AttemptVerdict::Exhausted
        } else {
            AttemptVerdict::Retry {
                next: self.failed + 1,
                of: self.max_attempts,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget_is_two() {
        let mut budget = AttemptBudget::default();
        assert_eq!(budget.current(), 1);
        assert_eq!(
            budget.record_failure(),
            AttemptVerdict::Retry { next: 2, of: 2 }
        );
        assert_eq!(budget.current(), 2);
        assert_eq!(budget.record_failure(), AttemptVerdict::Exhausted);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_failures_saturate() {
        let mut budget = AttemptBudget::new(1);
        assert_eq!(budget.record_failure(), AttemptVerdict::Exhausted);
        assert_eq!(budget.record_failure(), AttemptVerdict::Exhausted);
        assert_eq!(budget.failed(), 1);
    }
}
