//! Uniform result of one bounded wait

use crate::error::Fault;

/// Result of a single deadline-bounded attempt
///
/// Every blocking wait in the kiosk (key entry, button press, finger scan,
/// network call) reports through this type. It bounds one attempt only;
/// retries are decided by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The wait produced a value
    Ok(T),
    /// The deadline passed first
    TimedOut,
    /// The reset button was pressed during the wait
    ResetRequested,
    /// The wait ended with a failure
    Failed(Fault),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, Outcome::ResetRequested)
    }

    /// Map the success value, leaving the other variants untouched
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::TimedOut => Outcome::TimedOut,
            Outcome::ResetRequested => Outcome::ResetRequested,
            Outcome::Failed(fault) => Outcome::Failed(fault),
        }
    }

    /// Collapse into a `Result`, turning timeout and reset into faults
    pub fn into_result(self) -> Result<T, Fault> {
        match self {
            Outcome::Ok(v) => Ok(v),
            Outcome::TimedOut => Err(Fault::InputTimeout),
            Outcome::ResetRequested => Err(Fault::ResetRequested),
            Outcome::Failed(fault) => Err(fault),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Result<T, Fault>> for Outcome<T> {
    fn from(result: Result<T, Fault>) -> Self {
        match result {
            Ok(v) => Outcome::Ok(v),
            Err(Fault::ResetRequested) => Outcome::ResetRequested,
            Err(Fault::InputTimeout) => Outcome::TimedOut,
            Err(fault) => Outcome::Failed(fault),
        }
    }
}
