//! Numeric entry buffer for national ID collection

use crate::keycode::Key;

/// What a keystroke did to the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryEvent {
    /// The buffer changed (digit added or removed); echo it
    Edited,
    /// The key was accepted but changed nothing (backspace on empty, digit past max)
    Unchanged,
    /// Entry finished with the collected digits
    Submitted(String),
    /// Escape pressed
    Cancelled,
}

/// Accumulates digits until Enter or the maximum length
#[derive(Debug, Clone)]
pub struct DigitBuffer {
    digits: String,
    max_len: usize,
}

impl DigitBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            digits: String::with_capacity(max_len),
            max_len: max_len.max(1),
        }
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn is_full(&self) -> bool {
        self.digits.len() >= self.max_len
    }

    /// Apply one decoded key
    pub fn push(&mut self, key: Key) -> EntryEvent {
        match key {
            Key::Digit(d) => {
                if self.is_full() {
                    return EntryEvent::Unchanged;
                }
                self.digits.push(char::from(b'0' + d.min(9)));
                if self.is_full() {
                    EntryEvent::Submitted(self.digits.clone())
                } else {
                    EntryEvent::Edited
                }
            }
            Key::Backspace => {
                if self.digits.pop().is_some() {
                    EntryEvent::Edited
                } else {
                    EntryEvent::Unchanged
                }
            }
            // Enter on an empty buffer is ignored
            Key::Enter if self.digits.is_empty() => EntryEvent::Unchanged,
            Key::Enter => EntryEvent::Submitted(self.digits.clone()),
            Key::Cancel => {
                self.digits.clear();
                EntryEvent::Cancelled
            }
        }
    }

    /// Line shown while typing: digits plus a cursor if there is room left
    pub fn echo_line(&self) -> String {
        if self.is_full() {
            self.digits.clone()
        } else {
            format!("{}_", self.digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(buffer: &mut DigitBuffer, keys: &[Key]) -> Vec<EntryEvent> {
        keys.iter().map(|k| buffer.push(*k)).collect()
    }

    #[test]
    fn test_enter_submits() {
        let mut buffer = DigitBuffer::new(12);
        let events = feed(&mut buffer, &[Key::Digit(4), Key::Digit(2), Key::Enter]);
        assert_eq!(events[2], EntryEvent::Submitted("42".to_string()));
    }

    #[test]
    fn test_empty_enter_ignored() {
        let mut buffer = DigitBuffer::new(12);
        assert_eq!(buffer.push(Key::Enter), EntryEvent::Unchanged);
        assert_eq!(buffer.echo_line(), "_");
    }

    #[test]
    fn test_backspace() {
        let mut buffer = DigitBuffer::new(12);
        feed(&mut buffer, &[Key::Digit(1), Key::Digit(2), Key::Backspace]);
        assert_eq!(buffer.digits(), "1");
        buffer.push(Key::Backspace);
        assert_eq!(buffer.push(Key::Backspace), EntryEvent::Unchanged);
    }

    #[test]
    fn test_auto_submit_at_max_len() {
        let mut buffer = DigitBuffer::new(3);
        let events = feed(&mut buffer, &[Key::Digit(1), Key::Digit(2), Key::Digit(3)]);
        assert_eq!(events[2], EntryEvent::Submitted("123".to_string()));
        assert_eq!(buffer.echo_line(), "123");
    }

    #[test]
    fn test_cancel_clears() {
        let mut buffer = DigitBuffer::new(12);
        buffer.push(Key::Digit(9));
        assert_eq!(buffer.push(Key::Cancel), EntryEvent::Cancelled);
        assert_eq!(buffer.digits(), "");
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_max_len(
            max_len in 1usize..16,
            keys in proptest::collection::vec(0u8..13, 0..64),
        ) {
            let mut buffer = DigitBuffer::new(max_len);
            for k in keys {
                let key = match k {
                    10 => Key::Backspace,
                    11 => Key::Enter,
                    12 => Key::Cancel,
                    d => Key::Digit(d),
                };
                if let EntryEvent::Submitted(digits) = buffer.push(key) {
                    prop_assert!(!digits.is_empty());
                    prop_assert!(digits.len() <= max_len);
                    prop_assert!(digits.bytes().all(|b| b.is_ascii_digit()));
                }
                prop_assert!(buffer.digits().len() <= max_len);
            }
        }
    }
}
