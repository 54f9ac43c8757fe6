//! Decoding of raw keypad keycodes
//!
//! The keypad reports Linux input-event keycodes. Only the codes the kiosk
//! acts on are decoded; everything else is ignored.

pub const KEY_ESC: u16 = 1;
pub const KEY_1: u16 = 2;
pub const KEY_9: u16 = 10;
pub const KEY_0: u16 = 11;
pub const KEY_BACKSPACE: u16 = 14;
pub const KEY_ENTER: u16 = 28;
pub const KEY_KP7: u16 = 71;
pub const KEY_KP8: u16 = 72;
pub const KEY_KP9: u16 = 73;
pub const KEY_KP4: u16 = 75;
pub const KEY_KP5: u16 = 76;
pub const KEY_KP6: u16 = 77;
pub const KEY_KP1: u16 = 79;
pub const KEY_KP2: u16 = 80;
pub const KEY_KP3: u16 = 81;
pub const KEY_KP0: u16 = 82;
pub const KEY_KPENTER: u16 = 96;

/// A decoded keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Enter,
    Backspace,
    Cancel,
}

impl Key {
    /// Decode a raw keycode, `None` for keys the kiosk ignores
    pub fn from_keycode(code: u16) -> Option<Self> {
        let key = match code {
            KEY_ESC => Key::Cancel,
            KEY_1..=KEY_9 => Key::Digit((code - KEY_1 + 1) as u8),
            KEY_0 | KEY_KP0 => Key::Digit(0),
            KEY_BACKSPACE => Key::Backspace,
            KEY_ENTER | KEY_KPENTER => Key::Enter,
            KEY_KP1 => Key::Digit(1),
            KEY_KP2 => Key::Digit(2),
            KEY_KP3 => Key::Digit(3),
            KEY_KP4 => Key::Digit(4),
            KEY_KP5 => Key::Digit(5),
            KEY_KP6 => Key::Digit(6),
            KEY_KP7 => Key::Digit(7),
            KEY_KP8 => Key::Digit(8),
            KEY_KP9 => Key::Digit(9),
            _ => return None,
        };
        Some(key)
    }

    /// Top-row keycode for a digit
    pub fn digit_keycode(digit: u8) -> u16 {
        match digit {
            0 => KEY_0,
            d => KEY_1 + u16::from(d.min(9)) - 1,
        }
    }
}
