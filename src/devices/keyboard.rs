//! # PS/2 Keyboard
//!
//! ```text
//! ┌─────────────┐    IRQ1     ┌──────────────┐   idle loop   ┌─────────────────┐
//! │  Keyboard   │────────────▶│  SCANCODES   │──────────────▶│ ScancodeDecoder │──▶ KeyEvent
//! │  (Port 60)  │             │  (256 bytes) │               │  Shift/Ctrl/Alt │
//! └─────────────┘             └──────────────┘               └─────────────────┘
//! ```
//!
//! Scancode set 1: bit 7 marks a release, 0xE0 prefixes extended keys.

use x86_64::instructions::port::Port;

use crate::devices::ring::ByteRing;

const DATA_PORT: u16 = 0x60;

static SCANCODES: ByteRing<256> = ByteRing::new();

/// IRQ1 handler.
pub fn interrupt() {
    let scancode: u8 = unsafe { Port::new(DATA_PORT).read() };
    SCANCODES.push(scancode);
}

pub fn dequeue_scancode() -> Option<u8> {
    SCANCODES.pop()
}

pub fn is_idle() -> bool {
    SCANCODES.is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub character: char,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

pub struct ScancodeDecoder {
    is_extended: bool,
    shift_pressed: bool,
    ctrl_pressed: bool,
    alt_pressed: bool,
}

impl ScancodeDecoder {
    pub const fn new() -> Self {
        Self {
            is_extended: false,
            shift_pressed: false,
            ctrl_pressed: false,
            alt_pressed: false,
        }
    }

    pub fn process_scancode(&mut self, scancode: u8) -> Option<KeyEvent> {
        if scancode == 0xE0 {
            self.is_extended = true;
            return None;
        }

        let is_release = scancode & 0x80 != 0;
        let key_code = scancode & 0x7F;

        // Extended keys (arrows, right Ctrl/Alt) carry no character.
        if self.is_extended {
            self.is_extended = false;
            match key_code {
                0x1D => self.ctrl_pressed = !is_release,
                0x38 => self.alt_pressed = !is_release,
                _ => {}
            }
            return None;
        }

        match key_code {
            0x2A | 0x36 => {
                self.shift_pressed = !is_release;
                return None;
            }
            0x1D => {
                self.ctrl_pressed = !is_release;
                return None;
            }
            0x38 => {
                self.alt_pressed = !is_release;
                return None;
            }
            _ => {}
        }

        if is_release {
            return None;
        }

        self.scancode_to_char(key_code).map(|c| KeyEvent {
            character: c,
            ctrl: self.ctrl_pressed,
            alt: self.alt_pressed,
            shift: self.shift_pressed,
        })
    }

    fn scancode_to_char(&self, scancode: u8) -> Option<char> {
        const LETTERS: [(u8, char); 26] = [
            (0x10, 'q'), (0x11, 'w'), (0x12, 'e'), (0x13, 'r'), (0x14, 't'),
            (0x15, 'y'), (0x16, 'u'), (0x17, 'i'), (0x18, 'o'), (0x19, 'p'),
            (0x1E, 'a'), (0x1F, 's'), (0x20, 'd'), (0x21, 'f'), (0x22, 'g'),
            (0x23, 'h'), (0x24, 'j'), (0x25, 'k'), (0x26, 'l'), (0x2C, 'z'),
            (0x2D, 'x'), (0x2E, 'c'), (0x2F, 'v'), (0x30, 'b'), (0x31, 'n'),
            (0x32, 'm'),
        ];
        const SHIFTED_DIGITS: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];

        if let Some(&(_, c)) = LETTERS.iter().find(|(code, _)| *code == scancode) {
            return Some(if self.shift_pressed { c.to_ascii_uppercase() } else { c });
        }

        let shift = self.shift_pressed;
        let ch = match scancode {
            0x02..=0x0B => {
                let digit = if scancode == 0x0B { 0 } else { scancode - 0x01 };
                if shift {
                    SHIFTED_DIGITS[usize::from(digit)]
                } else {
                    (b'0' + digit) as char
                }
            }
            0x39 => ' ',
            0x1C => '\n',
            0x0E => '\x08',
            0x0F => '\t',
            0x1A => if shift { '{' } else { '[' },
            0x1B => if shift { '}' } else { ']' },
            0x27 => if shift { ':' } else { ';' },
            0x28 => if shift { '"' } else { '\'' },
            0x29 => if shift { '~' } else { '`' },
            0x2B => if shift { '|' } else { '\\' },
            0x33 => if shift { '<' } else { ',' },
            0x34 => if shift { '>' } else { '.' },
            0x35 => if shift { '?' } else { '/' },
            0x0C => if shift { '_' } else { '-' },
            0x0D => if shift { '+' } else { '=' },
            _ => return None,
        };
        Some(ch)
    }
}

impl Default for ScancodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_codes(codes: &[u8]) -> Vec<char> {
        let mut decoder = ScancodeDecoder::new();
        codes
            .iter()
            .filter_map(|&c| decoder.process_scancode(c))
            .map(|e| e.character)
            .collect()
    }

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(type_codes(&[0x23, 0x17, 0x02, 0x0B]), vec!['h', 'i', '1', '0']);
    }

    #[test]
    fn test_shift_applies_until_released() {
        // shift down, 'a', '1', shift up, 'a'
        assert_eq!(type_codes(&[0x2A, 0x1E, 0x02, 0xAA, 0x1E]), vec!['A', '!', 'a']);
    }

    #[test]
    fn test_releases_and_extended_keys_produce_nothing() {
        assert_eq!(type_codes(&[0x9E, 0xE0, 0x48, 0xE0, 0xC8]), Vec::<char>::new());
    }

    #[test]
    fn test_ctrl_flag() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decoder.process_scancode(0x1D), None);
        let event = decoder.process_scancode(0x2E).unwrap();
        assert_eq!(event.character, 'c');
        assert!(event.ctrl);
    }
}
