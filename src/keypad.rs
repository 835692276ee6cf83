#![allow(non_snake_case)]

use crate::error::ErrorDetail;

/// The number of keys on the CHIP-8 hexadecimal keypad.
const NUMBER_OF_KEYS: u8 = 16;

/// An abstraction of the state of each key on the CHIP-8 keypad (pressed / not pressed).
///
/// Writes come from the host driver's UI thread in response to physical input; reads come from
/// the emulation thread during `SKP`/`SKNP`/`LD Vx, K`. Each slot is a single byte, so concurrent
/// access from the two threads never tears a read or write.
#[derive(Clone, Debug, PartialEq)]
pub struct Keypad {
    /// Array holding a boolean for each key (true means pressed, false means not pressed).
    keys_pressed: [bool; NUMBER_OF_KEYS as usize],
}

impl Keypad {
    /// Constructor that returns a [Keypad] instance with no keys pressed.
    pub(crate) fn new() -> Self {
        Keypad {
            keys_pressed: [false; NUMBER_OF_KEYS as usize],
        }
    }

    /// Returns true if the specified key is pressed, false if not, and
    /// [ErrorDetail::InvalidKey] if the specified key is outside the valid range.
    ///
    /// # Arguments
    ///
    /// * `key` - the hex ordinal of the key (valid range 0x0 to 0xF inclusive)
    pub fn is_key_pressed(&self, key: u8) -> Result<bool, ErrorDetail> {
        match key {
            n if n < NUMBER_OF_KEYS => Ok(self.keys_pressed[n as usize]),
            _ => Err(ErrorDetail::InvalidKey { key }),
        }
    }

    /// Sets the state of the specified key; returns [ErrorDetail::InvalidKey] if the
    /// specified key is outside the valid range.
    ///
    /// # Arguments
    ///
    /// * `key` - the hex ordinal of the key (valid range 0x0 to 0xF inclusive)
    /// * `status` - boolean representing key state (true meaning pressed)
    pub fn set_key_status(&mut self, key: u8, status: bool) -> Result<(), ErrorDetail> {
        match key {
            n if n < NUMBER_OF_KEYS => {
                self.keys_pressed[n as usize] = status;
                Ok(())
            }
            _ => Err(ErrorDetail::InvalidKey { key }),
        }
    }

    /// Returns a vector holding the hex ordinals of all keys currently pressed, or `None` if
    /// no key is pressed.
    pub fn get_keys_pressed(&self) -> Option<Vec<u8>> {
        let keys: Vec<u8> = (0..NUMBER_OF_KEYS)
            .filter(|&key| self.keys_pressed[key as usize])
            .collect();
        if keys.is_empty() {
            None
        } else {
            Some(keys)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_key_pressed_yes() {
        let mut keys: Keypad = Keypad::new();
        keys.keys_pressed[0x2] = true;
        assert!(keys.is_key_pressed(0x2).unwrap());
    }

    #[test]
    fn test_is_key_pressed_no() {
        let keys: Keypad = Keypad::new();
        assert!(!keys.is_key_pressed(0x2).unwrap());
    }

    #[test]
    fn test_is_key_pressed_error() {
        let keys: Keypad = Keypad::new();
        assert_eq!(
            keys.is_key_pressed(NUMBER_OF_KEYS).unwrap_err(),
            ErrorDetail::InvalidKey {
                key: NUMBER_OF_KEYS
            }
        );
    }

    #[test]
    fn test_set_key_status() {
        let mut keys: Keypad = Keypad::new();
        keys.set_key_status(0x2, true).unwrap();
        assert!(keys.keys_pressed[0x2]);
    }

    #[test]
    fn test_set_key_status_error() {
        let mut keys: Keypad = Keypad::new();
        assert_eq!(
            keys.set_key_status(NUMBER_OF_KEYS, true).unwrap_err(),
            ErrorDetail::InvalidKey {
                key: NUMBER_OF_KEYS
            }
        );
    }

    #[test]
    fn test_get_keys_pressed() {
        let mut keys: Keypad = Keypad::new();
        keys.set_key_status(0x2, true).unwrap();
        keys.set_key_status(0x7, true).unwrap();
        keys.set_key_status(0xF, true).unwrap();
        assert_eq!(keys.get_keys_pressed().unwrap(), vec![0x2, 0x7, 0xF]);
    }

    #[test]
    fn test_get_keys_pressed_none() {
        let keys: Keypad = Keypad::new();
        assert!(keys.get_keys_pressed().is_none());
    }
}
