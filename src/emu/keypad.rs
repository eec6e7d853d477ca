use crate::u4;

/// Hex keypad state, bit n set while key n is held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keypad(u16);

impl Keypad {
    pub fn set(&mut self, key: u4, pressed: bool) {
        let bit = 1u16 << key.get();
        if pressed {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn is_pressed(&self, key: u4) -> bool {
        self.0 & (1u16 << key.get()) != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_toggle_single_bits() {
        let mut keypad = Keypad::default();
        keypad.set(u4::new(0x0), true);
        keypad.set(u4::new(0xF), true);
        assert_eq!(keypad.bits(), 0x8001);
        assert!(keypad.is_pressed(u4::new(0xF)));

        keypad.set(u4::new(0x0), false);
        assert_eq!(keypad.bits(), 0x8000);
        assert!(!keypad.is_pressed(u4::new(0x0)));
    }

    #[test]
    fn releasing_an_unheld_key_is_harmless() {
        let mut keypad = Keypad::default();
        keypad.set(u4::new(3), false);
        assert_eq!(keypad.bits(), 0);
    }
}
