use bitfield::bitfield;

pub const PORT_KEYPAD: u16 = 0xB5;

bitfield! {
  /// Host-side button state, one nibble per matrix row
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct Buttons(u16);
  impl Debug;
  pub y1, set_y1: 0;
  pub y2, set_y2: 1;
  pub y3, set_y3: 2;
  pub y4, set_y4: 3;
  pub x1, set_x1: 4;
  pub x2, set_x2: 5;
  pub x3, set_x3: 6;
  pub x4, set_x4: 7;
  pub start, set_start: 9;
  pub a, set_a: 10;
  pub b, set_b: 11;
}

impl Buttons {
    fn row(&self, row: u8) -> u8 {
        ((self.0 >> (row * 4)) & 0x0F) as u8
    }
}

/// B5h - KEYPAD. Bits 4-6 select the Y, X and button rows; reads return the
/// pressed keys of every selected row in bits 0-3.
#[derive(Clone, Copy, Debug, Default)]
pub struct Keypad {
    select: u8,
    buttons: Buttons,
}

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn buttons(&self) -> Buttons {
        self.buttons
    }

    /// Replaces the button state; returns true if any button went down
    pub fn set_buttons(&mut self, buttons: Buttons) -> bool {
        let pressed = buttons.0 & !self.buttons.0;
        self.buttons = buttons;
        pressed != 0
    }

    pub fn read_port(&self, port: u16) -> Option<u8> {
        if port != PORT_KEYPAD {
            return None;
        }
        let keys = (0..3)
            .filter(|row| self.select & (0x10 << row) != 0)
            .fold(0, |keys, row| keys | self.buttons.row(row));
        Some(self.select | keys)
    }

    pub fn write_port(&mut self, port: u16, data: u8) -> bool {
        if port != PORT_KEYPAD {
            return false;
        }
        self.select = data & 0x70;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_selected_by_the_high_nibble() {
        let mut keypad = Keypad::new();
        let mut buttons = Buttons::default();
        buttons.set_y2(true);
        buttons.set_x4(true);
        buttons.set_a(true);
        keypad.set_buttons(buttons);

        keypad.write_port(PORT_KEYPAD, 0x10);
        assert_eq!(keypad.read_port(PORT_KEYPAD), Some(0x12));
        keypad.write_port(PORT_KEYPAD, 0x20);
        assert_eq!(keypad.read_port(PORT_KEYPAD), Some(0x28));
        keypad.write_port(PORT_KEYPAD, 0x4F);
        assert_eq!(keypad.read_port(PORT_KEYPAD), Some(0x44));
        keypad.write_port(PORT_KEYPAD, 0x70);
        assert_eq!(keypad.read_port(PORT_KEYPAD), Some(0x7E));
        assert_eq!(keypad.read_port(0xB4), None);
    }

    #[test]
    fn only_new_presses_are_reported() {
        let mut keypad = Keypad::new();
        let mut buttons = Buttons::default();
        buttons.set_start(true);
        assert!(keypad.set_buttons(buttons));
        assert!(!keypad.set_buttons(buttons));
        assert!(!keypad.set_buttons(Buttons::default()));
        assert!(keypad.buttons().0 == 0);
    }
}
