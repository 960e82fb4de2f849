use bitfield::bitfield;

pub const PORT_BASE: u16 = 0xB0;
pub const PORT_ENABLE: u16 = 0xB2;
pub const PORT_STATUS: u16 = 0xB4;
pub const PORT_ACKNOWLEDGE: u16 = 0xB6;

bitfield! {
  /// One bit per hardware interrupt source, in priority order (bit 7 highest).
  /// The same layout is used by the enable, status and acknowledge ports.
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct InterruptBits(u8);
  impl Debug;
  pub serial_tx, set_serial_tx: 0;
  pub key, set_key: 1;
  pub cartridge, set_cartridge: 2;
  pub serial_rx, set_serial_rx: 3;
  pub line_compare, set_line_compare: 4;
  pub vblank_timer, set_vblank_timer: 5;
  pub vblank, set_vblank: 6;
  pub hblank_timer, set_hblank_timer: 7;
}

impl InterruptBits {
    /// The highest-priority set bit
    pub fn highest(&self) -> Option<u8> {
        (self.0 != 0).then(|| 7 - self.0.leading_zeros() as u8)
    }
}

/// The interrupt controller: latches device requests and selects the vector
/// the CPU is interrupted with
#[derive(Clone, Debug, Default)]
pub struct InterruptController {
    base: u8,
    enable: InterruptBits,
    status: InterruptBits,
}

impl InterruptController {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn enable(&self) -> InterruptBits {
        self.enable
    }

    pub fn status(&self) -> InterruptBits {
        self.status
    }

    /// Latches requests from devices; sources that are not enabled are dropped
    pub fn request(&mut self, bits: InterruptBits) {
        self.status.0 |= bits.0 & self.enable.0;
    }

    /// The highest-priority pending and enabled source, as a bit index
    pub fn pending(&self) -> Option<u8> {
        InterruptBits(self.status.0 & self.enable.0).highest()
    }

    pub fn vector(&self, bit: u8) -> u8 {
        (self.base & 0xF8) + bit
    }

    pub fn clear(&mut self, bit: u8) {
        self.status.0 &= !(1 << bit);
    }

    pub fn read_port(&self, port: u16) -> Option<u8> {
        match port {
            PORT_BASE => Some(self.base),
            PORT_ENABLE => Some(self.enable.0),
            PORT_STATUS => Some(self.status.0),
            _ => None,
        }
    }

    /// Returns false for ports this controller does not decode
    pub fn write_port(&mut self, port: u16, data: u8) -> bool {
        match port {
            PORT_BASE => self.base = data & 0xF8,
            PORT_ENABLE => {
                self.enable = InterruptBits(data);
                self.status.0 &= data;
            }
            PORT_ACKNOWLEDGE => self.status.0 &= !data,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_priority_wins() {
        let mut bits = InterruptBits::default();
        assert_eq!(bits.highest(), None);
        bits.set_line_compare(true);
        bits.set_key(true);
        assert_eq!(bits.highest(), Some(4));
        bits.set_hblank_timer(true);
        assert_eq!(bits.highest(), Some(7));
    }

    #[test]
    fn disabled_requests_are_dropped() {
        let mut controller = InterruptController::new();
        controller.write_port(PORT_ENABLE, 0x40);
        let mut bits = InterruptBits::default();
        bits.set_vblank(true);
        bits.set_line_compare(true);
        controller.request(bits);
        assert_eq!(controller.status().0, 0x40);
        assert_eq!(controller.pending(), Some(6));
    }

    #[test]
    fn vector_is_base_plus_bit() {
        let mut controller = InterruptController::new();
        controller.write_port(PORT_BASE, 0x2F);
        assert_eq!(controller.read_port(PORT_BASE), Some(0x28));
        assert_eq!(controller.vector(6), 0x2E);
    }

    #[test]
    fn acknowledge_clears_status() {
        let mut controller = InterruptController::new();
        controller.write_port(PORT_ENABLE, 0xFF);
        controller.request(InterruptBits(0xC0));
        controller.write_port(PORT_ACKNOWLEDGE, 0x40);
        assert_eq!(controller.read_port(PORT_STATUS), Some(0x80));
        controller.clear(7);
        assert_eq!(controller.pending(), None);
    }
}
