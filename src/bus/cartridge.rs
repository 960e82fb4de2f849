use crate::u20::u20;

use thiserror::Error;

/// First linear address decoded by the cartridge ROM window
pub const ROM_WINDOW_START: u32 = 0x2_0000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RomError {
    #[error("ROM image is empty")]
    Empty,
    #[error("ROM image size {0:#X} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("ROM image size {0:#X} exceeds the 1 MiB address space")]
    TooLarge(usize),
}

/// A ROM image mirrored through the 0x20000-0xFFFFF window, with its last
/// byte at 0xFFFFF so the boot vector at FFFF:0000 lands in the final 16 bytes.
/// Bank switching and save memory live outside this core.
pub struct Cartridge {
    rom: Vec<u8>,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>) -> Result<Self, RomError> {
        if rom.is_empty() {
            return Err(RomError::Empty);
        }
        if !rom.len().is_power_of_two() {
            return Err(RomError::NotPowerOfTwo(rom.len()));
        }
        // A power of two no larger than 1 MiB; images of exactly 1 MiB lose
        // their first 128 KiB to RAM and save memory
        if rom.len() > 0x10_0000 {
            return Err(RomError::TooLarge(rom.len()));
        }
        log::debug!("Cartridge ROM: {:#X} bytes", rom.len());
        Ok(Self { rom })
    }

    /// Reads the footer's system byte; bit 0 marks images that expect the color hardware
    pub fn requires_color(&self) -> bool {
        self.rom.len() >= 10 && self.rom[self.rom.len() - 9] & 1 == 1
    }

    pub fn try_read_u8(&self, addr: u20) -> Option<u8> {
        if addr.0 < ROM_WINDOW_START {
            return None;
        }
        let mask = self.rom.len() - 1;
        Some(self.rom[addr.raw() & mask])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(Cartridge::new(vec![]).err(), Some(RomError::Empty));
        assert_eq!(
            Cartridge::new(vec![0; 0x3000]).err(),
            Some(RomError::NotPowerOfTwo(0x3000))
        );
        assert_eq!(
            Cartridge::new(vec![0; 0x20_0000]).err(),
            Some(RomError::TooLarge(0x20_0000))
        );
    }

    #[test]
    fn image_is_aligned_to_the_top_of_memory() {
        let mut rom = vec![0; 0x1_0000];
        rom[0xFFF0] = 0xEA;
        rom[0x0000] = 0x11;
        let cart = Cartridge::new(rom).unwrap();
        assert_eq!(cart.try_read_u8(u20(0xFFFF0)), Some(0xEA));
        assert_eq!(cart.try_read_u8(u20(0xF0000)), Some(0x11));
        assert_eq!(cart.try_read_u8(u20(0x20000)), Some(0x11));
        assert_eq!(cart.try_read_u8(u20(0x1FFFF)), None);
    }
}
