use super::registers::{DS, SS};
use super::Cpu;
use crate::bus::Bus;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModRmMode {
    Register,
    NoDisplacement,
    Displacement8,
    /// Also covers the direct `[disp16]` form (mod 0, r/m 6)
    Displacement16,
}

/// A decoded ModRM operand. The effective segment is captured when decoding,
/// so later prefix or register changes within the instruction cannot move it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModRm {
    pub mode: ModRmMode,
    pub reg: u8,
    pub rm: u8,
    pub segment: u16,
    pub offset: u16,
}

impl ModRm {
    pub fn is_register(&self) -> bool {
        self.mode == ModRmMode::Register
    }
}

impl Cpu {
    /// Decodes the current instruction's ModRM byte and displacement.
    /// The first call consumes the bytes; later calls in the same instruction
    /// return the cached result.
    pub(super) fn modrm(&mut self, bus: &mut dyn Bus) -> ModRm {
        if let Some(modrm) = self.modrm {
            return modrm;
        }

        let byte = self.fetch_u8(bus);
        let (mode_bits, reg, rm) = (byte >> 6, (byte >> 3) & 7, byte & 7);
        let mode = match mode_bits {
            0 if rm == 6 => ModRmMode::Displacement16,
            0 => ModRmMode::NoDisplacement,
            1 => ModRmMode::Displacement8,
            2 => ModRmMode::Displacement16,
            _ => ModRmMode::Register,
        };

        let modrm = if mode == ModRmMode::Register {
            ModRm {
                mode,
                reg,
                rm,
                segment: 0,
                offset: 0,
            }
        } else {
            let displacement = match mode {
                ModRmMode::Displacement8 => self.fetch_u8(bus) as i8 as u16,
                ModRmMode::Displacement16 => self.fetch_u16(bus),
                _ => 0,
            };
            let r = &self.reg;
            let (base, default_segment) = match rm {
                0 => (r.bx().wrapping_add(r.si), DS),
                1 => (r.bx().wrapping_add(r.di), DS),
                2 => (r.bp.wrapping_add(r.si), SS),
                3 => (r.bp.wrapping_add(r.di), SS),
                4 => (r.si, DS),
                5 => (r.di, DS),
                6 if mode_bits == 0 => (0, DS),
                6 => (r.bp, SS),
                _ => (r.bx(), DS),
            };
            ModRm {
                mode,
                reg,
                rm,
                segment: self.segment_or(default_segment),
                offset: base.wrapping_add(displacement),
            }
        };
        self.modrm = Some(modrm);
        modrm
    }
}
