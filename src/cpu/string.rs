use super::alu;
use super::registers::DS;
use super::{Access, Cpu, RepeatCondition};
use crate::bus::Bus;

const REPEAT_SETUP_CYCLES: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum StringOp {
    Ins,
    Outs,
    Movs,
    Cmps,
    Stos,
    Lods,
    Scas,
}

impl StringOp {
    pub(super) const INS: u8 = 0;
    pub(super) const OUTS: u8 = 1;
    pub(super) const MOVS: u8 = 2;
    pub(super) const CMPS: u8 = 3;
    pub(super) const STOS: u8 = 4;
    pub(super) const LODS: u8 = 5;
    pub(super) const SCAS: u8 = 6;

    fn from_index(index: u8) -> Self {
        match index {
            Self::INS => Self::Ins,
            Self::OUTS => Self::Outs,
            Self::MOVS => Self::Movs,
            Self::CMPS => Self::Cmps,
            Self::STOS => Self::Stos,
            Self::LODS => Self::Lods,
            _ => Self::Scas,
        }
    }

    fn cycles(self) -> u32 {
        match self {
            Self::Ins | Self::Outs => 6,
            Self::Movs => 5,
            Self::Cmps => 6,
            Self::Stos | Self::Lods => 3,
            Self::Scas => 4,
        }
    }

    /// CMPS and SCAS also stop a repeat on the Z flag
    fn compares(self) -> bool {
        matches!(self, Self::Cmps | Self::Scas)
    }
}

impl Cpu {
    /// A string instruction. Under a repeat prefix the whole loop runs within
    /// this one call, until CX reaches zero or the compare condition fails.
    pub(super) fn string<T: Access, const OP: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let op = StringOp::from_index(OP);
        let Some(repeat) = self.prefix.repeat else {
            self.string_iteration::<T>(bus, op);
            return op.cycles();
        };

        let mut cycles = REPEAT_SETUP_CYCLES;
        while self.reg.cx() != 0 {
            self.string_iteration::<T>(bus, op);
            let cx = self.reg.cx().wrapping_sub(1);
            self.reg.set_cx(cx);
            cycles += op.cycles();
            if op.compares() {
                let zero = self.reg.psw.zero();
                match repeat {
                    RepeatCondition::WhileEqual if !zero => break,
                    RepeatCondition::WhileNotEqual if zero => break,
                    _ => {}
                }
            }
        }
        cycles
    }

    fn string_iteration<T: Access>(&mut self, bus: &mut dyn Bus, op: StringOp) {
        let size = (T::BITS / 8) as u16;
        let delta = if self.reg.psw.direction() {
            size.wrapping_neg()
        } else {
            size
        };
        let source = self.segment_or(DS);
        let (es, si, di) = (self.reg.es, self.reg.si, self.reg.di);

        match op {
            StringOp::Ins => {
                let data = T::read_port(bus, self.reg.dx());
                self.write_mem(bus, es, di, data);
            }
            StringOp::Outs => {
                let data = self.read_mem::<T>(bus, source, si);
                T::write_port(bus, self.reg.dx(), data);
            }
            StringOp::Movs => {
                let data = self.read_mem::<T>(bus, source, si);
                self.write_mem(bus, es, di, data);
            }
            StringOp::Cmps => {
                let a = self.read_mem::<T>(bus, source, si);
                let b = self.read_mem::<T>(bus, es, di);
                alu::sub(&mut self.reg.psw, a, b, false);
            }
            StringOp::Stos => {
                let data = T::get_reg(&self.reg, 0);
                self.write_mem(bus, es, di, data);
            }
            StringOp::Lods => {
                let data = self.read_mem::<T>(bus, source, si);
                T::set_reg(&mut self.reg, 0, data);
            }
            StringOp::Scas => {
                let a = T::get_reg(&self.reg, 0);
                let b = self.read_mem::<T>(bus, es, di);
                alu::sub(&mut self.reg.psw, a, b, false);
            }
        }

        if matches!(op, StringOp::Outs | StringOp::Movs | StringOp::Cmps | StringOp::Lods) {
            self.reg.si = si.wrapping_add(delta);
        }
        if op != StringOp::Outs && op != StringOp::Lods {
            self.reg.di = di.wrapping_add(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::FlatBus;
    use crate::u20::u20;

    fn cpu_with(bus: &mut FlatBus, code: &[u8]) -> Cpu {
        bus.load(u20::from_segmented(0x1000, 0), code);
        let mut cpu = Cpu::new();
        cpu.reg.cs = 0x1000;
        cpu.reg.ip = 0;
        cpu.reg.ds = 0x2000;
        cpu.reg.es = 0x3000;
        cpu
    }

    #[test]
    fn rep_movsb_copies_in_one_step() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_with(&mut bus, &[0xF3, 0xA4, 0x90]);
        bus.load(u20::from_segmented(0x2000, 0x10), b"hello");
        cpu.reg.si = 0x10;
        cpu.reg.di = 0x20;
        cpu.reg.set_cx(5);
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 1 + REPEAT_SETUP_CYCLES + 5 * 5);
        assert_eq!(cpu.reg.cx(), 0);
        assert_eq!((cpu.reg.si, cpu.reg.di), (0x15, 0x25));
        assert_eq!(cpu.reg.ip, 2);
        for (i, &byte) in b"hello".iter().enumerate() {
            assert_eq!(bus.peek(u20::from_segmented(0x3000, 0x20 + i as u16)), byte);
        }
    }

    #[test]
    fn rep_with_zero_count_does_nothing() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_with(&mut bus, &[0xF3, 0xAA]);
        cpu.reg.di = 0x40;
        assert_eq!(cpu.step(&mut bus), 1 + REPEAT_SETUP_CYCLES);
        assert_eq!(cpu.reg.di, 0x40);
    }

    #[test]
    fn repne_scasb_stops_on_match() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_with(&mut bus, &[0xF2, 0xAE]);
        bus.load(u20::from_segmented(0x3000, 0), b"abcdef");
        cpu.reg.set_al(b'c');
        cpu.reg.set_cx(6);
        cpu.step(&mut bus);
        assert!(cpu.reg.psw.zero());
        assert_eq!(cpu.reg.di, 3);
        assert_eq!(cpu.reg.cx(), 3);
    }

    #[test]
    fn direction_flag_decrements() {
        let mut bus = FlatBus::new();
        // STD; LODSW
        let mut cpu = cpu_with(&mut bus, &[0xFD, 0xAD]);
        bus.load(u20::from_segmented(0x2000, 0x10), &[0xCD, 0xAB]);
        cpu.reg.si = 0x10;
        cpu.step(&mut bus);
        assert_eq!(cpu.step(&mut bus), 3);
        assert_eq!(cpu.reg.ax(), 0xABCD);
        assert_eq!(cpu.reg.si, 0x0E);
    }

    #[test]
    fn source_segment_can_be_overridden() {
        let mut bus = FlatBus::new();
        // ES: LODSB
        let mut cpu = cpu_with(&mut bus, &[0x26, 0xAC]);
        bus.load(u20::from_segmented(0x3000, 0x05), &[0x77]);
        cpu.reg.si = 0x05;
        cpu.step(&mut bus);
        assert_eq!(cpu.reg.al(), 0x77);
    }
}
