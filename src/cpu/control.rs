use super::{vector, Cpu};
use crate::bus::Bus;

impl Cpu {
    /// Evaluates the condition encoded in the low nibble of a Jcc opcode
    fn condition(&self, cond: u8) -> bool {
        let psw = &self.reg.psw;
        let result = match cond >> 1 {
            0 => psw.overflow(),
            1 => psw.carry(),
            2 => psw.zero(),
            3 => psw.carry() || psw.zero(),
            4 => psw.sign(),
            5 => psw.parity(),
            6 => psw.sign() != psw.overflow(),
            _ => psw.zero() || psw.sign() != psw.overflow(),
        };
        // Odd encodings are the negated forms
        result != (cond & 1 == 1)
    }

    fn jump_relative(&mut self, displacement: u16) {
        self.reg.ip = self.reg.ip.wrapping_add(displacement);
    }

    pub(super) fn jcc<const COND: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let displacement = self.fetch_u8(bus) as i8 as u16;
        if self.condition(COND) {
            self.jump_relative(displacement);
            4
        } else {
            1
        }
    }

    pub(super) fn jmp_short(&mut self, bus: &mut dyn Bus) -> u32 {
        let displacement = self.fetch_u8(bus) as i8 as u16;
        self.jump_relative(displacement);
        4
    }

    pub(super) fn jmp_near(&mut self, bus: &mut dyn Bus) -> u32 {
        let displacement = self.fetch_u16(bus);
        self.jump_relative(displacement);
        4
    }

    pub(super) fn jmp_far(&mut self, bus: &mut dyn Bus) -> u32 {
        let offset = self.fetch_u16(bus);
        let segment = self.fetch_u16(bus);
        self.reg.cs = segment;
        self.reg.ip = offset;
        7
    }

    pub(super) fn call_near(&mut self, bus: &mut dyn Bus) -> u32 {
        let displacement = self.fetch_u16(bus);
        self.push(bus, self.reg.ip);
        self.jump_relative(displacement);
        5
    }

    pub(super) fn call_far(&mut self, bus: &mut dyn Bus) -> u32 {
        let offset = self.fetch_u16(bus);
        let segment = self.fetch_u16(bus);
        self.push(bus, self.reg.cs);
        self.push(bus, self.reg.ip);
        self.reg.cs = segment;
        self.reg.ip = offset;
        10
    }

    /// RET, optionally releasing `imm16` bytes of arguments
    pub(super) fn ret_near<const RELEASE: bool>(&mut self, bus: &mut dyn Bus) -> u32 {
        let release = if RELEASE { self.fetch_u16(bus) } else { 0 };
        self.reg.ip = self.pop(bus);
        self.reg.sp = self.reg.sp.wrapping_add(release);
        6
    }

    pub(super) fn ret_far<const RELEASE: bool>(&mut self, bus: &mut dyn Bus) -> u32 {
        let release = if RELEASE { self.fetch_u16(bus) } else { 0 };
        self.reg.ip = self.pop(bus);
        self.reg.cs = self.pop(bus);
        self.reg.sp = self.reg.sp.wrapping_add(release);
        if RELEASE {
            9
        } else {
            8
        }
    }

    pub(super) fn iret(&mut self, bus: &mut dyn Bus) -> u32 {
        self.reg.ip = self.pop(bus);
        self.reg.cs = self.pop(bus);
        let flags = self.pop(bus);
        self.reg.psw.set_raw(flags);
        10
    }

    pub(super) fn int3(&mut self, bus: &mut dyn Bus) -> u32 {
        self.raise(bus, vector::BREAKPOINT)
    }

    pub(super) fn int_imm(&mut self, bus: &mut dyn Bus) -> u32 {
        let vector = self.fetch_u8(bus);
        self.raise(bus, vector)
    }

    pub(super) fn int_overflow(&mut self, bus: &mut dyn Bus) -> u32 {
        if self.reg.psw.overflow() {
            self.raise(bus, vector::OVERFLOW)
        } else {
            1
        }
    }

    /// E0-E2: LOOPNE, LOOPE, LOOP
    pub(super) fn loop_cx<const KIND: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let displacement = self.fetch_u8(bus) as i8 as u16;
        let cx = self.reg.cx().wrapping_sub(1);
        self.reg.set_cx(cx);
        let taken = cx != 0
            && match KIND {
                0 => !self.reg.psw.zero(),
                1 => self.reg.psw.zero(),
                _ => true,
            };
        if taken {
            self.jump_relative(displacement);
            6
        } else {
            3
        }
    }

    pub(super) fn jcxz(&mut self, bus: &mut dyn Bus) -> u32 {
        let displacement = self.fetch_u8(bus) as i8 as u16;
        if self.reg.cx() == 0 {
            self.jump_relative(displacement);
            4
        } else {
            1
        }
    }

    /// ENTER imm16, imm8: builds a stack frame with `level` nested frame pointers
    pub(super) fn enter(&mut self, bus: &mut dyn Bus) -> u32 {
        let size = self.fetch_u16(bus);
        let level = self.fetch_u8(bus) & 0x1F;
        self.push(bus, self.reg.bp);
        let frame = self.reg.sp;
        let mut cycles = 8;
        if level > 0 {
            for _ in 1..level {
                self.reg.bp = self.reg.bp.wrapping_sub(2);
                let outer = self.read_mem::<u16>(bus, self.reg.ss, self.reg.bp);
                self.push(bus, outer);
                cycles += 4;
            }
            self.push(bus, frame);
            cycles += 6;
        }
        self.reg.bp = frame;
        self.reg.sp = self.reg.sp.wrapping_sub(size);
        cycles
    }

    pub(super) fn leave(&mut self, bus: &mut dyn Bus) -> u32 {
        self.reg.sp = self.reg.bp;
        self.reg.bp = self.pop(bus);
        2
    }
}
