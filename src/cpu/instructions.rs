//! Data movement, arithmetic and the ModRM "group" opcodes.
//!
//! Handlers return the cycles they consumed, or 0 for an encoding the
//! V30MZ does not define.

use super::alu::{self, AluOp, Division, ShiftOp};
use super::registers::DS;
use super::{vector, Access, Cpu};
use crate::bus::Bus;

use paste::paste;

/// Single-flag instructions: each costs 4 cycles
macro_rules! flag_instrs {
    ($($name:ident => $flag:ident($value:expr)),* $(,)?) => {
        paste! {
            $(
                pub(super) fn $name(&mut self, _bus: &mut dyn Bus) -> u32 {
                    let value = ($value)(self.reg.psw.$flag());
                    self.reg.psw.[<set_ $flag>](value);
                    4
                }
            )*
        }
    };
}

// Where a shift group takes its count from
pub(super) const COUNT_ONE: u8 = 0;
pub(super) const COUNT_CL: u8 = 1;
pub(super) const COUNT_IMM8: u8 = 2;

impl Cpu {
    /// `op r/m, reg`
    pub(super) fn alu_rm_reg<T: Access, const OP: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let a = self.read_rm::<T>(bus);
        let b = T::get_reg(&self.reg, modrm.reg);
        let op = AluOp::from_index(OP);
        if let Some(result) = op.apply(&mut self.reg.psw, a, b) {
            self.write_rm(bus, result);
            self.modrm_cycles(1, 3)
        } else {
            self.modrm_cycles(1, 2)
        }
    }

    /// `op reg, r/m`
    pub(super) fn alu_reg_rm<T: Access, const OP: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let a = T::get_reg(&self.reg, modrm.reg);
        let b = self.read_rm::<T>(bus);
        if let Some(result) = AluOp::from_index(OP).apply(&mut self.reg.psw, a, b) {
            T::set_reg(&mut self.reg, modrm.reg, result);
        }
        self.modrm_cycles(1, 2)
    }

    /// `op AL/AX, imm`
    pub(super) fn alu_acc_imm<T: Access, const OP: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let a = T::get_reg(&self.reg, 0);
        let b = self.fetch_imm::<T>(bus);
        if let Some(result) = AluOp::from_index(OP).apply(&mut self.reg.psw, a, b) {
            T::set_reg(&mut self.reg, 0, result);
        }
        1
    }

    /// 80-83: `op r/m, imm` with the operation in the reg field
    pub(super) fn alu_group<T: Access, const SIGN_EXTEND: bool>(
        &mut self,
        bus: &mut dyn Bus,
    ) -> u32 {
        let modrm = self.modrm(bus);
        let a = self.read_rm::<T>(bus);
        let b = if SIGN_EXTEND {
            self.fetch_simm8::<T>(bus)
        } else {
            self.fetch_imm::<T>(bus)
        };
        match AluOp::from_index(modrm.reg).apply(&mut self.reg.psw, a, b) {
            Some(result) => {
                self.write_rm(bus, result);
                self.modrm_cycles(1, 3)
            }
            None => self.modrm_cycles(1, 2),
        }
    }

    pub(super) fn test_rm_reg<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let a = self.read_rm::<T>(bus);
        let b = T::get_reg(&self.reg, modrm.reg);
        alu::and(&mut self.reg.psw, a, b);
        self.modrm_cycles(1, 2)
    }

    pub(super) fn test_acc_imm<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let a = T::get_reg(&self.reg, 0);
        let b = self.fetch_imm::<T>(bus);
        alu::and(&mut self.reg.psw, a, b);
        1
    }

    pub(super) fn inc_reg16<const R: u8>(&mut self, _bus: &mut dyn Bus) -> u32 {
        let data = self.reg.reg16(R);
        let result = alu::inc(&mut self.reg.psw, data);
        self.reg.set_reg16(R, result);
        1
    }

    pub(super) fn dec_reg16<const R: u8>(&mut self, _bus: &mut dyn Bus) -> u32 {
        let data = self.reg.reg16(R);
        let result = alu::dec(&mut self.reg.psw, data);
        self.reg.set_reg16(R, result);
        1
    }

    /// Pushing SP stores the value it had before the push
    pub(super) fn push_reg16<const R: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = self.reg.reg16(R);
        self.push(bus, data);
        1
    }

    pub(super) fn pop_reg16<const R: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = self.pop(bus);
        self.reg.set_reg16(R, data);
        1
    }

    pub(super) fn push_segment<const S: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = self.reg.segment(S);
        self.push(bus, data);
        2
    }

    pub(super) fn pop_segment<const S: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = self.pop(bus);
        self.reg.set_segment(S, data);
        3
    }

    pub(super) fn pusha(&mut self, bus: &mut dyn Bus) -> u32 {
        let sp = self.reg.sp;
        for index in 0..8 {
            let data = if index == 4 { sp } else { self.reg.reg16(index) };
            self.push(bus, data);
        }
        9
    }

    /// The stored SP is popped and discarded
    pub(super) fn popa(&mut self, bus: &mut dyn Bus) -> u32 {
        for index in (0..8).rev() {
            let data = self.pop(bus);
            if index != 4 {
                self.reg.set_reg16(index, data);
            }
        }
        8
    }

    pub(super) fn push_imm<const SIGN_EXTEND: bool>(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = if SIGN_EXTEND {
            self.fetch_simm8::<u16>(bus)
        } else {
            self.fetch_imm::<u16>(bus)
        };
        self.push(bus, data);
        1
    }

    pub(super) fn bound(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        if modrm.is_register() {
            return 0;
        }
        let index = self.reg.reg16(modrm.reg) as i16;
        let lower = self.read_mem::<u16>(bus, modrm.segment, modrm.offset) as i16;
        let upper = self.read_mem::<u16>(bus, modrm.segment, modrm.offset.wrapping_add(2)) as i16;
        if index < lower || index > upper {
            12 + self.raise(bus, vector::BOUND)
        } else {
            12
        }
    }

    /// `IMUL reg, r/m, imm`
    pub(super) fn imul_imm<const SIGN_EXTEND: bool>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let a = self.read_rm::<u16>(bus);
        let b = if SIGN_EXTEND {
            self.fetch_simm8::<u16>(bus)
        } else {
            self.fetch_imm::<u16>(bus)
        };
        let (product, overflow) = alu::imul(&mut self.reg.psw, a, b);
        self.mul_overflow = overflow;
        self.reg.set_reg16(modrm.reg, product as u16);
        self.modrm_cycles(3, 4)
    }

    pub(super) fn xchg_rm_reg<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let a = self.read_rm::<T>(bus);
        let b = T::get_reg(&self.reg, modrm.reg);
        self.write_rm(bus, b);
        T::set_reg(&mut self.reg, modrm.reg, a);
        self.modrm_cycles(3, 5)
    }

    /// 90-97; `XCHG AX, AX` is NOP
    pub(super) fn xchg_acc<const R: u8>(&mut self, _bus: &mut dyn Bus) -> u32 {
        let other = self.reg.reg16(R);
        let ax = self.reg.ax();
        self.reg.set_reg16(R, ax);
        self.reg.set_ax(other);
        3
    }

    pub(super) fn mov_rm_reg<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let data = T::get_reg(&self.reg, modrm.reg);
        self.write_rm(bus, data);
        1
    }

    pub(super) fn mov_reg_rm<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let data = self.read_rm::<T>(bus);
        T::set_reg(&mut self.reg, modrm.reg, data);
        1
    }

    pub(super) fn mov_rm_segment(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let data = self.reg.segment(modrm.reg);
        self.write_rm(bus, data);
        1
    }

    pub(super) fn mov_segment_rm(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let data = self.read_rm::<u16>(bus);
        self.reg.set_segment(modrm.reg, data);
        self.modrm_cycles(2, 3)
    }

    pub(super) fn mov_rm_imm<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        self.modrm(bus);
        let data = self.fetch_imm::<T>(bus);
        self.write_rm(bus, data);
        1
    }

    pub(super) fn mov_reg_imm<T: Access, const R: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = self.fetch_imm::<T>(bus);
        T::set_reg(&mut self.reg, R, data);
        1
    }

    /// A0/A1: `MOV AL/AX, [moffs]`
    pub(super) fn mov_acc_moffs<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let offset = self.fetch_u16(bus);
        let data = self.read_mem::<T>(bus, self.segment_or(DS), offset);
        T::set_reg(&mut self.reg, 0, data);
        1
    }

    /// A2/A3: `MOV [moffs], AL/AX`
    pub(super) fn mov_moffs_acc<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let offset = self.fetch_u16(bus);
        let data = T::get_reg(&self.reg, 0);
        self.write_mem(bus, self.segment_or(DS), offset, data);
        1
    }

    pub(super) fn lea(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        if modrm.is_register() {
            return 0;
        }
        self.reg.set_reg16(modrm.reg, modrm.offset);
        1
    }

    /// LES/LDS: load a far pointer into a register and a segment
    pub(super) fn load_far_pointer<const S: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        if modrm.is_register() {
            return 0;
        }
        let offset = self.read_mem::<u16>(bus, modrm.segment, modrm.offset);
        let segment = self.read_mem::<u16>(bus, modrm.segment, modrm.offset.wrapping_add(2));
        self.reg.set_reg16(modrm.reg, offset);
        self.reg.set_segment(S, segment);
        6
    }

    /// POP r/m16; the pop happens before the destination is written
    pub(super) fn pop_rm(&mut self, bus: &mut dyn Bus) -> u32 {
        self.modrm(bus);
        let data = self.pop(bus);
        self.write_rm(bus, data);
        self.modrm_cycles(1, 3)
    }

    pub(super) fn cbw(&mut self, _bus: &mut dyn Bus) -> u32 {
        let ax = self.reg.al() as i8 as u16;
        self.reg.set_ax(ax);
        1
    }

    pub(super) fn cwd(&mut self, _bus: &mut dyn Bus) -> u32 {
        let dx = if self.reg.ax() & 0x8000 != 0 { 0xFFFF } else { 0 };
        self.reg.set_dx(dx);
        1
    }

    pub(super) fn wait(&mut self, _bus: &mut dyn Bus) -> u32 {
        1
    }

    pub(super) fn pushf(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = self.reg.psw.raw();
        self.push(bus, data);
        2
    }

    pub(super) fn popf(&mut self, bus: &mut dyn Bus) -> u32 {
        let data = self.pop(bus);
        self.reg.psw.set_raw(data);
        3
    }

    pub(super) fn sahf(&mut self, _bus: &mut dyn Bus) -> u32 {
        let ah = self.reg.ah();
        self.reg.psw.set_lo_byte(ah);
        4
    }

    pub(super) fn lahf(&mut self, _bus: &mut dyn Bus) -> u32 {
        let flags = self.reg.psw.lo_byte();
        self.reg.set_ah(flags);
        2
    }

    /// C0-C1, D0-D3: rotate/shift group
    pub(super) fn shift_group<T: Access, const COUNT: u8>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let data = self.read_rm::<T>(bus);
        let count = match COUNT {
            COUNT_ONE => 1,
            COUNT_CL => self.reg.cl(),
            _ => self.fetch_u8(bus),
        };
        let result = ShiftOp::from_index(modrm.reg).apply(&mut self.reg.psw, data, count);
        self.write_rm(bus, result);
        match COUNT {
            COUNT_ONE => self.modrm_cycles(1, 3),
            _ => self.modrm_cycles(3, 5),
        }
    }

    /// F6/F7: TEST/NOT/NEG/MUL/IMUL/DIV/IDIV
    pub(super) fn group3<T: Access>(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let operand = self.read_rm::<T>(bus);
        let word = T::BITS == 16;
        match modrm.reg {
            0 | 1 => {
                let imm = self.fetch_imm::<T>(bus);
                alu::and(&mut self.reg.psw, operand, imm);
                self.modrm_cycles(1, 2)
            }
            2 => {
                let value: u32 = operand.into();
                self.write_rm(bus, T::truncate(!value));
                self.modrm_cycles(1, 3)
            }
            3 => {
                let result = alu::neg(&mut self.reg.psw, operand);
                self.write_rm(bus, result);
                self.modrm_cycles(1, 3)
            }
            4 | 5 => {
                let acc = T::get_reg(&self.reg, 0);
                let (product, overflow) = if modrm.reg == 4 {
                    alu::mul(&mut self.reg.psw, acc, operand)
                } else {
                    alu::imul(&mut self.reg.psw, acc, operand)
                };
                self.mul_overflow = overflow;
                T::set_wide_accumulator(&mut self.reg, product);
                self.modrm_cycles(3, 4)
            }
            6 | 7 => {
                let dividend = T::wide_accumulator(&self.reg);
                let division = if modrm.reg == 6 {
                    alu::div(dividend, operand)
                } else {
                    alu::idiv(dividend, operand)
                };
                let cycles = match (word, modrm.reg) {
                    (false, 6) => self.modrm_cycles(15, 16),
                    (false, _) => self.modrm_cycles(17, 18),
                    (true, 6) => self.modrm_cycles(23, 24),
                    (true, _) => self.modrm_cycles(24, 25),
                };
                self.finish_division(bus, division) + cycles
            }
            _ => unreachable!(),
        }
    }

    /// Stores a quotient and remainder, or raises the divide error.
    /// Returns any extra cycles spent delivering the fault.
    fn finish_division<T: Access>(&mut self, bus: &mut dyn Bus, division: Division<T>) -> u32 {
        match division {
            Division::Quotient {
                quotient,
                remainder,
            } => {
                T::set_division(&mut self.reg, quotient, remainder);
                self.reg.psw.set_carry(self.mul_overflow);
                self.reg.psw.set_overflow(self.mul_overflow);
                0
            }
            Division::MinimumByZero {
                quotient,
                remainder,
            } => {
                T::set_division(&mut self.reg, quotient, remainder);
                self.reg.psw.set_zero(true);
                0
            }
            Division::Fault => self.raise(bus, vector::DIVIDE_ERROR),
        }
    }

    /// FE: INC/DEC r/m8
    pub(super) fn group4(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        let result = match modrm.reg {
            0 => {
                let data = self.read_rm::<u8>(bus);
                alu::inc(&mut self.reg.psw, data)
            }
            1 => {
                let data = self.read_rm::<u8>(bus);
                alu::dec(&mut self.reg.psw, data)
            }
            _ => return 0,
        };
        self.write_rm(bus, result);
        self.modrm_cycles(1, 3)
    }

    /// FF: INC/DEC/CALL/CALLF/JMP/JMPF/PUSH r/m16
    pub(super) fn group5(&mut self, bus: &mut dyn Bus) -> u32 {
        let modrm = self.modrm(bus);
        match modrm.reg {
            0 | 1 => {
                let data = self.read_rm::<u16>(bus);
                let result = if modrm.reg == 0 {
                    alu::inc(&mut self.reg.psw, data)
                } else {
                    alu::dec(&mut self.reg.psw, data)
                };
                self.write_rm(bus, result);
                self.modrm_cycles(1, 3)
            }
            2 => {
                let target = self.read_rm::<u16>(bus);
                self.push(bus, self.reg.ip);
                self.reg.ip = target;
                self.modrm_cycles(5, 6)
            }
            4 => {
                self.reg.ip = self.read_rm::<u16>(bus);
                self.modrm_cycles(4, 5)
            }
            3 | 5 if modrm.is_register() => 0,
            3 | 5 => {
                let offset = self.read_mem::<u16>(bus, modrm.segment, modrm.offset);
                let segment =
                    self.read_mem::<u16>(bus, modrm.segment, modrm.offset.wrapping_add(2));
                if modrm.reg == 3 {
                    self.push(bus, self.reg.cs);
                    self.push(bus, self.reg.ip);
                }
                self.reg.cs = segment;
                self.reg.ip = offset;
                if modrm.reg == 3 {
                    12
                } else {
                    9
                }
            }
            6 => {
                let data = self.read_rm::<u16>(bus);
                self.push(bus, data);
                self.modrm_cycles(1, 2)
            }
            _ => 0,
        }
    }

    pub(super) fn daa(&mut self, _bus: &mut dyn Bus) -> u32 {
        let data = self.reg.al();
        let al = alu::daa(&mut self.reg.psw, data);
        self.reg.set_al(al);
        10
    }

    pub(super) fn das(&mut self, _bus: &mut dyn Bus) -> u32 {
        let data = self.reg.al();
        let al = alu::das(&mut self.reg.psw, data);
        self.reg.set_al(al);
        10
    }

    pub(super) fn aaa(&mut self, _bus: &mut dyn Bus) -> u32 {
        let data = self.reg.ax();
        let ax = alu::aaa(&mut self.reg.psw, data);
        self.reg.set_ax(ax);
        9
    }

    pub(super) fn aas(&mut self, _bus: &mut dyn Bus) -> u32 {
        let data = self.reg.ax();
        let ax = alu::aas(&mut self.reg.psw, data);
        self.reg.set_ax(ax);
        9
    }

    /// The immediate byte is fetched but the V30MZ always divides by 10
    pub(super) fn aam(&mut self, bus: &mut dyn Bus) -> u32 {
        self.fetch_u8(bus);
        let data = self.reg.al();
        let ax = alu::aam(&mut self.reg.psw, data);
        self.reg.set_ax(ax);
        16
    }

    pub(super) fn aad(&mut self, bus: &mut dyn Bus) -> u32 {
        self.fetch_u8(bus);
        let data = self.reg.ax();
        let ax = alu::aad(&mut self.reg.psw, data);
        self.reg.set_ax(ax);
        6
    }

    /// D6: AL = carry ? FF : 00
    pub(super) fn salc(&mut self, _bus: &mut dyn Bus) -> u32 {
        let al = if self.reg.psw.carry() { 0xFF } else { 0x00 };
        self.reg.set_al(al);
        8
    }

    pub(super) fn xlat(&mut self, bus: &mut dyn Bus) -> u32 {
        let offset = self.reg.bx().wrapping_add(self.reg.al() as u16);
        let data = self.read_mem::<u8>(bus, self.segment_or(DS), offset);
        self.reg.set_al(data);
        5
    }

    /// D8-DF: coprocessor escapes decode their operand and do nothing
    pub(super) fn escape(&mut self, bus: &mut dyn Bus) -> u32 {
        self.modrm(bus);
        1
    }

    pub(super) fn port_in<T: Access, const FROM_DX: bool>(&mut self, bus: &mut dyn Bus) -> u32 {
        let port = if FROM_DX {
            self.reg.dx()
        } else {
            self.fetch_u8(bus) as u16
        };
        let data = T::read_port(bus, port);
        T::set_reg(&mut self.reg, 0, data);
        6
    }

    pub(super) fn port_out<T: Access, const TO_DX: bool>(&mut self, bus: &mut dyn Bus) -> u32 {
        let port = if TO_DX {
            self.reg.dx()
        } else {
            self.fetch_u8(bus) as u16
        };
        T::write_port(bus, port, T::get_reg(&self.reg, 0));
        6
    }

    pub(super) fn hlt(&mut self, _bus: &mut dyn Bus) -> u32 {
        self.halted = true;
        9
    }

    flag_instrs! {
        cmc => carry(|carry: bool| !carry),
        clc => carry(|_| false),
        stc => carry(|_| true),
        cli => interrupt_enable(|_| false),
        sti => interrupt_enable(|_| true),
        cld => direction(|_| false),
        std => direction(|_| true),
    }
}
