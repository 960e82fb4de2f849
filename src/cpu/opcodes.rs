//! The 256-entry primary opcode table.
//!
//! Each entry pairs a mnemonic (used for tracing) with the handler that
//! executes it. Handler families are shared through const generics, so e.g.
//! all eight `INC r16` opcodes map to instantiations of one function.

use super::instructions::{COUNT_CL, COUNT_IMM8, COUNT_ONE};
use super::registers::{CS, DS, ES, SS};
use super::string::StringOp;
use super::Cpu;
use crate::bus::Bus;

pub(crate) type Handler = fn(&mut Cpu, &mut dyn Bus) -> u32;

#[derive(Clone, Copy)]
pub struct Opcode {
    pub mnemonic: &'static str,
    pub(crate) handler: Handler,
}

impl Opcode {
    const INVALID: Opcode = Opcode {
        mnemonic: "(bad)",
        handler: Cpu::invalid,
    };
}

impl std::fmt::Debug for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic)
    }
}

macro_rules! ops {
    ($table:ident; $($code:expr => $mnemonic:literal, $handler:expr;)*) => {
        $(
            $table[$code] = Opcode {
                mnemonic: $mnemonic,
                handler: $handler,
            };
        )*
    };
}

/// The six encodings shared by each of the eight basic ALU operations
macro_rules! alu_row {
    ($table:ident; $base:literal, $op:literal, $mnemonic:literal) => {
        ops! { $table;
            $base => $mnemonic, Cpu::alu_rm_reg::<u8, $op>;
            $base + 1 => $mnemonic, Cpu::alu_rm_reg::<u16, $op>;
            $base + 2 => $mnemonic, Cpu::alu_reg_rm::<u8, $op>;
            $base + 3 => $mnemonic, Cpu::alu_reg_rm::<u16, $op>;
            $base + 4 => $mnemonic, Cpu::alu_acc_imm::<u8, $op>;
            $base + 5 => $mnemonic, Cpu::alu_acc_imm::<u16, $op>;
        }
    };
}

/// Eight consecutive opcodes selecting a register by their low three bits
macro_rules! reg_row {
    ($table:ident; $base:literal, $mnemonic:literal, $handler:ident $(<$width:ty>)?) => {
        ops! { $table;
            $base => $mnemonic, Cpu::$handler::<$($width,)? 0>;
            $base + 1 => $mnemonic, Cpu::$handler::<$($width,)? 1>;
            $base + 2 => $mnemonic, Cpu::$handler::<$($width,)? 2>;
            $base + 3 => $mnemonic, Cpu::$handler::<$($width,)? 3>;
            $base + 4 => $mnemonic, Cpu::$handler::<$($width,)? 4>;
            $base + 5 => $mnemonic, Cpu::$handler::<$($width,)? 5>;
            $base + 6 => $mnemonic, Cpu::$handler::<$($width,)? 6>;
            $base + 7 => $mnemonic, Cpu::$handler::<$($width,)? 7>;
        }
    };
}

/// Builds the dispatch table. Encodings not listed here stay invalid and
/// raise interrupt 6: 0F, 63-67 and F1.
pub fn build_table() -> [Opcode; 256] {
    let mut table = [Opcode::INVALID; 256];

    alu_row!(table; 0x00, 0, "ADD");
    alu_row!(table; 0x08, 1, "OR");
    alu_row!(table; 0x10, 2, "ADC");
    alu_row!(table; 0x18, 3, "SBB");
    alu_row!(table; 0x20, 4, "AND");
    alu_row!(table; 0x28, 5, "SUB");
    alu_row!(table; 0x30, 6, "XOR");
    alu_row!(table; 0x38, 7, "CMP");

    ops! { table;
        0x06 => "PUSH", Cpu::push_segment::<ES>;
        0x07 => "POP", Cpu::pop_segment::<ES>;
        0x0E => "PUSH", Cpu::push_segment::<CS>;
        0x16 => "PUSH", Cpu::push_segment::<SS>;
        0x17 => "POP", Cpu::pop_segment::<SS>;
        0x1E => "PUSH", Cpu::push_segment::<DS>;
        0x1F => "POP", Cpu::pop_segment::<DS>;
        0x27 => "DAA", Cpu::daa;
        0x2F => "DAS", Cpu::das;
        0x37 => "AAA", Cpu::aaa;
        0x3F => "AAS", Cpu::aas;
    }

    reg_row!(table; 0x40, "INC", inc_reg16);
    reg_row!(table; 0x48, "DEC", dec_reg16);
    reg_row!(table; 0x50, "PUSH", push_reg16);
    reg_row!(table; 0x58, "POP", pop_reg16);

    ops! { table;
        0x60 => "PUSHA", Cpu::pusha;
        0x61 => "POPA", Cpu::popa;
        0x62 => "BOUND", Cpu::bound;
        0x68 => "PUSH", Cpu::push_imm::<false>;
        0x69 => "IMUL", Cpu::imul_imm::<false>;
        0x6A => "PUSH", Cpu::push_imm::<true>;
        0x6B => "IMUL", Cpu::imul_imm::<true>;
        0x6C => "INSB", Cpu::string::<u8, { StringOp::INS }>;
        0x6D => "INSW", Cpu::string::<u16, { StringOp::INS }>;
        0x6E => "OUTSB", Cpu::string::<u8, { StringOp::OUTS }>;
        0x6F => "OUTSW", Cpu::string::<u16, { StringOp::OUTS }>;

        0x70 => "JO", Cpu::jcc::<0x0>;
        0x71 => "JNO", Cpu::jcc::<0x1>;
        0x72 => "JB", Cpu::jcc::<0x2>;
        0x73 => "JNB", Cpu::jcc::<0x3>;
        0x74 => "JZ", Cpu::jcc::<0x4>;
        0x75 => "JNZ", Cpu::jcc::<0x5>;
        0x76 => "JBE", Cpu::jcc::<0x6>;
        0x77 => "JA", Cpu::jcc::<0x7>;
        0x78 => "JS", Cpu::jcc::<0x8>;
        0x79 => "JNS", Cpu::jcc::<0x9>;
        0x7A => "JPE", Cpu::jcc::<0xA>;
        0x7B => "JPO", Cpu::jcc::<0xB>;
        0x7C => "JL", Cpu::jcc::<0xC>;
        0x7D => "JGE", Cpu::jcc::<0xD>;
        0x7E => "JLE", Cpu::jcc::<0xE>;
        0x7F => "JG", Cpu::jcc::<0xF>;

        0x80 => "GRP1", Cpu::alu_group::<u8, false>;
        0x81 => "GRP1", Cpu::alu_group::<u16, false>;
        0x82 => "GRP1", Cpu::alu_group::<u8, false>;
        0x83 => "GRP1", Cpu::alu_group::<u16, true>;
        0x84 => "TEST", Cpu::test_rm_reg::<u8>;
        0x85 => "TEST", Cpu::test_rm_reg::<u16>;
        0x86 => "XCHG", Cpu::xchg_rm_reg::<u8>;
        0x87 => "XCHG", Cpu::xchg_rm_reg::<u16>;
        0x88 => "MOV", Cpu::mov_rm_reg::<u8>;
        0x89 => "MOV", Cpu::mov_rm_reg::<u16>;
        0x8A => "MOV", Cpu::mov_reg_rm::<u8>;
        0x8B => "MOV", Cpu::mov_reg_rm::<u16>;
        0x8C => "MOV", Cpu::mov_rm_segment;
        0x8D => "LEA", Cpu::lea;
        0x8E => "MOV", Cpu::mov_segment_rm;
        0x8F => "POP", Cpu::pop_rm;
    }

    reg_row!(table; 0x90, "XCHG", xchg_acc);
    table[0x90].mnemonic = "NOP";

    ops! { table;
        0x98 => "CBW", Cpu::cbw;
        0x99 => "CWD", Cpu::cwd;
        0x9A => "CALLF", Cpu::call_far;
        0x9B => "WAIT", Cpu::wait;
        0x9C => "PUSHF", Cpu::pushf;
        0x9D => "POPF", Cpu::popf;
        0x9E => "SAHF", Cpu::sahf;
        0x9F => "LAHF", Cpu::lahf;

        0xA0 => "MOV", Cpu::mov_acc_moffs::<u8>;
        0xA1 => "MOV", Cpu::mov_acc_moffs::<u16>;
        0xA2 => "MOV", Cpu::mov_moffs_acc::<u8>;
        0xA3 => "MOV", Cpu::mov_moffs_acc::<u16>;
        0xA4 => "MOVSB", Cpu::string::<u8, { StringOp::MOVS }>;
        0xA5 => "MOVSW", Cpu::string::<u16, { StringOp::MOVS }>;
        0xA6 => "CMPSB", Cpu::string::<u8, { StringOp::CMPS }>;
        0xA7 => "CMPSW", Cpu::string::<u16, { StringOp::CMPS }>;
        0xA8 => "TEST", Cpu::test_acc_imm::<u8>;
        0xA9 => "TEST", Cpu::test_acc_imm::<u16>;
        0xAA => "STOSB", Cpu::string::<u8, { StringOp::STOS }>;
        0xAB => "STOSW", Cpu::string::<u16, { StringOp::STOS }>;
        0xAC => "LODSB", Cpu::string::<u8, { StringOp::LODS }>;
        0xAD => "LODSW", Cpu::string::<u16, { StringOp::LODS }>;
        0xAE => "SCASB", Cpu::string::<u8, { StringOp::SCAS }>;
        0xAF => "SCASW", Cpu::string::<u16, { StringOp::SCAS }>;
    }

    reg_row!(table; 0xB0, "MOV", mov_reg_imm<u8>);
    reg_row!(table; 0xB8, "MOV", mov_reg_imm<u16>);

    ops! { table;
        0xC0 => "GRP2", Cpu::shift_group::<u8, COUNT_IMM8>;
        0xC1 => "GRP2", Cpu::shift_group::<u16, COUNT_IMM8>;
        0xC2 => "RET", Cpu::ret_near::<true>;
        0xC3 => "RET", Cpu::ret_near::<false>;
        0xC4 => "LES", Cpu::load_far_pointer::<ES>;
        0xC5 => "LDS", Cpu::load_far_pointer::<DS>;
        0xC6 => "MOV", Cpu::mov_rm_imm::<u8>;
        0xC7 => "MOV", Cpu::mov_rm_imm::<u16>;
        0xC8 => "ENTER", Cpu::enter;
        0xC9 => "LEAVE", Cpu::leave;
        0xCA => "RETF", Cpu::ret_far::<true>;
        0xCB => "RETF", Cpu::ret_far::<false>;
        0xCC => "INT3", Cpu::int3;
        0xCD => "INT", Cpu::int_imm;
        0xCE => "INTO", Cpu::int_overflow;
        0xCF => "IRET", Cpu::iret;

        0xD0 => "GRP2", Cpu::shift_group::<u8, COUNT_ONE>;
        0xD1 => "GRP2", Cpu::shift_group::<u16, COUNT_ONE>;
        0xD2 => "GRP2", Cpu::shift_group::<u8, COUNT_CL>;
        0xD3 => "GRP2", Cpu::shift_group::<u16, COUNT_CL>;
        0xD4 => "AAM", Cpu::aam;
        0xD5 => "AAD", Cpu::aad;
        0xD6 => "SALC", Cpu::salc;
        0xD7 => "XLAT", Cpu::xlat;
        0xD8 => "ESC", Cpu::escape;
        0xD9 => "ESC", Cpu::escape;
        0xDA => "ESC", Cpu::escape;
        0xDB => "ESC", Cpu::escape;
        0xDC => "ESC", Cpu::escape;
        0xDD => "ESC", Cpu::escape;
        0xDE => "ESC", Cpu::escape;
        0xDF => "ESC", Cpu::escape;

        0xE0 => "LOOPNZ", Cpu::loop_cx::<0>;
        0xE1 => "LOOPZ", Cpu::loop_cx::<1>;
        0xE2 => "LOOP", Cpu::loop_cx::<2>;
        0xE3 => "JCXZ", Cpu::jcxz;
        0xE4 => "IN", Cpu::port_in::<u8, false>;
        0xE5 => "IN", Cpu::port_in::<u16, false>;
        0xE6 => "OUT", Cpu::port_out::<u8, false>;
        0xE7 => "OUT", Cpu::port_out::<u16, false>;
        0xE8 => "CALL", Cpu::call_near;
        0xE9 => "JMP", Cpu::jmp_near;
        0xEA => "JMPF", Cpu::jmp_far;
        0xEB => "JMP", Cpu::jmp_short;
        0xEC => "IN", Cpu::port_in::<u8, true>;
        0xED => "IN", Cpu::port_in::<u16, true>;
        0xEE => "OUT", Cpu::port_out::<u8, true>;
        0xEF => "OUT", Cpu::port_out::<u16, true>;

        0xF4 => "HLT", Cpu::hlt;
        0xF5 => "CMC", Cpu::cmc;
        0xF6 => "GRP3", Cpu::group3::<u8>;
        0xF7 => "GRP3", Cpu::group3::<u16>;
        0xF8 => "CLC", Cpu::clc;
        0xF9 => "STC", Cpu::stc;
        0xFA => "CLI", Cpu::cli;
        0xFB => "STI", Cpu::sti;
        0xFC => "CLD", Cpu::cld;
        0xFD => "STD", Cpu::std;
        0xFE => "GRP4", Cpu::group4;
        0xFF => "GRP5", Cpu::group5;
    }

    // Prefixes are consumed by the fetch loop and never dispatched
    for prefix in [0x26, 0x2E, 0x36, 0x3E, 0xF0, 0xF2, 0xF3] {
        table[prefix].mnemonic = "(prefix)";
    }

    table
}
