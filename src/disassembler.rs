use crate::bus::Bus;
use crate::cpu::{Opcode, Registers};
use crate::u20::u20;

use std::fmt::Write;

/// Bounds the scan over a run of prefix bytes
pub(crate) const MAX_INSTRUCTION_LENGTH: usize = 15;

const ALU_GROUP: [&str; 8] = ["ADD", "OR", "ADC", "SBB", "AND", "SUB", "XOR", "CMP"];
const SHIFT_GROUP: [&str; 8] = ["ROL", "ROR", "RCL", "RCR", "SHL", "SHR", "SHL", "SAR"];
const GROUP3: [&str; 8] = ["TEST", "TEST", "NOT", "NEG", "MUL", "IMUL", "DIV", "IDIV"];
const GROUP4: [&str; 8] = ["INC", "DEC", "(bad)", "(bad)", "(bad)", "(bad)", "(bad)", "(bad)"];
const GROUP5: [&str; 8] = ["INC", "DEC", "CALL", "CALLF", "JMP", "JMPF", "PUSH", "(bad)"];

/// One decoded instruction: its raw bytes and its mnemonic
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub bytes: Vec<u8>,
    pub mnemonic: &'static str,
}

impl Instruction {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn is_prefix(byte: u8) -> bool {
    matches!(byte, 0x26 | 0x2E | 0x36 | 0x3E | 0xF0 | 0xF2 | 0xF3)
}

/// Whether an opcode takes a ModRM byte, and the size of its trailing immediate
fn operand_layout(opcode: u8, modrm_reg: u8) -> (bool, usize) {
    match opcode {
        0x00..=0x3F => match opcode & 7 {
            0..=3 => (true, 0),
            4 => (false, 1),
            5 => (false, 2),
            _ => (false, 0),
        },
        0x62 | 0x84..=0x8F | 0xC4 | 0xC5 | 0xD0..=0xD3 | 0xD8..=0xDF | 0xFE | 0xFF => (true, 0),
        0x80 | 0x82 | 0x83 | 0x6B | 0xC0 | 0xC1 | 0xC6 => (true, 1),
        0x81 | 0x69 | 0xC7 => (true, 2),
        0xF6 => (true, if modrm_reg < 2 { 1 } else { 0 }),
        0xF7 => (true, if modrm_reg < 2 { 2 } else { 0 }),
        0x6A | 0x70..=0x7F | 0xA8 | 0xB0..=0xB7 | 0xCD | 0xD4 | 0xD5 | 0xE0..=0xE7 | 0xEB => {
            (false, 1)
        }
        0x68 | 0xA0..=0xA3 | 0xA9 | 0xB8..=0xBF | 0xC2 | 0xCA | 0xE8 | 0xE9 => (false, 2),
        0xC8 => (false, 3),
        0x9A | 0xEA => (false, 4),
        _ => (false, 0),
    }
}

fn displacement_length(modrm: u8) -> usize {
    match (modrm >> 6, modrm & 7) {
        (0, 6) => 2,
        (0, _) | (3, _) => 0,
        (1, _) => 1,
        _ => 2,
    }
}

fn group_mnemonic(opcode: u8, modrm_reg: u8) -> Option<&'static str> {
    let table = match opcode {
        0x80..=0x83 => &ALU_GROUP,
        0xC0 | 0xC1 | 0xD0..=0xD3 => &SHIFT_GROUP,
        0xF6 | 0xF7 => &GROUP3,
        0xFE => &GROUP4,
        0xFF => &GROUP5,
        _ => return None,
    };
    Some(table[modrm_reg as usize & 7])
}

/// Decodes the instruction at `cs:ip` without side effects on the bus
pub fn disassemble(bus: &dyn Bus, opcodes: &[Opcode; 256], cs: u16, ip: u16) -> Instruction {
    let peek = |index: usize| bus.peek_u8(u20::from_segmented(cs, ip.wrapping_add(index as u16)));

    let mut length = 0;
    while length < MAX_INSTRUCTION_LENGTH && is_prefix(peek(length)) {
        length += 1;
    }
    let opcode = peek(length);
    length += 1;

    let modrm = peek(length);
    let modrm_reg = (modrm >> 3) & 7;
    let (has_modrm, immediate) = operand_layout(opcode, modrm_reg);
    if has_modrm {
        length += 1 + displacement_length(modrm);
    }
    length += immediate;

    let group = if has_modrm {
        group_mnemonic(opcode, modrm_reg)
    } else {
        None
    };
    let mnemonic = group.unwrap_or(opcodes[opcode as usize].mnemonic);

    Instruction {
        bytes: (0..length).map(peek).collect(),
        mnemonic,
    }
}

/// Formats one trace line: address, bytes, mnemonic, then the register file
pub fn trace_line(
    bus: &dyn Bus,
    opcodes: &[Opcode; 256],
    cs: u16,
    ip: u16,
    reg: &Registers,
) -> String {
    let instruction = disassemble(bus, opcodes, cs, ip);
    let mut bytes = String::new();
    for byte in &instruction.bytes {
        let _ = write!(bytes, "{byte:02X}");
    }
    format!(
        "{cs:04X}:{ip:04X}  {bytes:<14} {:<6} AX={:04X} BX={:04X} CX={:04X} DX={:04X} \
         SP={:04X} BP={:04X} SI={:04X} DI={:04X} DS={:04X} ES={:04X} SS={:04X} F={:04X}",
        instruction.mnemonic,
        reg.ax(),
        reg.bx(),
        reg.cx(),
        reg.dx(),
        reg.sp,
        reg.bp,
        reg.si,
        reg.di,
        reg.ds,
        reg.es,
        reg.ss,
        reg.psw.raw(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::FlatBus;
    use crate::cpu::opcodes;

    fn decode(code: &[u8]) -> Instruction {
        let mut bus = FlatBus::new();
        bus.load(u20::from_segmented(0x1000, 0x0200), code);
        disassemble(&bus, &opcodes::build_table(), 0x1000, 0x0200)
    }

    #[test]
    fn lengths() {
        assert_eq!(decode(&[0x90]).len(), 1);
        assert_eq!(decode(&[0x04, 0x01]).len(), 2);
        assert_eq!(decode(&[0x81, 0x87, 0x34, 0x12, 0x78, 0x56]).len(), 6);
        assert_eq!(decode(&[0x26, 0xF3, 0xA5]).len(), 3);
        assert_eq!(decode(&[0xEA, 0x00, 0x00, 0x00, 0xF0]).len(), 5);
        assert_eq!(decode(&[0xF6, 0x06, 0x00, 0x01, 0x80]).len(), 5);
        assert_eq!(decode(&[0xF6, 0xE3]).len(), 2);
    }

    #[test]
    fn group_mnemonics_follow_the_reg_field() {
        assert_eq!(decode(&[0x83, 0xF8, 0x01]).mnemonic, "CMP");
        assert_eq!(decode(&[0xD1, 0xE8]).mnemonic, "SHR");
        assert_eq!(decode(&[0xFF, 0xD0]).mnemonic, "CALL");
        assert_eq!(decode(&[0xCD, 0x21]).mnemonic, "INT");
    }

    #[test]
    fn trace_line_layout() {
        let mut bus = FlatBus::new();
        bus.load(u20::from_segmented(0xF000, 0x0010), &[0xB8, 0x34, 0x12]);
        let mut reg = Registers::new();
        reg.set_ax(0x1234);
        let line = trace_line(&bus, &opcodes::build_table(), 0xF000, 0x0010, &reg);
        assert!(line.starts_with("F000:0010  B83412"));
        assert!(line.contains("MOV"));
        assert!(line.contains("AX=1234"));
        assert!(line.ends_with("F=F002"));
    }
}
