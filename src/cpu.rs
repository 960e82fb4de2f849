pub mod alu;
mod control;
mod instructions;
pub mod modrm;
pub mod opcodes;
pub mod registers;
mod string;

pub use modrm::{ModRm, ModRmMode};
pub use opcodes::Opcode;
pub use registers::{Register16, Registers, StatusWord};

use crate::bus::Bus;
use crate::disassembler;
use crate::u20::u20;

use alu::Operand;

/// Cycles charged for delivering any interrupt
pub const INTERRUPT_CYCLES: u32 = 32;
/// Extra cycles charged on top of delivery for an undefined opcode
pub const INVALID_OPCODE_CYCLES: u32 = 8;
const PREFIX_CYCLES: u32 = 1;
const HALTED_CYCLES: u32 = 1;

/// Fixed interrupt vectors raised by the CPU itself
pub mod vector {
    pub const DIVIDE_ERROR: u8 = 0;
    pub const SINGLE_STEP: u8 = 1;
    pub const BREAKPOINT: u8 = 3;
    pub const OVERFLOW: u8 = 4;
    pub const BOUND: u8 = 5;
    pub const INVALID_OPCODE: u8 = 6;
}

/// Receives one formatted line per executed instruction
pub trait TraceSink {
    fn trace(&mut self, line: &str);
}

impl<F: FnMut(&str)> TraceSink for F {
    fn trace(&mut self, line: &str) {
        self(line)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatCondition {
    /// REP/REPE (F3h): compare and scan continue while Z is set
    WhileEqual,
    /// REPNE (F2h): compare and scan continue while Z is clear
    WhileNotEqual,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrefixState {
    /// Segment register index replacing an instruction's default data segment
    pub segment: Option<u8>,
    pub repeat: Option<RepeatCondition>,
}

/// The V30MZ, an 80186-compatible core with NEC timings and quirks
pub struct Cpu {
    reg: Registers,
    halted: bool,
    prefix: PrefixState,
    modrm: Option<ModRm>,
    // Carry/overflow of the most recent multiply, echoed by the next divide
    mul_overflow: bool,
    opcodes: [Opcode; 256],
    trace: Option<Box<dyn TraceSink>>,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            reg: Registers::new(),
            halted: false,
            prefix: PrefixState::default(),
            modrm: None,
            mul_overflow: false,
            opcodes: opcodes::build_table(),
            trace: None,
        }
    }

    pub fn reset(&mut self) {
        self.reg.reset();
        self.halted = false;
        self.mul_overflow = false;
        self.end_instruction();
    }

    pub fn registers(&self) -> &Registers {
        &self.reg
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.reg
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn prefix(&self) -> PrefixState {
        self.prefix
    }

    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace = sink;
    }

    /// Executes one instruction (or one halted tick) and returns the cycles it took
    pub fn step(&mut self, bus: &mut dyn Bus) -> u32 {
        if self.halted {
            return HALTED_CYCLES;
        }
        let (start_cs, start_ip) = (self.reg.cs, self.reg.ip);
        let trap = self.reg.psw.trap();

        let mut cycles = 0;
        let mut prefixes = 0;
        let opcode = loop {
            let byte = self.fetch_u8(bus);
            match byte {
                0x26 | 0x2E | 0x36 | 0x3E => self.prefix.segment = Some((byte >> 3) & 3),
                // LOCK has no effect on a single-processor bus
                0xF0 => {}
                0xF2 => self.prefix.repeat = Some(RepeatCondition::WhileNotEqual),
                0xF3 => self.prefix.repeat = Some(RepeatCondition::WhileEqual),
                _ => break byte,
            }
            cycles += PREFIX_CYCLES;
            prefixes += 1;
            // An endless prefix run yields between steps; the prefixes stay pending
            if prefixes == disassembler::MAX_INSTRUCTION_LENGTH {
                return cycles;
            }
        };

        let handler = self.opcodes[opcode as usize].handler;
        cycles += match handler(self, bus) {
            0 => {
                log::warn!("Invalid opcode {opcode:#04X} at {start_cs:04X}:{start_ip:04X}");
                INVALID_OPCODE_CYCLES + self.raise(bus, vector::INVALID_OPCODE)
            }
            elapsed => elapsed,
        };
        self.end_instruction();

        if let Some(sink) = self.trace.as_mut() {
            let line =
                disassembler::trace_line(&*bus, &self.opcodes, start_cs, start_ip, &self.reg);
            sink.trace(&line);
        }

        if trap && self.reg.psw.trap() {
            cycles += self.raise(bus, vector::SINGLE_STEP);
        }
        cycles
    }

    /// Delivers an interrupt unconditionally and returns the cycles it took
    pub fn raise(&mut self, bus: &mut dyn Bus, vector: u8) -> u32 {
        self.halted = false;
        self.push(bus, self.reg.psw.raw());
        self.push(bus, self.reg.cs);
        self.push(bus, self.reg.ip);
        self.reg.psw.set_interrupt_enable(false);
        self.reg.psw.set_trap(false);
        let entry = vector as u16 * 4;
        self.reg.ip = self.read_mem::<u16>(bus, 0x0000, entry);
        self.reg.cs = self.read_mem::<u16>(bus, 0x0000, entry + 2);
        self.end_instruction();
        INTERRUPT_CYCLES
    }

    /// Delivers a maskable interrupt if the interrupt-enable flag allows it
    pub fn request_interrupt(&mut self, bus: &mut dyn Bus, vector: u8) -> Option<u32> {
        self.reg
            .psw
            .interrupt_enable()
            .then(|| self.raise(bus, vector))
    }

    fn end_instruction(&mut self) {
        self.prefix = PrefixState::default();
        self.modrm = None;
    }

    fn fetch_u8(&mut self, bus: &mut dyn Bus) -> u8 {
        let data = bus.read_u8(u20::from_segmented(self.reg.cs, self.reg.ip));
        self.reg.ip = self.reg.ip.wrapping_add(1);
        data
    }

    fn fetch_u16(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.fetch_u8(bus) as u16;
        let hi = self.fetch_u8(bus) as u16;
        (hi << 8) | lo
    }

    fn fetch_imm<T: Access>(&mut self, bus: &mut dyn Bus) -> T {
        let data = T::read(bus, self.reg.cs, self.reg.ip);
        self.reg.ip = self.reg.ip.wrapping_add((T::BITS / 8) as u16);
        data
    }

    /// An 8-bit immediate sign-extended to the operand width
    fn fetch_simm8<T: Access>(&mut self, bus: &mut dyn Bus) -> T {
        T::truncate(self.fetch_u8(bus) as i8 as i32 as u32)
    }

    fn read_mem<T: Access>(&self, bus: &mut dyn Bus, segment: u16, offset: u16) -> T {
        T::read(bus, segment, offset)
    }

    fn write_mem<T: Access>(&self, bus: &mut dyn Bus, segment: u16, offset: u16, data: T) {
        T::write(bus, segment, offset, data)
    }

    /// The value of the override segment if one was given, else of `default`
    fn segment_or(&self, default: u8) -> u16 {
        self.reg.segment(self.prefix.segment.unwrap_or(default))
    }

    fn push(&mut self, bus: &mut dyn Bus, data: u16) {
        self.reg.sp = self.reg.sp.wrapping_sub(2);
        self.write_mem(bus, self.reg.ss, self.reg.sp, data);
    }

    fn pop(&mut self, bus: &mut dyn Bus) -> u16 {
        let data = self.read_mem(bus, self.reg.ss, self.reg.sp);
        self.reg.sp = self.reg.sp.wrapping_add(2);
        data
    }

    fn read_rm<T: Access>(&mut self, bus: &mut dyn Bus) -> T {
        let modrm = self.modrm(bus);
        if modrm.is_register() {
            T::get_reg(&self.reg, modrm.rm)
        } else {
            self.read_mem(bus, modrm.segment, modrm.offset)
        }
    }

    fn write_rm<T: Access>(&mut self, bus: &mut dyn Bus, data: T) {
        let modrm = self.modrm(bus);
        if modrm.is_register() {
            T::set_reg(&mut self.reg, modrm.rm, data);
        } else {
            self.write_mem(bus, modrm.segment, modrm.offset, data);
        }
    }

    /// Cycle cost depending on whether this instruction's operand is a register or memory
    fn modrm_cycles(&self, register: u32, memory: u32) -> u32 {
        match self.modrm {
            Some(modrm) if !modrm.is_register() => memory,
            _ => register,
        }
    }

    fn invalid(&mut self, _bus: &mut dyn Bus) -> u32 {
        0
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Register, memory and port access at a given operand width
pub(crate) trait Access: Operand {
    fn get_reg(reg: &Registers, index: u8) -> Self;
    fn set_reg(reg: &mut Registers, index: u8, data: Self);
    fn read(bus: &mut dyn Bus, segment: u16, offset: u16) -> Self;
    fn write(bus: &mut dyn Bus, segment: u16, offset: u16, data: Self);
    fn read_port(bus: &mut dyn Bus, port: u16) -> Self;
    fn write_port(bus: &mut dyn Bus, port: u16, data: Self);
    /// The double-width accumulator: AX for bytes, DX:AX for words
    fn wide_accumulator(reg: &Registers) -> u32;
    fn set_wide_accumulator(reg: &mut Registers, data: u32);
    fn set_division(reg: &mut Registers, quotient: Self, remainder: Self);
}

impl Access for u8 {
    fn get_reg(reg: &Registers, index: u8) -> Self {
        reg.reg8(index)
    }

    fn set_reg(reg: &mut Registers, index: u8, data: Self) {
        reg.set_reg8(index, data)
    }

    fn read(bus: &mut dyn Bus, segment: u16, offset: u16) -> Self {
        bus.read_u8(u20::from_segmented(segment, offset))
    }

    fn write(bus: &mut dyn Bus, segment: u16, offset: u16, data: Self) {
        bus.write_u8(u20::from_segmented(segment, offset), data)
    }

    fn read_port(bus: &mut dyn Bus, port: u16) -> Self {
        bus.read_port(port)
    }

    fn write_port(bus: &mut dyn Bus, port: u16, data: Self) {
        bus.write_port(port, data)
    }

    fn wide_accumulator(reg: &Registers) -> u32 {
        reg.ax() as u32
    }

    fn set_wide_accumulator(reg: &mut Registers, data: u32) {
        reg.set_ax(data as u16)
    }

    fn set_division(reg: &mut Registers, quotient: Self, remainder: Self) {
        reg.set_al(quotient);
        reg.set_ah(remainder);
    }
}

impl Access for u16 {
    fn get_reg(reg: &Registers, index: u8) -> Self {
        reg.reg16(index)
    }

    fn set_reg(reg: &mut Registers, index: u8, data: Self) {
        reg.set_reg16(index, data)
    }

    // Word accesses wrap within the segment
    fn read(bus: &mut dyn Bus, segment: u16, offset: u16) -> Self {
        let lo = u8::read(bus, segment, offset) as u16;
        let hi = u8::read(bus, segment, offset.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn write(bus: &mut dyn Bus, segment: u16, offset: u16, data: Self) {
        u8::write(bus, segment, offset, data as u8);
        u8::write(bus, segment, offset.wrapping_add(1), (data >> 8) as u8);
    }

    fn read_port(bus: &mut dyn Bus, port: u16) -> Self {
        let lo = bus.read_port(port) as u16;
        let hi = bus.read_port(port.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn write_port(bus: &mut dyn Bus, port: u16, data: Self) {
        bus.write_port(port, data as u8);
        bus.write_port(port.wrapping_add(1), (data >> 8) as u8);
    }

    fn wide_accumulator(reg: &Registers) -> u32 {
        ((reg.dx() as u32) << 16) | reg.ax() as u32
    }

    fn set_wide_accumulator(reg: &mut Registers, data: u32) {
        reg.set_ax(data as u16);
        reg.set_dx((data >> 16) as u16);
    }

    fn set_division(reg: &mut Registers, quotient: Self, remainder: Self) {
        reg.set_ax(quotient);
        reg.set_dx(remainder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::FlatBus;

    fn cpu_at(bus: &mut FlatBus, code: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.reg.cs = 0x1000;
        cpu.reg.ip = 0x0100;
        cpu.reg.ss = 0x2000;
        cpu.reg.sp = 0x0100;
        bus.load(u20::from_segmented(0x1000, 0x0100), code);
        cpu
    }

    #[test]
    fn nop_costs_three_cycles() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_at(&mut bus, &[0x90]);
        let psw = cpu.reg.psw;
        assert_eq!(cpu.step(&mut bus), 3);
        assert_eq!(cpu.reg.ip, 0x0101);
        assert_eq!(cpu.reg.psw, psw);
    }

    #[test]
    fn push_pop_round_trip() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_at(&mut bus, &[]);
        for value in [0x0000u16, 0x0001, 0x7FFF, 0x8000, 0xBEEF, 0xFFFF] {
            let sp = cpu.reg.sp;
            cpu.push(&mut bus, value);
            assert_eq!(cpu.reg.sp, sp.wrapping_sub(2));
            assert_eq!(cpu.pop(&mut bus), value);
            assert_eq!(cpu.reg.sp, sp);
        }
    }

    #[test]
    fn raise_pushes_flags_cs_ip() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_at(&mut bus, &[]);
        bus.load(u20(20), &[0x34, 0x12, 0x78, 0x56]);
        cpu.reg.psw.set_interrupt_enable(true);
        cpu.reg.psw.set_trap(true);
        let flags = cpu.reg.psw.raw();
        assert_eq!(cpu.raise(&mut bus, vector::BOUND), INTERRUPT_CYCLES);
        assert!(!cpu.reg.psw.interrupt_enable());
        assert!(!cpu.reg.psw.trap());
        assert_eq!((cpu.reg.cs, cpu.reg.ip), (0x5678, 0x1234));
        assert_eq!(cpu.reg.sp, 0x00FA);
        assert_eq!(cpu.read_mem::<u16>(&mut bus, 0x2000, 0x00FE), flags);
        assert_eq!(cpu.read_mem::<u16>(&mut bus, 0x2000, 0x00FC), 0x1000);
        assert_eq!(cpu.read_mem::<u16>(&mut bus, 0x2000, 0x00FA), 0x0100);
    }

    #[test]
    fn halted_cpu_ticks_one_cycle_until_interrupted() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_at(&mut bus, &[0xF4, 0x90]);
        cpu.step(&mut bus);
        assert!(cpu.is_halted());
        let ip = cpu.reg.ip;
        for _ in 0..4 {
            assert_eq!(cpu.step(&mut bus), 1);
        }
        assert_eq!(cpu.reg.ip, ip);
        assert_eq!(cpu.request_interrupt(&mut bus, 0x10), None);
        assert!(cpu.is_halted());
        cpu.reg.psw.set_interrupt_enable(true);
        assert_eq!(cpu.request_interrupt(&mut bus, 0x10), Some(INTERRUPT_CYCLES));
        assert!(!cpu.is_halted());
    }

    #[test]
    fn invalid_opcode_raises_vector_6() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_at(&mut bus, &[0x0F]);
        bus.load(u20(6 * 4), &[0x00, 0x02, 0x00, 0x30]);
        assert_eq!(cpu.step(&mut bus), INVALID_OPCODE_CYCLES + INTERRUPT_CYCLES);
        assert_eq!((cpu.reg.cs, cpu.reg.ip), (0x3000, 0x0200));
    }

    #[test]
    fn prefixes_are_cleared_after_each_instruction() {
        let mut bus = FlatBus::new();
        // ES: REP NOP, then a plain NOP
        let mut cpu = cpu_at(&mut bus, &[0x26, 0xF3, 0x90, 0x90]);
        assert_eq!(cpu.step(&mut bus), 5);
        assert_eq!(cpu.prefix(), PrefixState::default());
        assert_eq!(cpu.step(&mut bus), 3);
    }

    #[test]
    fn long_prefix_runs_end_the_step() {
        let mut bus = FlatBus::new();
        let mut code = [0x26; 21];
        code[20] = 0x90;
        let mut cpu = cpu_at(&mut bus, &code);
        assert_eq!(cpu.step(&mut bus), 15);
        assert_eq!(cpu.reg.ip, 0x010F);
        assert_eq!(cpu.prefix().segment, Some(0));
        assert_eq!(cpu.step(&mut bus), 5 + 3);
        assert_eq!(cpu.reg.ip, 0x0115);
        assert_eq!(cpu.prefix(), PrefixState::default());
    }

    #[test]
    fn trap_flag_single_steps() {
        let mut bus = FlatBus::new();
        let mut cpu = cpu_at(&mut bus, &[0x90]);
        bus.load(u20(4), &[0x00, 0x05, 0x00, 0x06]);
        cpu.reg.psw.set_trap(true);
        assert_eq!(cpu.step(&mut bus), 3 + INTERRUPT_CYCLES);
        assert_eq!((cpu.reg.cs, cpu.reg.ip), (0x0600, 0x0500));
        assert!(!cpu.reg.psw.trap());
    }

    #[test]
    fn trace_sink_receives_one_line_per_instruction() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut bus = FlatBus::new();
        let mut cpu = cpu_at(&mut bus, &[0x90, 0x40]);
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink_lines = lines.clone();
        cpu.set_trace_sink(Some(Box::new(move |line: &str| {
            sink_lines.borrow_mut().push(line.to_owned())
        })));
        let cycles = cpu.step(&mut bus) + cpu.step(&mut bus);
        assert_eq!(cycles, 4);
        let lines = lines.borrow();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1000:0100"));
        assert!(lines[0].contains("NOP"));
        assert!(lines[1].contains("INC"));
    }
}
