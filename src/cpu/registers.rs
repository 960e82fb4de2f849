use bitfield::bitfield;
use paste::paste;

// Segment register encodings, as used by ModRM reg fields and prefixes
pub const ES: u8 = 0;
pub const CS: u8 = 1;
pub const SS: u8 = 2;
pub const DS: u8 = 3;

bitfield! {
  /// A 16-bit general register with byte-addressable halves
  #[derive(Clone, Copy, Default, PartialEq, Eq)]
  pub struct Register16(u16);
  impl Debug;
  pub u8, lo, set_lo: 7, 0;
  pub u8, hi, set_hi: 15, 8;
}

impl Register16 {
    pub fn get(&self) -> u16 {
        self.0
    }

    pub fn set(&mut self, val: u16) {
        self.0 = val;
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registers {
    pub ax: Register16, // Accumulator
    pub bx: Register16, // Base
    pub cx: Register16, // Count
    pub dx: Register16, // Data
    pub sp: u16,        // Stack pointer
    pub bp: u16,        // Base pointer
    pub si: u16,        // Source index
    pub di: u16,        // Destination index
    pub cs: u16,        // Code segment
    pub ds: u16,        // Data segment
    pub es: u16,        // Extra segment
    pub ss: u16,        // Stack segment
    pub ip: u16,        // Instruction pointer
    pub psw: StatusWord,
}

macro_rules! reg_accessors {
    ($($reg:ident),*) => {
        paste! {
            $(
                pub fn [<$reg x>](&self) -> u16 {
                    self.[<$reg x>].get()
                }
                pub fn [<set_ $reg x>](&mut self, val: u16) {
                    self.[<$reg x>].set(val)
                }
                pub fn [<$reg l>](&self) -> u8 {
                    self.[<$reg x>].lo()
                }
                pub fn [<$reg h>](&self) -> u8 {
                    self.[<$reg x>].hi()
                }
                pub fn [<set_ $reg l>](&mut self, val: u8) {
                    self.[<$reg x>].set_lo(val)
                }
                pub fn [<set_ $reg h>](&mut self, val: u8) {
                    self.[<$reg x>].set_hi(val)
                }
            )*
        }
    };
}

impl Registers {
    pub fn new() -> Self {
        let mut reg = Self::default();
        reg.reset();
        reg
    }

    /// Boot state: execution starts at FFFF:0000
    pub fn reset(&mut self) {
        *self = Self {
            cs: 0xFFFF,
            psw: StatusWord::new(),
            ..Default::default()
        };
    }

    reg_accessors!(a, b, c, d);

    /// Byte register by encoding: AL, CL, DL, BL, AH, CH, DH, BH
    pub fn reg8(&self, index: u8) -> u8 {
        match index & 7 {
            0 => self.al(),
            1 => self.cl(),
            2 => self.dl(),
            3 => self.bl(),
            4 => self.ah(),
            5 => self.ch(),
            6 => self.dh(),
            7 => self.bh(),
            _ => unreachable!(),
        }
    }

    pub fn set_reg8(&mut self, index: u8, val: u8) {
        match index & 7 {
            0 => self.set_al(val),
            1 => self.set_cl(val),
            2 => self.set_dl(val),
            3 => self.set_bl(val),
            4 => self.set_ah(val),
            5 => self.set_ch(val),
            6 => self.set_dh(val),
            7 => self.set_bh(val),
            _ => unreachable!(),
        }
    }

    /// Word register by encoding: AX, CX, DX, BX, SP, BP, SI, DI
    pub fn reg16(&self, index: u8) -> u16 {
        match index & 7 {
            0 => self.ax(),
            1 => self.cx(),
            2 => self.dx(),
            3 => self.bx(),
            4 => self.sp,
            5 => self.bp,
            6 => self.si,
            7 => self.di,
            _ => unreachable!(),
        }
    }

    pub fn set_reg16(&mut self, index: u8, val: u16) {
        match index & 7 {
            0 => self.set_ax(val),
            1 => self.set_cx(val),
            2 => self.set_dx(val),
            3 => self.set_bx(val),
            4 => self.sp = val,
            5 => self.bp = val,
            6 => self.si = val,
            7 => self.di = val,
            _ => unreachable!(),
        }
    }

    /// Segment register by encoding: ES, CS, SS, DS
    pub fn segment(&self, index: u8) -> u16 {
        match index & 3 {
            0 => self.es,
            1 => self.cs,
            2 => self.ss,
            3 => self.ds,
            _ => unreachable!(),
        }
    }

    pub fn set_segment(&mut self, index: u8, val: u16) {
        match index & 3 {
            0 => self.es = val,
            1 => self.cs = val,
            2 => self.ss = val,
            3 => self.ds = val,
            _ => unreachable!(),
        }
    }
}

bitfield! {
  /// PSW: the processor status word.
  /// Bits 1 and 12-15 always read as 1, bits 3 and 5 always read as 0.
  #[derive(Clone, Copy, PartialEq, Eq)]
  pub struct StatusWord(u16);
  impl Debug;
  pub carry, set_carry: 0;
  pub parity, set_parity: 2;
  pub aux_carry, set_aux_carry: 4;
  pub zero, set_zero: 6;
  pub sign, set_sign: 7;
  pub trap, set_trap: 8;
  pub interrupt_enable, set_interrupt_enable: 9;
  pub direction, set_direction: 10;
  pub overflow, set_overflow: 11;
}

impl StatusWord {
    pub const RESERVED_ONES: u16 = 0xF002;
    pub const DEFINED: u16 = 0x0FD5;

    pub const fn new() -> Self {
        Self(Self::RESERVED_ONES)
    }

    pub fn raw(&self) -> u16 {
        (self.0 & Self::DEFINED) | Self::RESERVED_ONES
    }

    pub fn set_raw(&mut self, val: u16) {
        self.0 = (val & Self::DEFINED) | Self::RESERVED_ONES;
    }

    /// The low byte, as transferred by LAHF/SAHF
    pub fn lo_byte(&self) -> u8 {
        self.raw() as u8
    }

    /// Replaces S, Z, A, P and C from a byte; the upper flags are untouched
    pub fn set_lo_byte(&mut self, val: u8) {
        let raw = (self.raw() & 0xFF00) | val as u16;
        self.set_raw(raw);
    }
}

impl Default for StatusWord {
    fn default() -> Self {
        Self::new()
    }
}
