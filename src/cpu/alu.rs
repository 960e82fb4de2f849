//! Byte and word arithmetic with PSW side effects.
//!
//! Every operation takes the status word it updates explicitly, so these are
//! usable without a CPU (and are tested that way).

use super::registers::StatusWord;

/// An operand width the ALU can work on: `u8` or `u16`
pub trait Operand: Copy + PartialEq + Into<u32> {
    const BITS: u32;
    const MASK: u32;
    const MSB: u32 = 1 << (Self::BITS - 1);
    /// Auxiliary carry is taken from this bit of `a ^ b ^ result`
    const AUX_BIT: u32;

    fn truncate(val: u32) -> Self;

    fn sign_extend(self) -> i32 {
        let val: u32 = self.into();
        ((val << (32 - Self::BITS)) as i32) >> (32 - Self::BITS)
    }
}

impl Operand for u8 {
    const BITS: u32 = 8;
    const MASK: u32 = 0xFF;
    const AUX_BIT: u32 = 0x10;

    fn truncate(val: u32) -> Self {
        val as u8
    }
}

impl Operand for u16 {
    const BITS: u32 = 16;
    const MASK: u32 = 0xFFFF;
    const AUX_BIT: u32 = 0x1000;

    fn truncate(val: u32) -> Self {
        val as u16
    }
}

pub fn parity(val: u32) -> bool {
    (val as u8).count_ones() % 2 == 0
}

/// Sets sign, zero and parity from a result
pub fn set_szp<T: Operand>(psw: &mut StatusWord, result: T) {
    let result: u32 = result.into();
    psw.set_sign(result & T::MSB != 0);
    psw.set_zero(result & T::MASK == 0);
    psw.set_parity(parity(result));
}

pub fn add<T: Operand>(psw: &mut StatusWord, a: T, b: T, carry_in: bool) -> T {
    let (a, b): (u32, u32) = (a.into(), b.into());
    let result = a + b + carry_in as u32;
    psw.set_carry(result > T::MASK);
    psw.set_overflow((a ^ result) & (b ^ result) & T::MSB != 0);
    psw.set_aux_carry((a ^ b ^ result) & T::AUX_BIT != 0);
    let result = T::truncate(result);
    set_szp(psw, result);
    result
}

pub fn sub<T: Operand>(psw: &mut StatusWord, a: T, b: T, borrow_in: bool) -> T {
    let (a, b): (u32, u32) = (a.into(), b.into());
    let result = a.wrapping_sub(b).wrapping_sub(borrow_in as u32);
    psw.set_carry(a < b + borrow_in as u32);
    psw.set_overflow((a ^ b) & (a ^ result) & T::MSB != 0);
    psw.set_aux_carry((a ^ b ^ result) & T::AUX_BIT != 0);
    let result = T::truncate(result);
    set_szp(psw, result);
    result
}

fn logic_flags<T: Operand>(psw: &mut StatusWord, result: T) -> T {
    psw.set_carry(false);
    psw.set_overflow(false);
    psw.set_aux_carry(false);
    set_szp(psw, result);
    result
}

pub fn and<T: Operand>(psw: &mut StatusWord, a: T, b: T) -> T {
    let (a, b): (u32, u32) = (a.into(), b.into());
    logic_flags(psw, T::truncate(a & b))
}

pub fn or<T: Operand>(psw: &mut StatusWord, a: T, b: T) -> T {
    let (a, b): (u32, u32) = (a.into(), b.into());
    logic_flags(psw, T::truncate(a | b))
}

pub fn xor<T: Operand>(psw: &mut StatusWord, a: T, b: T) -> T {
    let (a, b): (u32, u32) = (a.into(), b.into());
    logic_flags(psw, T::truncate(a ^ b))
}

pub fn inc<T: Operand>(psw: &mut StatusWord, val: T) -> T {
    let carry = psw.carry();
    let result = add(psw, val, T::truncate(1), false);
    psw.set_carry(carry);
    result
}

pub fn dec<T: Operand>(psw: &mut StatusWord, val: T) -> T {
    let carry = psw.carry();
    let result = sub(psw, val, T::truncate(1), false);
    psw.set_carry(carry);
    result
}

pub fn neg<T: Operand>(psw: &mut StatusWord, val: T) -> T {
    let result = sub(psw, T::truncate(0), val, false);
    let val: u32 = val.into();
    psw.set_carry(val != 0);
    result
}

/// The eight operations selected by opcode bits 3-5 (0x00-0x3F) and by the
/// reg field of the immediate group opcodes 0x80-0x83
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

impl AluOp {
    pub fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Add,
            1 => Self::Or,
            2 => Self::Adc,
            3 => Self::Sbb,
            4 => Self::And,
            5 => Self::Sub,
            6 => Self::Xor,
            7 => Self::Cmp,
            _ => unreachable!(),
        }
    }

    /// Computes the operation; `None` means the result is discarded (CMP)
    pub fn apply<T: Operand>(self, psw: &mut StatusWord, a: T, b: T) -> Option<T> {
        let carry = psw.carry();
        match self {
            Self::Add => Some(add(psw, a, b, false)),
            Self::Or => Some(or(psw, a, b)),
            Self::Adc => Some(add(psw, a, b, carry)),
            Self::Sbb => Some(sub(psw, a, b, carry)),
            Self::And => Some(and(psw, a, b)),
            Self::Sub => Some(sub(psw, a, b, false)),
            Self::Xor => Some(xor(psw, a, b)),
            Self::Cmp => {
                sub(psw, a, b, false);
                None
            }
        }
    }
}

/// Shift and rotate operations selected by the reg field of 0xC0/0xC1/0xD0-0xD3
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftOp {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sar,
}

impl ShiftOp {
    pub fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Rol,
            1 => Self::Ror,
            2 => Self::Rcl,
            3 => Self::Rcr,
            // /6 is an undocumented alias of SHL on this core
            4 | 6 => Self::Shl,
            5 => Self::Shr,
            7 => Self::Sar,
            _ => unreachable!(),
        }
    }

    /// Shifts `val` by `count & 0x1F`, one bit at a time.
    /// A masked count of zero leaves the operand and every flag untouched.
    pub fn apply<T: Operand>(self, psw: &mut StatusWord, val: T, count: u8) -> T {
        let count = count & 0x1F;
        if count == 0 {
            return val;
        }
        let msb = T::MSB;
        let mut val: u32 = val.into();
        let mut carry = psw.carry();
        let mut overflow = false;
        for _ in 0..count {
            match self {
                Self::Rol => {
                    carry = val & msb != 0;
                    val = ((val << 1) | carry as u32) & T::MASK;
                    overflow = (val & msb != 0) != carry;
                }
                Self::Ror => {
                    carry = val & 1 != 0;
                    val = (val >> 1) | if carry { msb } else { 0 };
                    overflow = (val ^ (val << 1)) & msb != 0;
                }
                Self::Rcl => {
                    let carry_out = val & msb != 0;
                    val = ((val << 1) | carry as u32) & T::MASK;
                    carry = carry_out;
                    overflow = (val & msb != 0) != carry;
                }
                Self::Rcr => {
                    let carry_out = val & 1 != 0;
                    val = (val >> 1) | if carry { msb } else { 0 };
                    carry = carry_out;
                    overflow = (val ^ (val << 1)) & msb != 0;
                }
                Self::Shl => {
                    carry = val & msb != 0;
                    val = (val << 1) & T::MASK;
                    overflow = (val & msb != 0) != carry;
                }
                Self::Shr => {
                    overflow = val & msb != 0;
                    carry = val & 1 != 0;
                    val >>= 1;
                }
                Self::Sar => {
                    carry = val & 1 != 0;
                    val = (val >> 1) | (val & msb);
                    overflow = false;
                }
            }
        }
        psw.set_carry(carry);
        psw.set_overflow(overflow);
        let result = T::truncate(val);
        if matches!(self, Self::Shl | Self::Shr | Self::Sar) {
            set_szp(psw, result);
        }
        result
    }
}

/// Unsigned multiply into a double-width result.
/// Returns the product and whether the upper half is significant.
pub fn mul<T: Operand>(psw: &mut StatusWord, a: T, b: T) -> (u32, bool) {
    let (a, b): (u32, u32) = (a.into(), b.into());
    let product = a * b;
    let overflow = product >> T::BITS != 0;
    psw.set_carry(overflow);
    psw.set_overflow(overflow);
    (product, overflow)
}

/// Signed multiply into a double-width result (returned as raw bits).
pub fn imul<T: Operand>(psw: &mut StatusWord, a: T, b: T) -> (u32, bool) {
    let product = a.sign_extend() * b.sign_extend();
    let narrow = ((product << (32 - T::BITS)) >> (32 - T::BITS)) as i32;
    let overflow = narrow != product;
    psw.set_carry(overflow);
    psw.set_overflow(overflow);
    (product as u32 & ((T::MASK << T::BITS) | T::MASK), overflow)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Division<T> {
    Quotient { quotient: T, remainder: T },
    /// Signed minimum dividend over a zero divisor: no trap, fixed result
    MinimumByZero { quotient: T, remainder: T },
    /// Divide error; interrupt vector 0
    Fault,
}

/// Unsigned divide of a double-width dividend
pub fn div<T: Operand>(dividend: u32, divisor: T) -> Division<T> {
    let divisor: u32 = divisor.into();
    if divisor == 0 {
        return Division::Fault;
    }
    let quotient = dividend / divisor;
    if quotient > T::MASK {
        return Division::Fault;
    }
    Division::Quotient {
        quotient: T::truncate(quotient),
        remainder: T::truncate(dividend % divisor),
    }
}

/// Signed divide of a double-width dividend.
pub fn idiv<T: Operand>(dividend: u32, divisor: T) -> Division<T> {
    let wide_bits = T::BITS * 2;
    let min_dividend = 1u32 << (wide_bits - 1);
    let dividend_mask = if wide_bits == 32 {
        u32::MAX
    } else {
        (1 << wide_bits) - 1
    };
    let dividend = dividend & dividend_mask;
    let raw_divisor: u32 = divisor.into();
    if raw_divisor == 0 {
        if dividend == min_dividend {
            return Division::MinimumByZero {
                quotient: T::truncate(T::MSB | 1),
                remainder: T::truncate(0),
            };
        }
        return Division::Fault;
    }
    let signed_dividend = ((dividend << (32 - wide_bits)) as i32 >> (32 - wide_bits)) as i64;
    let signed_divisor = divisor.sign_extend() as i64;
    let quotient = signed_dividend / signed_divisor;
    let remainder = signed_dividend % signed_divisor;
    let max = (T::MSB - 1) as i64;
    if quotient > max || quotient < -max - 1 {
        return Division::Fault;
    }
    Division::Quotient {
        quotient: T::truncate(quotient as u32),
        remainder: T::truncate(remainder as u32),
    }
}

pub fn daa(psw: &mut StatusWord, al: u8) -> u8 {
    let mut result = al;
    let (old_al, old_carry) = (al, psw.carry());
    if al & 0x0F > 9 || psw.aux_carry() {
        result = result.wrapping_add(6);
        psw.set_aux_carry(true);
    } else {
        psw.set_aux_carry(false);
    }
    if old_al > 0x99 || old_carry {
        result = result.wrapping_add(0x60);
        psw.set_carry(true);
    } else {
        psw.set_carry(false);
    }
    set_szp(psw, result);
    result
}

pub fn das(psw: &mut StatusWord, al: u8) -> u8 {
    let mut result = al;
    let (old_al, old_carry) = (al, psw.carry());
    if al & 0x0F > 9 || psw.aux_carry() {
        result = result.wrapping_sub(6);
        psw.set_aux_carry(true);
    } else {
        psw.set_aux_carry(false);
    }
    if old_al > 0x99 || old_carry {
        result = result.wrapping_sub(0x60);
        psw.set_carry(true);
    } else {
        psw.set_carry(false);
    }
    set_szp(psw, result);
    result
}

/// ASCII adjust after addition: returns the new AX
pub fn aaa(psw: &mut StatusWord, ax: u16) -> u16 {
    let adjust = (ax & 0x0F) > 9 || psw.aux_carry();
    psw.set_aux_carry(adjust);
    psw.set_carry(adjust);
    let ax = if adjust { ax.wrapping_add(0x106) } else { ax };
    ax & 0xFF0F
}

/// ASCII adjust after subtraction: returns the new AX
pub fn aas(psw: &mut StatusWord, ax: u16) -> u16 {
    let adjust = (ax & 0x0F) > 9 || psw.aux_carry();
    psw.set_aux_carry(adjust);
    psw.set_carry(adjust);
    let ax = if adjust {
        let al = (ax as u8).wrapping_sub(6);
        let ah = ((ax >> 8) as u8).wrapping_sub(1);
        ((ah as u16) << 8) | al as u16
    } else {
        ax
    };
    ax & 0xFF0F
}

/// AAM always divides by ten on this core; the immediate operand is ignored.
pub fn aam(psw: &mut StatusWord, al: u8) -> u16 {
    let (ah, al) = (al / 10, al % 10);
    set_szp(psw, al);
    ((ah as u16) << 8) | al as u16
}

/// AAD always multiplies by ten on this core; the immediate operand is ignored.
pub fn aad(psw: &mut StatusWord, ax: u16) -> u16 {
    let al = ((ax >> 8) as u8).wrapping_mul(10).wrapping_add(ax as u8);
    set_szp(psw, al);
    al as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add8_flags_for_all_pairs() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                let mut psw = StatusWord::new();
                let result = add(&mut psw, a, b, false);
                assert_eq!(result, a.wrapping_add(b));
                assert_eq!(psw.carry(), a as u16 + b as u16 > 0xFF);
                assert_eq!(psw.zero(), result == 0);
                assert_eq!(psw.parity(), result.count_ones() % 2 == 0);
                assert_eq!(psw.sign(), result & 0x80 != 0);
            }
        }
    }

    #[test]
    fn add_ff_plus_one() {
        let mut psw = StatusWord::new();
        let result = add(&mut psw, 0xFFu8, 0x01, false);
        assert_eq!(result, 0);
        assert!(psw.carry() && psw.zero() && psw.aux_carry() && psw.parity());
        assert!(!psw.overflow() && !psw.sign());
    }

    #[test]
    fn word_aux_carry_uses_bit_12() {
        let mut psw = StatusWord::new();
        add(&mut psw, 0x000Fu16, 0x0001, false);
        assert!(!psw.aux_carry());
        add(&mut psw, 0x0FFFu16, 0x0001, false);
        assert!(psw.aux_carry());
    }

    #[test]
    fn sub_overflow_and_borrow() {
        let mut psw = StatusWord::new();
        assert_eq!(sub(&mut psw, 0x80u8, 0x01, false), 0x7F);
        assert!(psw.overflow() && !psw.carry());
        assert_eq!(sub(&mut psw, 0x00u8, 0x01, false), 0xFF);
        assert!(psw.carry() && psw.sign() && !psw.overflow());
    }

    #[test]
    fn inc_preserves_carry() {
        let mut psw = StatusWord::new();
        psw.set_carry(true);
        assert_eq!(inc(&mut psw, 0xFFFFu16), 0);
        assert!(psw.carry() && psw.zero());
        psw.set_carry(false);
        assert_eq!(dec(&mut psw, 0x0000u16), 0xFFFF);
        assert!(!psw.carry());
    }

    #[test]
    fn rcl_updates_carry_every_iteration() {
        let mut psw = StatusWord::new();
        psw.set_carry(true);
        // 0x80 with carry set, rotated twice through a 9-bit ring: 1_1000_0000 -> 0_0000_0011
        assert_eq!(ShiftOp::Rcl.apply(&mut psw, 0x80u8, 2), 0x03);
        assert!(!psw.carry());
        psw.set_carry(false);
        // A count of nine returns the original ring
        assert_eq!(ShiftOp::Rcl.apply(&mut psw, 0x5Au8, 9), 0x5A);
        assert!(!psw.carry());
    }

    #[test]
    fn shift_count_is_masked_to_five_bits() {
        let mut psw = StatusWord::new();
        psw.set_carry(true);
        assert_eq!(ShiftOp::Shl.apply(&mut psw, 0x01u8, 0x20), 0x01);
        assert!(psw.carry());
        assert_eq!(ShiftOp::Shl.apply(&mut psw, 0x01u8, 0x21), 0x02);
        assert!(!psw.carry());
        assert_eq!(ShiftOp::Shl.apply(&mut psw, 0x8000u16, 17), 0);
        assert!(psw.zero());
    }

    #[test]
    fn sar_keeps_sign() {
        let mut psw = StatusWord::new();
        assert_eq!(ShiftOp::Sar.apply(&mut psw, 0x81u8, 1), 0xC0);
        assert!(psw.carry() && psw.sign());
        assert_eq!(ShiftOp::Ror.apply(&mut psw, 0x0001u16, 1), 0x8000);
        assert!(psw.carry() && psw.overflow());
    }

    #[test]
    fn multiply_overflow() {
        let mut psw = StatusWord::new();
        assert_eq!(mul(&mut psw, 0x10u8, 0x10), (0x100, true));
        assert!(psw.carry() && psw.overflow());
        assert_eq!(imul(&mut psw, 0xFFu8, 0x02), (0xFFFE, false));
        assert!(!psw.carry());
        assert_eq!(imul(&mut psw, 0x7FFFu16, 0x0002), (0x0000_FFFE, true));
    }

    #[test]
    fn divide_faults_and_quirk() {
        assert_eq!(div(0x1234, 0u8), Division::Fault);
        assert_eq!(div(0x1000, 0x10u8), Division::Fault);
        assert_eq!(
            div(0x0107, 0x10u8),
            Division::Quotient {
                quotient: 0x10,
                remainder: 0x07
            }
        );
        assert_eq!(
            idiv(0xFFF9, 0x02u8),
            Division::Quotient {
                quotient: 0xFD,
                remainder: 0xFF
            }
        );
        assert_eq!(
            idiv(0x8000, 0u8),
            Division::MinimumByZero {
                quotient: 0x81,
                remainder: 0
            }
        );
        assert_eq!(
            idiv(0x8000_0000, 0u16),
            Division::MinimumByZero {
                quotient: 0x8001,
                remainder: 0
            }
        );
        assert_eq!(idiv(0x7FFF_0000, 0u16), Division::Fault);
        assert_eq!(idiv(0x0100, 0x01u8), Division::Fault);
    }

    #[test]
    fn bcd_adjustments() {
        let mut psw = StatusWord::new();
        // 0x19 + 0x28 = 0x41 with aux carry -> 0x47
        add(&mut psw, 0x19u8, 0x28, false);
        assert_eq!(daa(&mut psw, 0x41), 0x47);
        assert_eq!(aam(&mut psw, 73), 0x0703);
        assert_eq!(aad(&mut psw, 0x0703), 73);
        let mut psw = StatusWord::new();
        assert_eq!(aaa(&mut psw, 0x000B), 0x0101);
        assert!(psw.carry());
    }
}
