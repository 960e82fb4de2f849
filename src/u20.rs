use bitfield::bitfield_bitrange;
use bitfield::BitRange;

use std::fmt;
use std::ops::Add;

pub const ADDRESS_MASK: u32 = 0xF_FFFF;

// A faux primative to store 20-bit linear addresses
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(non_camel_case_types)]
pub struct u20(pub u32);

bitfield_bitrange! {struct u20(u32)}

impl u20 {
    /// Composes a segment:offset pair into a linear address.
    /// Carries out of bit 19 are dropped, so FFFF:0010 wraps to 00000.
    pub fn from_segmented(segment: u16, offset: u16) -> Self {
        Self((((segment as u32) << 4) + offset as u32) & ADDRESS_MASK)
    }

    pub fn raw(&self) -> usize {
        (self.0 & ADDRESS_MASK) as usize
    }

    /// The 64 KiB window this address falls in (bits 16-19)
    pub fn bank(&self) -> u8 {
        self.bit_range(19, 16)
    }
}

impl fmt::Display for u20 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#07X}", self.0)
    }
}

impl fmt::UpperHex for u20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for u20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u20> for usize {
    fn from(addr: u20) -> usize {
        addr.raw()
    }
}

impl From<usize> for u20 {
    fn from(num: usize) -> Self {
        u20(num as u32 & ADDRESS_MASK)
    }
}

impl From<u32> for u20 {
    fn from(num: u32) -> Self {
        u20(num & ADDRESS_MASK)
    }
}

impl From<u16> for u20 {
    fn from(num: u16) -> Self {
        u20(num as u32)
    }
}

impl<T: Into<u20>> Add<T> for u20 {
    type Output = Self;

    fn add(self, other: T) -> Self {
        Self((self.0 + other.into().0) & ADDRESS_MASK)
    }
}
