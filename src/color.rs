use core::fmt;
use core::ops::{Index, IndexMut};

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Color32(pub [u8; 4]);

impl Color32 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    pub fn to_rgba_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn to_565(self) -> u16 {
        let r = scale_8_to_n(self.0[0], 5) as u16;
        let g = scale_8_to_n(self.0[1], 6) as u16;
        let b = scale_8_to_n(self.0[2], 5) as u16;
        r << 11 | g << 5 | b
    }

    pub fn from_565(c: u16) -> Self {
        let r = extend_n_to_8((c >> 11) as u8 & 0x1F, 5);
        let g = extend_n_to_8((c >> 5) as u8 & 0x3F, 6);
        let b = extend_n_to_8(c as u8 & 0x1F, 5);
        Self::new(r, g, b, 0xFF)
    }
}

impl fmt::Debug for Color32 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:08X}", self.to_rgba_u32())
    }
}

impl Index<usize> for Color32 {
    type Output = u8;
    fn index(&self, i: usize) -> &Self::Output {
        &self.0[i]
    }
}

impl IndexMut<usize> for Color32 {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.0[i]
    }
}

/// Rounds an 8-bit value to the nearest `bits`-bit value.
pub fn scale_8_to_n(v: u8, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    ((v as u32 * max + 127) / 255) as u8
}

/// Expands a `bits`-bit value to 8 bits by bit replication.
pub fn extend_n_to_8(v: u8, bits: u32) -> u8 {
    let v = v as u32;
    let mut res = v << (8 - bits);
    let mut filled = bits;
    while filled < 8 {
        res |= res >> filled;
        filled *= 2;
    }
    res as u8
}
