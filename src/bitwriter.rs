use crate::mask;

/// ORs `count` bits of `v` into `bytes` starting at `bit_pos`, LSB first.
/// Bits falling outside of `bytes` are dropped.
fn or_bits(bytes: &mut [u8], bit_pos: usize, count: usize, v: u32) {
    let mut byte = bit_pos / 8;
    let bit = bit_pos % 8;
    let v = (v as u64) << bit;
    let mut written = 0;
    while written < count + bit {
        if let Some(b) = bytes.get_mut(byte) {
            *b |= (v >> written) as u8;
        }
        written += 8;
        byte += 1;
    }
}

/// Writes bit fields LSB first, starting at bit 0 of the first byte.
/// The output buffer is expected to be zeroed.
pub struct BitWriterLsb<'a> {
    bytes: &'a mut [u8],
    bit_pos: usize,
}

impl<'a> BitWriterLsb<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes, bit_pos: 0 }
    }

    pub fn write_u8(&mut self, count: usize, v: u8) {
        assert!(count <= 8);
        self.write_u32(count, v as u32)
    }

    pub fn write_u16(&mut self, count: usize, v: u16) {
        assert!(count <= 16);
        self.write_u32(count, v as u32)
    }

    pub fn write_u32(&mut self, count: usize, v: u32) {
        assert!(count <= 32);
        let v = (v as u64 & mask!(count as u64)) as u32;
        or_bits(self.bytes, self.bit_pos, count, v);
        self.bit_pos += count;
    }
}

/// LSB bit writer which fills the output from the last bit of the last byte.
/// The output is the same as from [BitWriterLsb], but with the bits of the
/// whole buffer reversed. ASTC stores its weights this way.
pub struct BitWriterLsbReversed<'a> {
    bytes: &'a mut [u8],
    bit_pos: usize,
}

impl<'a> BitWriterLsbReversed<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        let bit_pos = bytes.len() * 8;
        Self { bytes, bit_pos }
    }

    pub fn write_u8(&mut self, count: usize, v: u8) {
        assert!(count <= 8);
        self.write_u32(count, v as u32)
    }

    pub fn write_u32(&mut self, count: usize, v: u32) {
        assert!(count <= 32);
        if count == 0 {
            return;
        }
        let v = (v as u64 & mask!(count as u64)) as u32;
        let v = v.reverse_bits() >> (32 - count);
        self.bit_pos = self.bit_pos.saturating_sub(count);
        or_bits(self.bytes, self.bit_pos, count, v);
    }
}
