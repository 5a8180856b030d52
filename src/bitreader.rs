use crate::mask;

/// LSB-first bit reader. Reads past the end of the buffer yield zero bits,
/// `overrun` reports whether that happened.
pub struct BitReaderLsb<'a> {
    bytes: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReaderLsb<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, bit_pos: 0 }
    }

    #[cfg(test)]
    pub fn bit_pos(&self) -> usize {
        self.bit_pos
    }

    pub fn overrun(&self) -> bool {
        self.bit_pos > self.bytes.len() * 8
    }

    pub fn peek(&self, count: usize) -> u32 {
        assert!(count <= 32);
        if count == 0 {
            return 0;
        }

        let mut byte = self.bit_pos / 8;
        let bit = self.bit_pos % 8;

        let mut result = (self.byte_at(byte) >> bit) as u64;
        let mut read = 8 - bit;
        byte += 1;

        while read < count {
            result |= (self.byte_at(byte) as u64) << read;
            read += 8;
            byte += 1;
        }

        (result & mask!(count as u64)) as u32
    }

    pub fn remove(&mut self, count: usize) {
        self.bit_pos += count;
    }

    pub fn read_u32(&mut self, count: usize) -> u32 {
        let res = self.peek(count);
        self.remove(count);
        res
    }

    pub fn read_u8(&mut self, count: usize) -> u8 {
        assert!(count <= 8);
        self.read_u32(count) as u8
    }

    pub fn read_bool(&mut self) -> bool {
        self.read_u32(1) == 1
    }

    fn byte_at(&self, i: usize) -> u8 {
        self.bytes.get(i).copied().unwrap_or(0)
    }
}
