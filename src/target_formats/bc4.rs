pub const BC4_BLOCK_SIZE: usize = 8;

/// Single channel BC4 block in the eight value mode, endpoints at the
/// minimum and maximum of the block.
pub fn encode_block(values: &[u8; 16]) -> [u8; BC4_BLOCK_SIZE] {
    let a0 = values.iter().copied().max().unwrap_or(0);
    let a1 = values.iter().copied().min().unwrap_or(0);

    let mut block = [0u8; BC4_BLOCK_SIZE];
    block[0] = a0;
    block[1] = a1;

    if a0 == a1 {
        return block;
    }

    let palette = palette(a0, a1);
    let mut indices = 0u64;
    for (i, &v) in values.iter().enumerate() {
        let best = palette
            .iter()
            .enumerate()
            .min_by_key(|(_, &p)| (p as i32 - v as i32).abs())
            .map(|(i, _)| i)
            .unwrap_or(0) as u64;
        indices |= best << (3 * i);
    }
    block[2..].copy_from_slice(&indices.to_le_bytes()[..6]);
    block
}

/// Block decoding to a constant `value`.
pub fn solid_block(value: u8) -> [u8; BC4_BLOCK_SIZE] {
    [value, value, 0, 0, 0, 0, 0, 0]
}

/// Eight value mode palette, `a0` must be greater than `a1`.
pub fn palette(a0: u8, a1: u8) -> [u8; 8] {
    let mut res = [a0, a1, 0, 0, 0, 0, 0, 0];
    for (i, v) in res.iter_mut().enumerate().skip(2) {
        let w = i as u32 - 1;
        *v = (((7 - w) * a0 as u32 + w * a1 as u32) / 7) as u8;
    }
    res
}

#[cfg(test)]
pub(crate) fn decode_block(block: &[u8]) -> [u8; 16] {
    let (a0, a1) = (block[0], block[1]);
    let palette = if a0 > a1 {
        palette(a0, a1)
    } else {
        // Only solid blocks are produced in the six value mode
        [a0; 8]
    };
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&block[2..8]);
    let indices = u64::from_le_bytes(bytes);
    let mut values = [0u8; 16];
    for (i, v) in values.iter_mut().enumerate() {
        *v = palette[(indices >> (3 * i) & 7) as usize];
    }
    values
}
