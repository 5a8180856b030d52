#![allow(non_upper_case_globals)]

use alloc::{format, vec, vec::Vec};

use super::Result;
use crate::bitreader::BitReaderLsb;

// Max supported Huffman code size is 16-bits
const MaxSupportedCodeSize: usize = 16;

// The maximum number of symbols is 2^14
const MaxSymsLog2: usize = 14;
const MaxSyms: usize = 1 << MaxSymsLog2;

// Small zero runs may range from 3-10 entries
const SmallZeroRunSizeMin: usize = 3;
const SmallZeroRunExtraBits: usize = 3;

// Big zero runs may range from 11-138 entries
const BigZeroRunSizeMin: usize = 11;
const BigZeroRunExtraBits: usize = 7;

// Small non-zero runs may range from 3-6 entries
const SmallRepeatSizeMin: usize = 3;
const SmallRepeatExtraBits: usize = 2;

// Big non-zero run may range from 7-134 entries
const BigRepeatSizeMin: usize = 7;
const BigRepeatExtraBits: usize = 7;

// There are a maximum of 21 symbols in a compressed Huffman code length table.
const TotalCodelengthCodes: usize = 21;

// Symbols [0,16] indicate code sizes. Other symbols indicate zero runs or repeats:
const SmallZeroRunCode: usize = 17;
const BigZeroRunCode: usize = 18;
const SmallRepeatCode: usize = 19;
const BigRepeatCode: usize = 20;

/// Order in which the code length code sizes are stored.
#[rustfmt::skip]
const CODELENGTH_CODE_ORDER: [usize; TotalCodelengthCodes] = [
    SmallZeroRunCode, BigZeroRunCode,
    SmallRepeatCode, BigRepeatCode,
    0, 8, 7, 9, 6, 0xA, 5, 0xB, 4, 0xC, 3, 0xD, 2, 0xE, 1, 0xF, 0x10
];

pub fn read_huffman_table(reader: &mut BitReaderLsb) -> Result<HuffmanDecodingTable> {
    let total_used_syms = reader.read_u32(MaxSymsLog2) as usize;
    if total_used_syms == 0 || total_used_syms > MaxSyms {
        return Err(format!("Invalid Huffman symbol count {}", total_used_syms));
    }

    let codelength_table = {
        let num_codelength_codes = reader.read_u32(5) as usize;
        if num_codelength_codes == 0 || num_codelength_codes > TotalCodelengthCodes {
            return Err(format!("Invalid code length code count {}", num_codelength_codes));
        }

        let mut codelength_code_sizes = [0u8; TotalCodelengthCodes];
        for &i in CODELENGTH_CODE_ORDER.iter().take(num_codelength_codes) {
            codelength_code_sizes[i] = reader.read_u8(3);
        }

        HuffmanDecodingTable::from_sizes(&codelength_code_sizes)?
    };

    let mut symbol_code_sizes: Vec<u8> = Vec::with_capacity(total_used_syms);
    while symbol_code_sizes.len() < total_used_syms {
        if reader.overrun() {
            return Err("Huffman table ends prematurely".into());
        }
        let symbol_code_size = codelength_table.decode_symbol(reader)?;
        match symbol_code_size as usize {
            0..=MaxSupportedCodeSize => {
                symbol_code_sizes.push(symbol_code_size as u8);
            }
            SmallZeroRunCode => {
                let count = SmallZeroRunSizeMin + reader.read_u32(SmallZeroRunExtraBits) as usize;
                symbol_code_sizes.extend(core::iter::repeat(0).take(count));
            }
            BigZeroRunCode => {
                let count = BigZeroRunSizeMin + reader.read_u32(BigZeroRunExtraBits) as usize;
                symbol_code_sizes.extend(core::iter::repeat(0).take(count));
            }
            code @ (SmallRepeatCode | BigRepeatCode) => {
                let prev_sym_code_size = symbol_code_sizes
                    .last()
                    .copied()
                    .ok_or("Encountered a repeat code as the first code")?;
                if prev_sym_code_size == 0 {
                    return Err(
                        "Encountered a repeat code, but the previous symbol's code length was 0"
                            .into(),
                    );
                }
                let count = if code == SmallRepeatCode {
                    SmallRepeatSizeMin + reader.read_u32(SmallRepeatExtraBits) as usize
                } else {
                    BigRepeatSizeMin + reader.read_u32(BigRepeatExtraBits) as usize
                };
                symbol_code_sizes.extend(core::iter::repeat(prev_sym_code_size).take(count));
            }
            other => return Err(format!("Invalid code length symbol {}", other)),
        }
    }

    if symbol_code_sizes.len() > total_used_syms {
        return Err("Code length run overflows the symbol count".into());
    }

    HuffmanDecodingTable::from_sizes(&symbol_code_sizes)
}

#[derive(Clone, Copy, Default)]
struct HuffmanTableEntry {
    symbol: u16,
    code_size: u8,
}

#[derive(Clone)]
pub struct HuffmanDecodingTable {
    lookup: Vec<HuffmanTableEntry>,
    max_code_size: usize,
}

impl HuffmanDecodingTable {
    pub fn from_sizes(code_sizes: &[u8]) -> Result<Self> {
        if code_sizes.len() > MaxSyms {
            return Err(format!("Too many Huffman symbols: {}", code_sizes.len()));
        }

        let mut syms_using_codesize = [0u32; MaxSupportedCodeSize + 1];
        let mut max_code_size = 0;
        for &size in code_sizes {
            if size as usize > MaxSupportedCodeSize {
                return Err(format!("Huffman code size {} exceeds 16 bits", size));
            }
            syms_using_codesize[size as usize] += 1;
            max_code_size = max_code_size.max(size as usize);
        }

        let mut next_code = canonical_first_codes(&syms_using_codesize);

        let mut lookup = vec![HuffmanTableEntry::default(); 1 << max_code_size];

        for (symbol, &code_size) in code_sizes.iter().enumerate() {
            if code_size == 0 {
                continue;
            }
            let size = code_size as usize;
            if next_code[size] >= 1 << size {
                return Err("Code lengths are invalid, the code space is oversubscribed".into());
            }
            let entry = HuffmanTableEntry {
                symbol: symbol as u16,
                code_size,
            };
            let code = reverse_code(next_code[size], size);

            // Generate all lookup entries ending with this code
            let variant_count = 1usize << (max_code_size - size);
            for fill in 0..variant_count {
                lookup[fill << size | code as usize] = entry;
            }

            next_code[size] += 1;
        }

        Ok(Self {
            lookup,
            max_code_size,
        })
    }

    pub fn decode_symbol(&self, reader: &mut BitReaderLsb) -> Result<u16> {
        let bits = reader.peek(self.max_code_size) as usize;
        let entry = self.lookup.get(bits).copied().unwrap_or_default();
        if entry.code_size > 0 {
            reader.remove(entry.code_size as usize);
            Ok(entry.symbol)
        } else {
            Err(format!(
                "No matching code found in the decoding table, bits: {:016b}",
                bits
            ))
        }
    }
}

/// First canonical code of every code size.
fn canonical_first_codes(syms_using_codesize: &[u32; MaxSupportedCodeSize + 1]) -> [u32; MaxSupportedCodeSize + 1] {
    let mut total = 0;
    let mut next_code = [0u32; MaxSupportedCodeSize + 1];
    for bits in 1..=MaxSupportedCodeSize {
        let prev = if bits == 1 { 0 } else { syms_using_codesize[bits - 1] };
        total = (total + prev) << 1;
        next_code[bits] = total;
    }
    next_code
}

/// Canonical codes are stored MSB first, the reader consumes LSB first.
fn reverse_code(code: u32, size: usize) -> u32 {
    code.reverse_bits() >> (32 - size)
}
