//! Variable-byte integers: 7 payload bits per byte, high bit set on every
//! byte except the last.

use crate::error::{HdtError, Result};

pub fn encode(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decode the integer starting at `pos`. Returns the value and the position
/// just past it.
pub fn decode(data: &[u8], mut pos: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(pos)
            .ok_or_else(|| HdtError::corrupt("vbyte integer truncated"))?;
        pos += 1;
        let payload = (byte & 0x7f) as u64;
        if shift >= 64 || (shift == 63 && payload > 1) {
            return Err(HdtError::corrupt("vbyte integer overflows u64"));
        }
        value |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
        shift += 7;
    }
}
