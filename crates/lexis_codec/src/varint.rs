//! Compressed integers (C32 / C64).
//!
//! A compressed integer is written most significant group first, seven
//! bits per byte. Every byte except the last has its high bit set:
//!
//! ```text
//! 0         -> 00
//! 127       -> 7F
//! 128       -> 81 00
//! 16_384    -> 81 80 00
//! u32::MAX  -> 8F FF FF FF 7F
//! ```

use crate::error::{CodecError, CodecResult};
use std::io::{Read, Write};

/// Maximum encoded length of a C32.
pub const MAX_C32_LEN: usize = 5;

/// Maximum encoded length of a C64.
pub const MAX_C64_LEN: usize = 10;

fn encode(mut value: u64, buf: &mut [u8; MAX_C64_LEN]) -> &[u8] {
    let mut start = MAX_C64_LEN - 1;
    buf[start] = (value & 0x7f) as u8;
    value >>= 7;
    while value != 0 {
        start -= 1;
        buf[start] = 0x80 | (value & 0x7f) as u8;
        value >>= 7;
    }
    &buf[start..]
}

/// Returns the number of bytes `value` occupies as a compressed integer.
#[must_use]
pub const fn c64_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    if bits == 0 {
        1
    } else {
        bits.div_ceil(7)
    }
}

/// Appends a C32 to `out`.
pub fn encode_c32(value: u32, out: &mut Vec<u8>) {
    encode_c64(u64::from(value), out);
}

/// Appends a C64 to `out`.
pub fn encode_c64(value: u64, out: &mut Vec<u8>) {
    let mut buf = [0u8; MAX_C64_LEN];
    out.extend_from_slice(encode(value, &mut buf));
}

/// Writes a C32.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_c32<W: Write + ?Sized>(out: &mut W, value: u32) -> CodecResult<()> {
    write_c64(out, u64::from(value))
}

/// Writes a C64.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_c64<W: Write + ?Sized>(out: &mut W, value: u64) -> CodecResult<()> {
    let mut buf = [0u8; MAX_C64_LEN];
    out.write_all(encode(value, &mut buf))?;
    Ok(())
}

fn read_groups<R: Read + ?Sized>(input: &mut R, bits: u32, max_len: usize) -> CodecResult<u64> {
    let mut value: u64 = 0;
    let mut byte = [0u8; 1];
    for _ in 0..max_len {
        input.read_exact(&mut byte).map_err(CodecError::from_read)?;
        if value >> (bits - 7) != 0 {
            return Err(CodecError::VarintOverflow { bits });
        }
        value = (value << 7) | u64::from(byte[0] & 0x7f);
        if byte[0] & 0x80 == 0 {
            if bits < 64 && value >> bits != 0 {
                return Err(CodecError::VarintOverflow { bits });
            }
            return Ok(value);
        }
    }
    Err(CodecError::VarintOverflow { bits })
}

/// Reads a C32.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if input ends mid-value and
/// [`CodecError::VarintOverflow`] if the value exceeds 32 bits.
pub fn read_c32<R: Read + ?Sized>(input: &mut R) -> CodecResult<u32> {
    read_groups(input, 32, MAX_C32_LEN).map(|v| v as u32)
}

/// Reads a C64.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if input ends mid-value and
/// [`CodecError::VarintOverflow`] if the value exceeds 64 bits.
pub fn read_c64<R: Read + ?Sized>(input: &mut R) -> CodecResult<u64> {
    read_groups(input, 64, MAX_C64_LEN)
}

/// Decodes a C32 from the front of `bytes`, returning the value and the
/// number of bytes consumed.
///
/// # Errors
///
/// Same as [`read_c32`].
pub fn decode_c32(bytes: &[u8]) -> CodecResult<(u32, usize)> {
    let mut cursor = bytes;
    let value = read_c32(&mut cursor)?;
    Ok((value, bytes.len() - cursor.len()))
}

/// Decodes a C64 from the front of `bytes`, returning the value and the
/// number of bytes consumed.
///
/// # Errors
///
/// Same as [`read_c64`].
pub fn decode_c64(bytes: &[u8]) -> CodecResult<(u64, usize)> {
    let mut cursor = bytes;
    let value = read_c64(&mut cursor)?;
    Ok((value, bytes.len() - cursor.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c32_bytes(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        encode_c32(value, &mut out);
        out
    }

    #[test]
    fn known_encodings() {
        assert_eq!(c32_bytes(0), vec![0x00]);
        assert_eq!(c32_bytes(127), vec![0x7f]);
        assert_eq!(c32_bytes(128), vec![0x81, 0x00]);
        assert_eq!(c32_bytes(16_384), vec![0x81, 0x80, 0x00]);
        assert_eq!(c32_bytes(u32::MAX), vec![0x8f, 0xff, 0xff, 0xff, 0x7f]);
    }

    #[test]
    fn c64_len_matches_encoding() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u64::from(u32::MAX), u64::MAX] {
            let mut out = Vec::new();
            encode_c64(value, &mut out);
            assert_eq!(out.len(), c64_len(value), "value {value}");
        }
        assert_eq!(c64_len(u64::MAX), MAX_C64_LEN);
    }

    #[test]
    fn truncated_input_is_eof() {
        let result = decode_c32(&[0x81]);
        assert!(matches!(result, Err(CodecError::UnexpectedEof)));
        assert!(matches!(decode_c64(&[]), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn oversized_c32_is_overflow() {
        let mut out = Vec::new();
        encode_c64(u64::from(u32::MAX) + 1, &mut out);
        assert!(matches!(
            decode_c32(&out),
            Err(CodecError::VarintOverflow { bits: 32 })
        ));
    }

    #[test]
    fn decode_reports_consumed_length() {
        let mut out = Vec::new();
        encode_c32(300, &mut out);
        out.push(0xaa);
        assert_eq!(decode_c32(&out).unwrap(), (300, 2));
    }

    #[test]
    fn stream_read_write() {
        let mut out = Vec::new();
        write_c32(&mut out, 5).unwrap();
        write_c64(&mut out, 1 << 40).unwrap();
        let mut input = out.as_slice();
        assert_eq!(read_c32(&mut input).unwrap(), 5);
        assert_eq!(read_c64(&mut input).unwrap(), 1 << 40);
        assert!(input.is_empty());
    }

    proptest! {
        #[test]
        fn c64_round_trip(value in any::<u64>()) {
            let mut out = Vec::new();
            encode_c64(value, &mut out);
            prop_assert_eq!(decode_c64(&out).unwrap(), (value, out.len()));
        }
    }
}
