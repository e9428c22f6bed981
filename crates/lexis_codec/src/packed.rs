//! Bit-packed ordinal arrays.
//!
//! Sort caches store one ordinal per document at a width of 1, 2, 4, 8,
//! 16 or 32 bits. Sub-byte widths pack the lowest-numbered entry into the
//! least significant bits of each byte. 16- and 32-bit entries are
//! big-endian unless the array was written in host order by a legacy
//! writer, in which case they are read little-endian.

use crate::error::{CodecError, CodecResult};

/// Widths accepted by [`PackedInts`].
pub const VALID_WIDTHS: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Byte order of 16- and 32-bit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrdByteOrder {
    /// Big-endian (current format).
    #[default]
    BigEndian,
    /// Little-endian (legacy host order).
    LittleEndian,
}

/// Returns the number of bytes needed for `count` entries of `width` bits.
#[must_use]
pub const fn packed_len(count: usize, width: u32) -> usize {
    (count * width as usize).div_ceil(8)
}

/// Chooses the narrowest ordinal width able to hold `cardinality` distinct
/// ordinals plus headroom for a null ordinal.
#[must_use]
pub const fn ord_width_for(cardinality: u32) -> u32 {
    if cardinality <= 2 {
        1
    } else if cardinality <= 4 {
        2
    } else if cardinality <= 15 {
        4
    } else if cardinality <= 255 {
        8
    } else if cardinality <= 65_535 {
        16
    } else {
        32
    }
}

/// Validates an ordinal width.
///
/// # Errors
///
/// Returns [`CodecError::InvalidWidth`] unless `width` is in
/// [`VALID_WIDTHS`].
pub fn check_width(width: u32) -> CodecResult<()> {
    if VALID_WIDTHS.contains(&width) {
        Ok(())
    } else {
        Err(CodecError::InvalidWidth { width })
    }
}

/// Read access to a packed ordinal array.
#[derive(Debug, Clone, Copy)]
pub struct PackedInts<'a> {
    bytes: &'a [u8],
    width: u32,
    order: OrdByteOrder,
}

impl<'a> PackedInts<'a> {
    /// Wraps `bytes` as an array of `width`-bit entries.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidWidth`] for unsupported widths.
    pub fn new(bytes: &'a [u8], width: u32, order: OrdByteOrder) -> CodecResult<Self> {
        check_width(width)?;
        Ok(Self {
            bytes,
            width,
            order,
        })
    }

    /// Number of whole entries the array holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len() * 8 / self.width as usize
    }

    /// Returns entry `index`, or `None` if it lies beyond the array.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u32> {
        if index >= self.capacity() {
            return None;
        }
        let b = self.bytes;
        let value = match self.width {
            1 => u32::from((b[index >> 3] >> (index & 7)) & 0x1),
            2 => u32::from((b[index >> 2] >> (2 * (index & 3))) & 0x3),
            4 => u32::from((b[index >> 1] >> (4 * (index & 1))) & 0xf),
            8 => u32::from(b[index]),
            16 => {
                let raw = [b[index * 2], b[index * 2 + 1]];
                u32::from(match self.order {
                    OrdByteOrder::BigEndian => u16::from_be_bytes(raw),
                    OrdByteOrder::LittleEndian => u16::from_le_bytes(raw),
                })
            }
            _ => {
                let at = index * 4;
                let raw = [b[at], b[at + 1], b[at + 2], b[at + 3]];
                match self.order {
                    OrdByteOrder::BigEndian => u32::from_be_bytes(raw),
                    OrdByteOrder::LittleEndian => u32::from_le_bytes(raw),
                }
            }
        };
        Some(value)
    }
}

/// Builds a packed ordinal array.
#[derive(Debug, Clone)]
pub struct PackedIntsWriter {
    bytes: Vec<u8>,
    width: u32,
    len: usize,
}

impl PackedIntsWriter {
    /// Creates an empty array of `width`-bit entries.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidWidth`] for unsupported widths.
    pub fn new(width: u32) -> CodecResult<Self> {
        check_width(width)?;
        Ok(Self {
            bytes: Vec::new(),
            width,
            len: 0,
        })
    }

    /// Appends one entry. Bits above `width` are discarded.
    pub fn push(&mut self, value: u32) {
        let index = self.len;
        self.len += 1;
        self.bytes.resize(packed_len(self.len, self.width), 0);
        let b = &mut self.bytes;
        match self.width {
            1 => b[index >> 3] |= ((value & 0x1) as u8) << (index & 7),
            2 => b[index >> 2] |= ((value & 0x3) as u8) << (2 * (index & 3)),
            4 => b[index >> 1] |= ((value & 0xf) as u8) << (4 * (index & 1)),
            8 => b[index] = value as u8,
            16 => b[index * 2..index * 2 + 2].copy_from_slice(&(value as u16).to_be_bytes()),
            _ => b[index * 4..index * 4 + 4].copy_from_slice(&value.to_be_bytes()),
        }
    }

    /// Number of entries pushed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the packed bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_table() {
        assert_eq!(ord_width_for(0), 1);
        assert_eq!(ord_width_for(2), 1);
        assert_eq!(ord_width_for(3), 2);
        assert_eq!(ord_width_for(4), 2);
        assert_eq!(ord_width_for(5), 4);
        assert_eq!(ord_width_for(15), 4);
        assert_eq!(ord_width_for(16), 8);
        assert_eq!(ord_width_for(255), 8);
        assert_eq!(ord_width_for(256), 16);
        assert_eq!(ord_width_for(65_535), 16);
        assert_eq!(ord_width_for(65_536), 32);
    }

    #[test]
    fn invalid_width_is_rejected() {
        assert!(matches!(
            PackedIntsWriter::new(3),
            Err(CodecError::InvalidWidth { width: 3 })
        ));
        assert!(PackedInts::new(&[], 12, OrdByteOrder::BigEndian).is_err());
    }

    #[test]
    fn sub_byte_widths_pack_low_bits_first() {
        let mut writer = PackedIntsWriter::new(2).unwrap();
        for value in [1, 2, 3, 0, 2] {
            writer.push(value);
        }
        let bytes = writer.into_bytes();
        assert_eq!(bytes, vec![0b0011_1001, 0b0000_0010]);

        let packed = PackedInts::new(&bytes, 2, OrdByteOrder::BigEndian).unwrap();
        let read: Vec<u32> = (0..5).map(|i| packed.get(i).unwrap()).collect();
        assert_eq!(read, vec![1, 2, 3, 0, 2]);
    }

    #[test]
    fn every_width_reads_back() {
        for width in VALID_WIDTHS {
            let max = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
            let values: Vec<u32> = (0..37u32).map(|i| i.wrapping_mul(2_654_435_761) & max).collect();
            let mut writer = PackedIntsWriter::new(width).unwrap();
            values.iter().for_each(|&v| writer.push(v));
            assert_eq!(writer.len(), values.len());
            let bytes = writer.into_bytes();
            assert_eq!(bytes.len(), packed_len(values.len(), width));

            let packed = PackedInts::new(&bytes, width, OrdByteOrder::BigEndian).unwrap();
            for (i, &v) in values.iter().enumerate() {
                assert_eq!(packed.get(i), Some(v), "width {width} index {i}");
            }
        }
    }

    #[test]
    fn legacy_order_reads_little_endian() {
        let bytes = [0x01, 0x02, 0x00, 0x00];
        let be = PackedInts::new(&bytes, 16, OrdByteOrder::BigEndian).unwrap();
        let le = PackedInts::new(&bytes, 16, OrdByteOrder::LittleEndian).unwrap();
        assert_eq!(be.get(0), Some(0x0102));
        assert_eq!(le.get(0), Some(0x0201));

        let le32 = PackedInts::new(&bytes, 32, OrdByteOrder::LittleEndian).unwrap();
        assert_eq!(le32.get(0), Some(0x0201));
    }

    #[test]
    fn get_past_end_is_none() {
        let packed = PackedInts::new(&[0xff], 4, OrdByteOrder::BigEndian).unwrap();
        assert_eq!(packed.capacity(), 2);
        assert_eq!(packed.get(2), None);
    }
}
