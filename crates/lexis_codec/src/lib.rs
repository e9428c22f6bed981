//! # Lexis Codec
//!
//! Low-level number encodings shared by every Lexis index file.
//!
//! - **Compressed integers** (`C32`, `C64`): seven bits per byte, most
//!   significant group first, high bit set on every byte but the last.
//!   Used for document frequencies, file offsets, posting deltas and
//!   skip deltas.
//! - **Fixed-width big-endian** numbers: `.ixix` offsets, numeric key
//!   frames and numeric sort-cache values.
//! - **Packed ordinals**: 1/2/4/8/16/32-bit arrays backing sort caches.
//!
//! ## Usage
//!
//! ```
//! use lexis_codec::{decode_c32, encode_c32};
//!
//! let mut bytes = Vec::new();
//! encode_c32(300, &mut bytes);
//! assert_eq!(bytes, vec![0x82, 0x2c]);
//! assert_eq!(decode_c32(&bytes).unwrap(), (300, 2));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod fixed;
mod packed;
mod varint;

pub use error::{CodecError, CodecResult};
pub use fixed::{
    decode_u64_array, get_f32_be, get_f64_be, get_i32_be, get_i64_be, get_u16_be, get_u32_be,
    get_u64_be, put_f32_be, put_f64_be, put_i32_be, put_i64_be, put_u16_be, put_u32_be,
    put_u64_be,
};
pub use packed::{
    check_width, ord_width_for, packed_len, OrdByteOrder, PackedInts, PackedIntsWriter,
    VALID_WIDTHS,
};
pub use varint::{
    c64_len, decode_c32, decode_c64, encode_c32, encode_c64, read_c32, read_c64, write_c32,
    write_c64, MAX_C32_LEN, MAX_C64_LEN,
};
