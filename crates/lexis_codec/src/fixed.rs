//! Fixed-width big-endian integers and floats.
//!
//! Every fixed-width number in an index file is big-endian: the `.ixix`
//! offsets, numeric term key frames and numeric sort-cache values.

use crate::error::{CodecError, CodecResult};
use bytes::{Buf, BufMut};

macro_rules! be_codec {
    ($get:ident, $put:ident, $ty:ty, $buf_get:ident, $buf_put:ident) => {
        #[doc = concat!("Decodes a big-endian `", stringify!($ty), "` from the front of `bytes`.")]
        ///
        /// # Errors
        ///
        /// Returns [`CodecError::UnexpectedEof`] if `bytes` is too short.
        pub fn $get(bytes: &[u8]) -> CodecResult<$ty> {
            let mut buf = bytes;
            if buf.remaining() < std::mem::size_of::<$ty>() {
                return Err(CodecError::UnexpectedEof);
            }
            Ok(buf.$buf_get())
        }

        #[doc = concat!("Appends a big-endian `", stringify!($ty), "` to `out`.")]
        pub fn $put(out: &mut Vec<u8>, value: $ty) {
            out.$buf_put(value);
        }
    };
}

be_codec!(get_u16_be, put_u16_be, u16, get_u16, put_u16);
be_codec!(get_u32_be, put_u32_be, u32, get_u32, put_u32);
be_codec!(get_u64_be, put_u64_be, u64, get_u64, put_u64);
be_codec!(get_i32_be, put_i32_be, i32, get_i32, put_i32);
be_codec!(get_i64_be, put_i64_be, i64, get_i64, put_i64);
be_codec!(get_f32_be, put_f32_be, f32, get_f32, put_f32);
be_codec!(get_f64_be, put_f64_be, f64, get_f64, put_f64);

/// Decodes a flat array of big-endian `u64` values.
///
/// Trailing bytes that do not fill a whole entry are ignored, so the
/// result has `floor(bytes.len() / 8)` entries.
#[must_use]
pub fn decode_u64_array(bytes: &[u8]) -> Vec<u64> {
    let mut buf = bytes;
    let mut values = Vec::with_capacity(bytes.len() / 8);
    while buf.remaining() >= 8 {
        values.push(buf.get_u64());
    }
    values
}
