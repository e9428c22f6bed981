//! Known-answer vectors for the Lexis on-disk encodings.
//!
//! These vectors pin the exact bytes of each record type so that files
//! written by one build stay readable by every other.

use serde::{Deserialize, Serialize};

/// A test vector shared between encoders and decoders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input values, encoder specific.
    pub input: Vec<u64>,
    /// Expected output data (hex-encoded).
    pub expected_hex: String,
}

fn vector(id: &str, description: &str, input: &[u64], expected_hex: &str) -> TestVector {
    TestVector {
        id: id.into(),
        description: description.into(),
        input: input.to_vec(),
        expected_hex: expected_hex.into(),
    }
}

/// Compressed 32-bit integer vectors. Input: `[value]`.
pub fn c32_vectors() -> Vec<TestVector> {
    vec![
        vector("c32_0", "zero", &[0], "00"),
        vector("c32_127", "largest 1-byte value", &[127], "7f"),
        vector("c32_128", "smallest 2-byte value", &[128], "8100"),
        vector("c32_300", "two bytes", &[300], "822c"),
        vector("c32_16384", "smallest 3-byte value", &[16_384], "818000"),
        vector("c32_max", "u32::MAX", &[u64::from(u32::MAX)], "8fffffff7f"),
    ]
}

/// Posting vectors. Input: `[prev_doc_id, doc_id, freq]`, no payload.
pub fn posting_vectors() -> Vec<TestVector> {
    vec![
        vector("posting_freq1", "frequency one folds into the doc code", &[10, 13, 1], "07"),
        vector("posting_freq2", "explicit frequency", &[10, 13, 2], "0602"),
        vector("posting_first", "first posting of a term", &[0, 1, 1], "03"),
        vector("posting_wide_delta", "delta needing two bytes", &[0, 64, 1], "8101"),
        vector("posting_wide_freq", "frequency needing two bytes", &[0, 2, 200], "048148"),
    ]
}

/// Skip record vectors. Input: `[last_doc, last_pos, doc, pos]`.
pub fn skip_vectors() -> Vec<TestVector> {
    vec![
        vector("skip_first", "first record of a term", &[0, 0, 48, 130], "308102"),
        vector("skip_next", "deltas against the previous record", &[48, 130, 96, 260], "308102"),
        vector("skip_same_pos", "no bytes between skip points", &[5, 9, 6, 9], "0100"),
    ]
}

/// Packed ordinal vectors. Input: `[width, ords...]`, big-endian order.
pub fn ord_vectors() -> Vec<TestVector> {
    vec![
        vector("ords_w1", "lowest entry in the lowest bit", &[1, 1, 0, 1, 1], "0d"),
        vector("ords_w2", "four entries per byte", &[2, 2, 1, 0, 2, 1], "8601"),
        vector("ords_w4", "two entries per byte", &[4, 3, 12], "c3"),
        vector("ords_w8", "one byte each", &[8, 7, 255], "07ff"),
        vector("ords_w16", "big-endian 16-bit", &[16, 258], "0102"),
        vector("ords_w32", "big-endian 32-bit", &[32, 65_536], "00010000"),
    ]
}

/// Ordinal width table. Input: `[cardinality, width]`, no bytes.
pub fn ord_width_vectors() -> Vec<[u32; 2]> {
    vec![
        [0, 1],
        [2, 1],
        [3, 2],
        [4, 2],
        [5, 4],
        [15, 4],
        [16, 8],
        [255, 8],
        [256, 16],
        [65_535, 16],
        [65_536, 32],
    ]
}

/// Encodes bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes lowercase or uppercase hex, returning None on malformed input.
pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_codec::{OrdByteOrder, PackedInts, PackedIntsWriter};
    use lexis_core::index::{decode_posting, encode_posting, PayloadLen, SkipStepper};
    use std::io::Cursor;

    #[test]
    fn hex_helpers() {
        assert_eq!(to_hex(&[0, 0xab, 0x10]), "00ab10");
        assert_eq!(from_hex("00AB10"), Some(vec![0, 0xab, 0x10]));
        assert_eq!(from_hex("abc"), None);
        assert_eq!(from_hex("zz"), None);
    }

    #[test]
    fn c32_vectors_match() {
        for v in c32_vectors() {
            let mut out = Vec::new();
            lexis_codec::encode_c32(v.input[0] as u32, &mut out);
            assert_eq!(to_hex(&out), v.expected_hex, "{}", v.id);
            let (decoded, len) = lexis_codec::decode_c32(&out).unwrap();
            assert_eq!((u64::from(decoded), len), (v.input[0], out.len()), "{}", v.id);
        }
    }

    #[test]
    fn posting_vectors_match() {
        for v in posting_vectors() {
            let [prev, doc, freq] = [v.input[0], v.input[1], v.input[2]].map(|n| n as u32);
            let bytes = encode_posting(prev, doc, freq, &[]).unwrap();
            assert_eq!(to_hex(&bytes), v.expected_hex, "{}", v.id);
            let posting = decode_posting(prev, &mut Cursor::new(bytes), PayloadLen::None).unwrap();
            assert_eq!((posting.doc_id, posting.freq), (doc, freq), "{}", v.id);
        }
    }

    #[test]
    fn skip_vectors_match() {
        for v in skip_vectors() {
            let mut stepper = SkipStepper::new();
            stepper.set_id_and_filepos(v.input[2] as u32, v.input[3]);
            let mut out = Vec::new();
            stepper
                .write_record(&mut out, v.input[0] as u32, v.input[1])
                .unwrap();
            assert_eq!(to_hex(&out), v.expected_hex, "{}", v.id);

            let mut reader = SkipStepper::new();
            reader.set_id_and_filepos(v.input[0] as u32, v.input[1]);
            reader.read_record(&mut Cursor::new(out)).unwrap();
            assert_eq!(reader, stepper, "{}", v.id);
        }
    }

    #[test]
    fn ord_vectors_match() {
        for v in ord_vectors() {
            let width = v.input[0] as u32;
            let ords: Vec<u32> = v.input[1..].iter().map(|&n| n as u32).collect();
            let mut writer = PackedIntsWriter::new(width).unwrap();
            for &ord in &ords {
                writer.push(ord);
            }
            let bytes = writer.into_bytes();
            assert_eq!(to_hex(&bytes), v.expected_hex, "{}", v.id);

            let packed = PackedInts::new(&bytes, width, OrdByteOrder::BigEndian).unwrap();
            for (i, &ord) in ords.iter().enumerate() {
                assert_eq!(packed.get(i), Some(ord), "{} entry {i}", v.id);
            }
        }
    }

    #[test]
    fn ord_width_table() {
        for [cardinality, width] in ord_width_vectors() {
            assert_eq!(lexis_codec::ord_width_for(cardinality), width, "{cardinality}");
        }
    }

    #[test]
    fn vectors_serialize_to_json() {
        let json = serde_json::to_string(&c32_vectors()).unwrap();
        let back: Vec<TestVector> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), c32_vectors().len());
    }
}
