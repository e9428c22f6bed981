//! Fuzz testing harnesses for Lexis.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks. Every target feeds arbitrary bytes to a
//! decoder, which must return an error rather than panic.

use crate::fixtures::FIXTURE_FIELD;
use lexis_core::index::{
    decode_posting, OrdLayout, PayloadLen, SkipStepper, SortCache, SortReader,
};
use lexis_core::store::{InStream, LockRecord};
use lexis_core::{
    Architecture, FieldType, LexIndex, PrimitiveKind, Schema, Segment, Value,
};
use lexis_storage::{Folder, InMemoryBackend, RamFolder};
use std::io::Cursor;
use std::sync::Arc;

fn in_stream(data: &[u8]) -> Option<InStream> {
    InStream::new("fuzz", Box::new(InMemoryBackend::with_data(data.to_vec()))).ok()
}

/// Fuzz target for posting decoding.
///
/// Decodes postings until the input runs out or is rejected; decoded doc
/// ids must keep increasing.
pub fn fuzz_posting_decode(data: &[u8]) {
    let payload_len = match data.first().map(|b| b % 3) {
        Some(0) => PayloadLen::None,
        Some(1) => PayloadLen::Fixed(2),
        _ => PayloadLen::PerOccurrence(1),
    };
    let mut input = Cursor::new(data.get(1..).unwrap_or_default());
    let mut prev = 0;
    while let Ok(posting) = decode_posting(prev, &mut input, payload_len) {
        assert!(posting.doc_id > prev, "doc ids must increase");
        assert!(posting.freq >= 1, "frequency must be positive");
        prev = posting.doc_id;
    }
}

/// Fuzz target for skip records.
pub fn fuzz_skip_records(data: &[u8]) {
    let mut input = Cursor::new(data);
    let mut stepper = SkipStepper::new();
    let mut last = stepper;
    while stepper.read_record(&mut input).is_ok() {
        assert!(stepper.doc_id() >= last.doc_id());
        assert!(stepper.filepos() >= last.filepos());
        last = stepper;
    }
}

/// Fuzz target for key frames of every term kind.
pub fn fuzz_key_frames(data: &[u8]) {
    for kind in [
        PrimitiveKind::Text,
        PrimitiveKind::Blob,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Float32,
        PrimitiveKind::Float64,
    ] {
        let Some(mut input) = in_stream(data) else {
            return;
        };
        let mut stepper = FieldType::new(kind).make_term_stepper();
        while stepper.read_key_frame(&mut input).is_ok() {
            assert_eq!(stepper.value().map(Value::kind), Some(kind));
        }
    }
}

/// Fuzz target for opening and seeking a lexicon index.
///
/// The first half of the input becomes the `.ixix` file, the rest the
/// `.ix` file.
pub fn fuzz_lex_index(data: &[u8]) {
    let folder = RamFolder::new();
    let mut schema = Schema::new(Architecture::new().index_interval(4));
    schema.spec_field(FIXTURE_FIELD, FieldType::new(PrimitiveKind::Int32));
    let Ok(mut segment) = Segment::new("seg_1") else {
        return;
    };
    let num = segment.add_field(FIXTURE_FIELD);
    let (ixix, ix) = data.split_at(data.len() / 2);
    if folder.mkdir("seg_1").is_err()
        || folder.spew_file(&format!("seg_1/lexicon-{num}.ixix"), ixix).is_err()
        || folder.spew_file(&format!("seg_1/lexicon-{num}.ix"), ix).is_err()
    {
        return;
    }
    let Ok(mut index) = LexIndex::open(&schema, &folder, &segment, FIXTURE_FIELD) else {
        return;
    };
    for target in [None, Some(Value::Int32(0)), Some(Value::Int32(i32::MAX))] {
        if index.seek(target.as_ref()).is_ok() {
            assert!(index.tick() < index.size().max(1));
        }
    }
}

/// Fuzz target for sort cache construction over arbitrary streams.
pub fn fuzz_sort_cache(data: &[u8]) {
    if data.len() < 3 {
        return;
    }
    let kind = if data[0] % 2 == 0 {
        PrimitiveKind::Text
    } else {
        PrimitiveKind::Int32
    };
    let layout = OrdLayout {
        cardinality: u32::from(data[1] % 8) + 1,
        doc_max: u32::from(data[2] % 16),
        null_ord: None,
        ord_width: lexis_codec::VALID_WIDTHS[usize::from(data[0] >> 1) % 6],
        native_ords: data[0] & 0x80 != 0,
    };
    let rest = &data[3..];
    let third = rest.len() / 3;
    let (Some(mut ord_in), Some(mut ix_in), Some(mut dat_in)) = (
        in_stream(&rest[..third]),
        in_stream(&rest[third..2 * third]),
        in_stream(&rest[2 * third..]),
    ) else {
        return;
    };
    let field_type = FieldType::new(kind).sortable(true);
    if let Ok(cache) = SortCache::open(
        FIXTURE_FIELD,
        field_type,
        layout,
        &mut ord_in,
        Some(&mut ix_in),
        &mut dat_in,
    ) {
        for doc_id in 0..=layout.doc_max {
            let ord = cache.ordinal(doc_id).expect("ordinal within doc_max");
            assert!(ord < layout.cardinality);
        }
    }
}

/// Fuzz target for segment sort metadata.
pub fn fuzz_sort_metadata(data: &[u8]) {
    let Ok(meta) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let mut schema = Schema::new(Architecture::default());
    schema.spec_field(FIXTURE_FIELD, FieldType::new(PrimitiveKind::Int64).sortable(true));
    let Ok(mut segment) = Segment::new("seg_1") else {
        return;
    };
    segment.add_field(FIXTURE_FIELD);
    segment.store_metadata("sort", meta);
    if let Ok(reader) = SortReader::open(Arc::new(schema), Arc::new(RamFolder::new()), segment) {
        let _ = reader.fetch_sort_cache(FIXTURE_FIELD);
    }
}

/// Fuzz target for lock records.
pub fn fuzz_lock_record(data: &[u8]) {
    if let Ok(record) = serde_json::from_slice::<LockRecord>(data) {
        let encoded = serde_json::to_vec(&record).expect("lock records encode");
        let decoded: LockRecord = serde_json::from_slice(&encoded).expect("lock records decode");
        assert_eq!(record, decoded);
    }
}
