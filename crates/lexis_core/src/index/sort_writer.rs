//! Writes sort caches for a segment.
//!
//! Values are fed per document, sorted through [`SortExternal`], and
//! numbered in value order. Documents without a value get the null
//! ordinal, which comes after every real value.

use crate::config::SortConfig;
use crate::error::{CoreError, CoreResult};
use crate::index::segment::Segment;
use crate::plan::{FieldType, PrimitiveKind, Schema, Value};
use crate::store::OutStream;
use crate::util::{SortExternal, SortItem};
use lexis_codec::PackedIntsWriter;
use lexis_storage::Folder;
use serde_json::{json, Map};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Current sort cache format.
pub const SORT_FORMAT: i64 = 3;

const UNSET: u32 = u32::MAX;

#[derive(Debug)]
struct SortEntry {
    value: Value,
    doc_id: u32,
}

impl PartialEq for SortEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortEntry {}

impl PartialOrd for SortEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.doc_id.cmp(&other.doc_id))
    }
}

fn kind_tag(kind: PrimitiveKind) -> u8 {
    match kind {
        PrimitiveKind::Text => 0,
        PrimitiveKind::Blob => 1,
        PrimitiveKind::Int32 => 2,
        PrimitiveKind::Int64 => 3,
        PrimitiveKind::Float32 => 4,
        PrimitiveKind::Float64 => 5,
    }
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Text(s) => out.extend_from_slice(s.as_bytes()),
        Value::Blob(b) => out.extend_from_slice(b),
        Value::Int32(v) => lexis_codec::put_i32_be(out, *v),
        Value::Int64(v) => lexis_codec::put_i64_be(out, *v),
        Value::Float32(v) => lexis_codec::put_f32_be(out, *v),
        Value::Float64(v) => lexis_codec::put_f64_be(out, *v),
    }
}

impl SortItem for SortEntry {
    fn mem_size(&self) -> usize {
        self.value.mem_size() + 4
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(kind_tag(self.value.kind()));
        lexis_codec::put_u32_be(out, self.doc_id);
        encode_value(&self.value, out);
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < 5 {
            return Err(CoreError::invalid_format("truncated sort entry"));
        }
        let doc_id = lexis_codec::get_u32_be(&bytes[1..5])?;
        let body = &bytes[5..];
        let value = match bytes[0] {
            0 => Value::Text(
                String::from_utf8(body.to_vec())
                    .map_err(|e| CoreError::invalid_format(format!("sort entry text: {e}")))?,
            ),
            1 => Value::Blob(body.to_vec()),
            2 => Value::Int32(lexis_codec::get_i32_be(body)?),
            3 => Value::Int64(lexis_codec::get_i64_be(body)?),
            4 => Value::Float32(lexis_codec::get_f32_be(body)?),
            5 => Value::Float64(lexis_codec::get_f64_be(body)?),
            tag => {
                return Err(CoreError::invalid_format(format!(
                    "unknown sort entry tag {tag}"
                )))
            }
        };
        Ok(Self { value, doc_id })
    }
}

/// What a finished field contributes to the segment's sort metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortFieldStats {
    /// Number of ordinals, the null ordinal included.
    pub cardinality: u32,
    /// The null ordinal, if some document has no value.
    pub null_ord: Option<u32>,
    /// Bits per ordinal.
    pub ord_width: u32,
}

/// Collects one field's values and writes its sort cache files.
#[derive(Debug)]
pub struct SortFieldWriter {
    field: String,
    field_type: FieldType,
    sorter: SortExternal<SortEntry>,
    max_doc_id: u32,
}

impl SortFieldWriter {
    /// Creates a writer for a sortable field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotSortable`] if the field isn't sortable or is
    /// a blob field.
    pub fn new(field: &str, field_type: FieldType, config: SortConfig) -> CoreResult<Self> {
        if !field_type.is_sortable() || field_type.primitive_kind() == PrimitiveKind::Blob {
            return Err(CoreError::not_sortable(field));
        }
        Ok(Self {
            field: field.to_string(),
            field_type,
            sorter: SortExternal::new(config),
            max_doc_id: 0,
        })
    }

    /// Records the value of `doc_id`. `None` marks a document without a
    /// value, which is also what documents never added get.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for document id 0,
    /// [`CoreError::TypeMismatch`] for a value of another kind, or an
    /// error if a spill fails.
    pub fn add(&mut self, doc_id: u32, value: Option<Value>) -> CoreResult<()> {
        if doc_id == 0 {
            return Err(CoreError::invalid_argument("document ids start at 1"));
        }
        self.max_doc_id = self.max_doc_id.max(doc_id);
        if let Some(value) = value {
            self.field_type.check_value(&value)?;
            self.sorter.feed(SortEntry { value, doc_id })?;
        }
        Ok(())
    }

    /// Writes `sort-<n>.ord`, `.dat` and (for text) `.ix` into the
    /// segment directory. Returns `None` if the segment has no documents.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if a document id exceeds the
    /// segment's `doc_max` or a document got two values, or an error if a
    /// file can't be written.
    pub fn finish(
        mut self,
        folder: &dyn Folder,
        segment: &Segment,
    ) -> CoreResult<Option<SortFieldStats>> {
        let doc_max = segment.doc_max();
        if self.max_doc_id > doc_max {
            return Err(CoreError::invalid_argument(format!(
                "doc id {} of '{}' exceeds doc_max {doc_max}",
                self.max_doc_id, self.field
            )));
        }
        if doc_max == 0 {
            return Ok(None);
        }
        let field_num = match segment.field_num(&self.field) {
            0 => return Err(CoreError::missing_field(&self.field)),
            num => num,
        };
        if !folder.is_directory(segment.name()) {
            folder.mkdir(segment.name())?;
        }

        let path = |ext: &str| segment.file_path(&format!("sort-{field_num}.{ext}"));
        let is_text = self.field_type.primitive_kind() == PrimitiveKind::Text;
        let mut dat_out = OutStream::open(folder, &path("dat"))?;
        let mut ix_out = if is_text {
            Some(OutStream::open(folder, &path("ix"))?)
        } else {
            None
        };

        self.sorter.flip()?;
        let mut ords = vec![UNSET; doc_max as usize + 1];
        let mut distinct: u32 = 0;
        let mut last: Option<Value> = None;
        let mut buf = Vec::new();
        while let Some(entry) = self.sorter.fetch()? {
            if last.as_ref() != Some(&entry.value) {
                if let Some(ix_out) = ix_out.as_mut() {
                    ix_out.write_u64_be(dat_out.tell())?;
                }
                buf.clear();
                encode_value(&entry.value, &mut buf);
                dat_out.write_bytes(&buf)?;
                distinct += 1;
                last = Some(entry.value);
            }
            let slot = &mut ords[entry.doc_id as usize];
            if *slot != UNSET {
                return Err(CoreError::invalid_argument(format!(
                    "doc {} has more than one value for '{}'",
                    entry.doc_id, self.field
                )));
            }
            *slot = distinct - 1;
        }

        let null_ord = if ords[1..].contains(&UNSET) {
            // The null slot holds no bytes for text and zero for numbers.
            if let Some(ix_out) = ix_out.as_mut() {
                ix_out.write_u64_be(dat_out.tell())?;
            } else {
                buf.clear();
                encode_value(&Value::min_of(self.field_type.primitive_kind()), &mut buf);
                buf.fill(0);
                dat_out.write_bytes(&buf)?;
            }
            Some(distinct)
        } else {
            None
        };
        if let Some(ix_out) = ix_out.as_mut() {
            ix_out.write_u64_be(dat_out.tell())?;
            ix_out.flush()?;
        }
        dat_out.flush()?;

        let cardinality = distinct + u32::from(null_ord.is_some());
        let ord_width = lexis_codec::ord_width_for(cardinality);
        let mut packed = PackedIntsWriter::new(ord_width)?;
        for ord in ords {
            packed.push(if ord == UNSET { null_ord.unwrap_or(0) } else { ord });
        }
        let mut ord_out = OutStream::open(folder, &path("ord"))?;
        ord_out.write_bytes(&packed.into_bytes())?;
        ord_out.flush()?;

        debug!(field = %self.field, cardinality, ord_width, "wrote sort cache");
        Ok(Some(SortFieldStats {
            cardinality,
            null_ord,
            ord_width,
        }))
    }
}

/// Writes the sort caches of every sortable field in a segment.
#[derive(Debug)]
pub struct SortWriter {
    schema: Schema,
    config: SortConfig,
    fields: BTreeMap<String, SortFieldWriter>,
}

impl SortWriter {
    /// Creates a writer.
    #[must_use]
    pub fn new(schema: Schema, config: SortConfig) -> Self {
        Self {
            schema,
            config,
            fields: BTreeMap::new(),
        }
    }

    /// Records the value of `field` for `doc_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotSortable`] if the field is unknown or not
    /// sortable, or any error from [`SortFieldWriter::add`].
    pub fn add_value(&mut self, field: &str, doc_id: u32, value: Option<Value>) -> CoreResult<()> {
        if !self.fields.contains_key(field) {
            let field_type = *self
                .schema
                .fetch_type(field)
                .ok_or_else(|| CoreError::not_sortable(field))?;
            let writer = SortFieldWriter::new(field, field_type, self.config.clone())?;
            self.fields.insert(field.to_string(), writer);
        }
        match self.fields.get_mut(field) {
            Some(writer) => writer.add(doc_id, value),
            None => Err(CoreError::not_sortable(field)),
        }
    }

    /// Writes every field's files and records `format`, `counts`,
    /// `null_ords` and `ord_widths` in the segment's `"sort"` metadata.
    /// Fields are registered with the segment as needed.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`SortFieldWriter::finish`].
    pub fn finish(self, folder: &dyn Folder, segment: &mut Segment) -> CoreResult<()> {
        let mut counts = Map::new();
        let mut null_ords = Map::new();
        let mut ord_widths = Map::new();
        for (field, writer) in self.fields {
            segment.add_field(&field);
            let Some(stats) = writer.finish(folder, segment)? else {
                continue;
            };
            counts.insert(field.clone(), json!(stats.cardinality));
            null_ords.insert(
                field.clone(),
                json!(stats.null_ord.map_or(-1, i64::from)),
            );
            ord_widths.insert(field, json!(stats.ord_width));
        }
        segment.store_metadata(
            "sort",
            json!({
                "format": SORT_FORMAT,
                "counts": counts,
                "null_ords": null_ords,
                "ord_widths": ord_widths,
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Architecture;
    use lexis_storage::RamFolder;

    fn schema() -> Schema {
        let mut schema = Schema::new(Architecture::default());
        schema
            .spec_field("title", FieldType::new(PrimitiveKind::Text).sortable(true))
            .spec_field("year", FieldType::new(PrimitiveKind::Int32).sortable(true))
            .spec_field("body", FieldType::new(PrimitiveKind::Text));
        schema
    }

    #[test]
    fn entries_survive_spilling() {
        let entry = SortEntry {
            value: Value::Float64(-2.5),
            doc_id: 9,
        };
        let mut bytes = Vec::new();
        entry.encode(&mut bytes);
        assert_eq!(bytes[0], 5);
        assert_eq!(SortEntry::decode(&bytes).unwrap(), entry);
        assert!(SortEntry::decode(&[9, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn writes_ordinals_and_metadata() {
        let folder = RamFolder::new();
        let mut segment = Segment::new("seg_1").unwrap();
        segment.set_doc_max(4);

        let mut writer = SortWriter::new(schema(), SortConfig::new().mem_thresh(16));
        for (doc, title) in [(1, "pear"), (2, "apple"), (4, "pear")] {
            writer.add_value("title", doc, Some(title.into())).unwrap();
        }
        for doc in 1..=4 {
            writer.add_value("year", doc, Some(Value::Int32(2000 + doc as i32))).unwrap();
        }
        writer.finish(&folder, &mut segment).unwrap();

        let meta = segment.fetch_metadata("sort").unwrap();
        assert_eq!(meta["format"], 3);
        assert_eq!(meta["counts"]["title"], 3);
        assert_eq!(meta["null_ords"]["title"], 2);
        assert_eq!(meta["ord_widths"]["title"], 2);
        assert_eq!(meta["counts"]["year"], 4);
        assert_eq!(meta["null_ords"]["year"], -1);

        let title_num = segment.field_num("title");
        let ix = folder.slurp_file(&format!("seg_1/sort-{title_num}.ix")).unwrap();
        assert_eq!(lexis_codec::decode_u64_array(&ix), vec![0, 5, 9, 9]);
        let dat = folder.slurp_file(&format!("seg_1/sort-{title_num}.dat")).unwrap();
        assert_eq!(dat, b"applepear");
        // Docs 0..=4 get ords null, pear, apple, null, pear.
        let ord = folder.slurp_file(&format!("seg_1/sort-{title_num}.ord")).unwrap();
        assert_eq!(ord, vec![0b1000_0110, 0b01]);
    }

    #[test]
    fn rejects_bad_input() {
        let mut writer = SortWriter::new(schema(), SortConfig::default());
        assert!(matches!(
            writer.add_value("body", 1, Some("x".into())),
            Err(CoreError::NotSortable { .. })
        ));
        assert!(matches!(
            writer.add_value("missing", 1, None),
            Err(CoreError::NotSortable { .. })
        ));
        assert!(writer.add_value("year", 0, Some(Value::Int32(1))).is_err());
        assert!(matches!(
            writer.add_value("year", 1, Some("x".into())),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_and_out_of_range_docs_fail() {
        let folder = RamFolder::new();
        let mut segment = Segment::new("seg_2").unwrap();
        segment.set_doc_max(2);

        let mut writer = SortWriter::new(schema(), SortConfig::default());
        writer.add_value("year", 1, Some(Value::Int32(1))).unwrap();
        writer.add_value("year", 1, Some(Value::Int32(2))).unwrap();
        assert!(matches!(
            writer.finish(&folder, &mut segment),
            Err(CoreError::InvalidArgument { .. })
        ));

        let mut writer = SortWriter::new(schema(), SortConfig::default());
        writer.add_value("year", 3, Some(Value::Int32(1))).unwrap();
        assert!(writer.finish(&folder, &mut segment).is_err());
    }
}
