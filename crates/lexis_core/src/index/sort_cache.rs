//! Ordinal-indexed field value caches.
//!
//! A sort cache maps each document of a segment to an ordinal, and each
//! ordinal to a field value. Ordinals follow value order, so documents can
//! be compared by ordinal alone. Documents without a value share the null
//! ordinal, which is the last one.
//!
//! Files, per sortable field:
//!
//! - `sort-<n>.ord`: one packed ordinal per document id in `0..=doc_max`.
//! - `sort-<n>.dat`: the values. Numeric kinds store `cardinality`
//!   big-endian values (zero in the null slot); text stores the UTF-8
//!   bytes of each value back to back.
//! - `sort-<n>.ix`: text only, `cardinality + 1` big-endian `u64`
//!   offsets into `.dat`. The null slot is empty.

use crate::error::{CoreError, CoreResult};
use crate::plan::{FieldType, PrimitiveKind, Value};
use crate::store::InStream;
use lexis_codec::{OrdByteOrder, PackedInts};
use std::cmp::Ordering;

/// Shape of a field's ordinal array, from segment metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdLayout {
    /// Number of distinct ordinals, the null ordinal included.
    pub cardinality: u32,
    /// Highest document id.
    pub doc_max: u32,
    /// Ordinal of documents without a value.
    pub null_ord: Option<u32>,
    /// Bits per ordinal.
    pub ord_width: u32,
    /// Legacy arrays store 16- and 32-bit ordinals in host (little-endian)
    /// order.
    pub native_ords: bool,
}

/// The decoded value table.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValues {
    /// Text values.
    Text(Vec<String>),
    /// 32-bit integers.
    Int32(Vec<i32>),
    /// 64-bit integers.
    Int64(Vec<i64>),
    /// 32-bit floats.
    Float32(Vec<f32>),
    /// 64-bit floats.
    Float64(Vec<f64>),
}

impl SortValues {
    fn len(&self) -> usize {
        match self {
            Self::Text(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    fn get(&self, idx: usize) -> Option<Value> {
        match self {
            Self::Text(v) => v.get(idx).cloned().map(Value::Text),
            Self::Int32(v) => v.get(idx).copied().map(Value::Int32),
            Self::Int64(v) => v.get(idx).copied().map(Value::Int64),
            Self::Float32(v) => v.get(idx).copied().map(Value::Float32),
            Self::Float64(v) => v.get(idx).copied().map(Value::Float64),
        }
    }
}

/// An immutable, fully loaded sort cache for one field of one segment.
#[derive(Debug, Clone)]
pub struct SortCache {
    field: String,
    field_type: FieldType,
    layout: OrdLayout,
    ords: Vec<u8>,
    values: SortValues,
}

fn read_numeric<T>(
    dat: &[u8],
    width: usize,
    count: usize,
    decode: impl Fn(&[u8]) -> lexis_codec::CodecResult<T>,
) -> CoreResult<Vec<T>> {
    dat.chunks_exact(width)
        .take(count)
        .map(|chunk| decode(chunk).map_err(CoreError::from))
        .collect()
}

impl SortCache {
    /// Loads and validates a cache from its streams. `ix_in` is required
    /// for text fields and ignored otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the field kind has no cache
    /// representation, the width is unsupported, a stream is too short,
    /// or an ordinal is out of range.
    pub fn open(
        field: &str,
        field_type: FieldType,
        layout: OrdLayout,
        ord_in: &mut InStream,
        ix_in: Option<&mut InStream>,
        dat_in: &mut InStream,
    ) -> CoreResult<Self> {
        let bad = |msg: String| CoreError::invalid_format(format!("sort cache for '{field}': {msg}"));

        lexis_codec::check_width(layout.ord_width)
            .map_err(|_| bad(format!("invalid ord width {}", layout.ord_width)))?;
        if let Some(null_ord) = layout.null_ord {
            if null_ord >= layout.cardinality {
                return Err(bad(format!(
                    "null ord {null_ord} not below cardinality {}",
                    layout.cardinality
                )));
            }
        }

        let num_docs = layout.doc_max as usize + 1;
        let ords = ord_in.read_to_end_bytes()?;
        let needed = lexis_codec::packed_len(num_docs, layout.ord_width);
        if ords.len() < needed {
            return Err(bad(format!(
                "ord stream has {} bytes, need {needed}",
                ords.len()
            )));
        }

        let cardinality = layout.cardinality as usize;
        let dat = dat_in.read_to_end_bytes()?;
        let values = match field_type.primitive_kind() {
            PrimitiveKind::Text => {
                let ix_in = ix_in.ok_or_else(|| bad("missing ix stream".to_string()))?;
                let offsets = lexis_codec::decode_u64_array(&ix_in.read_to_end_bytes()?);
                if offsets.len() < cardinality + 1 {
                    return Err(bad(format!(
                        "ix stream has {} offsets, need {}",
                        offsets.len(),
                        cardinality + 1
                    )));
                }
                let mut texts = Vec::with_capacity(cardinality);
                for pair in offsets[..=cardinality].windows(2) {
                    let (start, end) = (pair[0] as usize, pair[1] as usize);
                    let bytes = dat
                        .get(start..end)
                        .ok_or_else(|| bad(format!("bad value span {start}..{end}")))?;
                    let text = String::from_utf8(bytes.to_vec())
                        .map_err(|e| bad(format!("bad UTF-8 at {start}: {e}")))?;
                    texts.push(text);
                }
                SortValues::Text(texts)
            }
            PrimitiveKind::Int32 => {
                SortValues::Int32(read_numeric(&dat, 4, cardinality, lexis_codec::get_i32_be)?)
            }
            PrimitiveKind::Int64 => {
                SortValues::Int64(read_numeric(&dat, 8, cardinality, lexis_codec::get_i64_be)?)
            }
            PrimitiveKind::Float32 => {
                SortValues::Float32(read_numeric(&dat, 4, cardinality, lexis_codec::get_f32_be)?)
            }
            PrimitiveKind::Float64 => {
                SortValues::Float64(read_numeric(&dat, 8, cardinality, lexis_codec::get_f64_be)?)
            }
            PrimitiveKind::Blob => {
                return Err(bad("blob fields have no sort cache".to_string()));
            }
        };
        if values.len() < cardinality {
            return Err(bad(format!(
                "value table has {} entries, need {cardinality}",
                values.len()
            )));
        }

        let cache = Self {
            field: field.to_string(),
            field_type,
            layout,
            ords,
            values,
        };
        let packed = cache.packed()?;
        for doc_id in 0..num_docs {
            let ord = packed.get(doc_id).unwrap_or(u32::MAX);
            if ord >= layout.cardinality && Some(ord) != layout.null_ord {
                return Err(bad(format!("doc {doc_id} has ordinal {ord}")));
            }
        }
        Ok(cache)
    }

    fn packed(&self) -> CoreResult<PackedInts<'_>> {
        let order = if self.layout.native_ords {
            OrdByteOrder::LittleEndian
        } else {
            OrdByteOrder::BigEndian
        };
        Ok(PackedInts::new(&self.ords, self.layout.ord_width, order)?)
    }

    /// Ordinal of `doc_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `doc_id` exceeds
    /// `doc_max`.
    pub fn ordinal(&self, doc_id: u32) -> CoreResult<u32> {
        if doc_id > self.layout.doc_max {
            return Err(CoreError::invalid_argument(format!(
                "doc id {doc_id} out of range for '{}' (doc_max {})",
                self.field, self.layout.doc_max
            )));
        }
        self.packed()?
            .get(doc_id as usize)
            .ok_or_else(|| CoreError::invalid_format(format!("missing ordinal for doc {doc_id}")))
    }

    /// Value for `ord`; `None` for the null ordinal or an out-of-range
    /// ordinal.
    #[must_use]
    pub fn value(&self, ord: u32) -> Option<Value> {
        if Some(ord) == self.layout.null_ord || ord >= self.layout.cardinality {
            return None;
        }
        self.values.get(ord as usize)
    }

    /// Finds the greatest ordinal whose value is `<= target`, with a
    /// missing target or value sorting last. Returns `None` if `target`
    /// sorts before every value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if `target` has another kind.
    pub fn find(&self, target: Option<&Value>) -> CoreResult<Option<u32>> {
        if let Some(target) = target {
            self.field_type.check_value(target)?;
        }
        let mut lo: i64 = 0;
        let mut hi: i64 = i64::from(self.layout.cardinality) - 1;
        let mut result = None;
        while hi >= lo {
            let mid = lo + (hi - lo) / 2;
            let value = self.value(mid as u32);
            match self.field_type.null_back_compare(target, value.as_ref())? {
                Ordering::Less => hi = mid - 1,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => {
                    result = Some(mid);
                    break;
                }
            }
        }
        if hi < 0 {
            return Ok(None);
        }
        Ok(Some(result.unwrap_or(hi) as u32))
    }

    /// Name of the cached field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Kind of the cached values.
    #[must_use]
    pub fn kind(&self) -> PrimitiveKind {
        self.field_type.primitive_kind()
    }

    /// Number of ordinals, the null ordinal included.
    #[must_use]
    pub fn cardinality(&self) -> u32 {
        self.layout.cardinality
    }

    /// Highest document id covered.
    #[must_use]
    pub fn doc_max(&self) -> u32 {
        self.layout.doc_max
    }

    /// The null ordinal, if the field has documents without a value.
    #[must_use]
    pub fn null_ord(&self) -> Option<u32> {
        self.layout.null_ord
    }

    /// Bits per ordinal.
    #[must_use]
    pub fn ord_width(&self) -> u32 {
        self.layout.ord_width
    }

    /// Whether 16- and 32-bit ordinals are read in legacy host order.
    #[must_use]
    pub fn native_ords(&self) -> bool {
        self.layout.native_ords
    }

    /// The value table.
    #[must_use]
    pub fn values(&self) -> &SortValues {
        &self.values
    }
}
