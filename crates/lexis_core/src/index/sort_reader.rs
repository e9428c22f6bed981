//! Opens a segment's sort caches on demand.

use crate::error::{CoreError, CoreResult};
use crate::index::segment::Segment;
use crate::index::sort_cache::{OrdLayout, SortCache};
use crate::plan::{PrimitiveKind, Schema};
use crate::store::InStream;
use lexis_storage::Folder;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Oldest sort cache format still readable. Format 2 stores 16- and
/// 32-bit ordinals in host order.
pub const MIN_SORT_FORMAT: i64 = 2;
/// Newest sort cache format.
pub const MAX_SORT_FORMAT: i64 = 3;

/// Lazily builds and caches [`SortCache`]s for one segment.
pub struct SortReader {
    schema: Arc<Schema>,
    folder: Arc<dyn Folder>,
    segment: Segment,
    format: i64,
    counts: HashMap<String, i64>,
    null_ords: HashMap<String, i64>,
    ord_widths: HashMap<String, i64>,
    caches: Mutex<HashMap<String, Arc<SortCache>>>,
}

impl fmt::Debug for SortReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortReader")
            .field("segment", &self.segment.name())
            .field("format", &self.format)
            .field("counts", &self.counts)
            .finish_non_exhaustive()
    }
}

fn int_map(meta: &serde_json::Value, key: &str) -> CoreResult<HashMap<String, i64>> {
    let Some(entry) = meta.get(key) else {
        return Ok(HashMap::new());
    };
    let obj = entry
        .as_object()
        .ok_or_else(|| CoreError::invalid_format(format!("sort '{key}' isn't an object")))?;
    obj.iter()
        .map(|(field, value)| {
            value
                .as_i64()
                .map(|n| (field.clone(), n))
                .ok_or_else(|| {
                    CoreError::invalid_format(format!("sort '{key}' entry for '{field}' isn't an integer"))
                })
        })
        .collect()
}

impl SortReader {
    /// Reads the segment's `"sort"` metadata. A segment without it has no
    /// sort caches and reports format 0.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the format is missing or
    /// unsupported, or if `counts`, `null_ords` or `ord_widths` is
    /// malformed.
    pub fn open(schema: Arc<Schema>, folder: Arc<dyn Folder>, segment: Segment) -> CoreResult<Self> {
        let (format, counts, null_ords, ord_widths) = match segment.fetch_metadata("sort") {
            None => (0, HashMap::new(), HashMap::new(), HashMap::new()),
            Some(meta) => {
                let format = meta
                    .get("format")
                    .ok_or_else(|| CoreError::invalid_format("missing sort format"))?
                    .as_i64()
                    .ok_or_else(|| CoreError::invalid_format("sort format isn't an integer"))?;
                if !(MIN_SORT_FORMAT..=MAX_SORT_FORMAT).contains(&format) {
                    return Err(CoreError::invalid_format(format!(
                        "unsupported sort cache format {format}"
                    )));
                }
                if meta.get("counts").is_none() {
                    return Err(CoreError::invalid_format("missing sort counts"));
                }
                (
                    format,
                    int_map(meta, "counts")?,
                    int_map(meta, "null_ords")?,
                    int_map(meta, "ord_widths")?,
                )
            }
        };
        Ok(Self {
            schema,
            folder,
            segment,
            format,
            counts,
            null_ords,
            ord_widths,
            caches: Mutex::new(HashMap::new()),
        })
    }

    /// The sort cache format, or 0 if the segment has none.
    #[must_use]
    pub fn format(&self) -> i64 {
        self.format
    }

    /// The segment this reader belongs to.
    #[must_use]
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Returns the sort cache for `field`, building it on first use.
    /// Returns `None` if the segment holds no values for the field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotSortable`] if the field is unknown or not
    /// sortable, [`CoreError::InvalidFormat`] for bad metadata or cache
    /// files, or a storage error if a file can't be opened.
    pub fn fetch_sort_cache(&self, field: &str) -> CoreResult<Option<Arc<SortCache>>> {
        if let Some(cache) = self.caches.lock().get(field) {
            return Ok(Some(Arc::clone(cache)));
        }

        let count = self.counts.get(field).copied().unwrap_or(0);
        if count == 0 {
            return Ok(None);
        }
        let field_type = *self
            .schema
            .fetch_type(field)
            .filter(|ty| ty.is_sortable())
            .ok_or_else(|| CoreError::not_sortable(field))?;
        let cardinality = u32::try_from(count)
            .map_err(|_| CoreError::invalid_format(format!("bad sort count {count} for '{field}'")))?;
        let null_ord = match self.null_ords.get(field).copied() {
            None | Some(-1) => None,
            Some(ord) => Some(u32::try_from(ord).map_err(|_| {
                CoreError::invalid_format(format!("bad null ord {ord} for '{field}'"))
            })?),
        };
        let ord_width = match self.ord_widths.get(field).copied() {
            None => lexis_codec::ord_width_for(cardinality),
            Some(width) => u32::try_from(width).map_err(|_| {
                CoreError::invalid_format(format!("bad ord width {width} for '{field}'"))
            })?,
        };
        let field_num = match self.segment.field_num(field) {
            0 => return Err(CoreError::missing_field(field)),
            num => num,
        };

        let folder = self.folder.as_ref();
        let path = |ext: &str| self.segment.file_path(&format!("sort-{field_num}.{ext}"));
        let mut ord_in = InStream::open(folder, &path("ord"))?;
        let mut ix_in = match field_type.primitive_kind() {
            PrimitiveKind::Text | PrimitiveKind::Blob => Some(InStream::open(folder, &path("ix"))?),
            _ => None,
        };
        let mut dat_in = InStream::open(folder, &path("dat"))?;
        let layout = OrdLayout {
            cardinality,
            doc_max: self.segment.doc_max(),
            null_ord,
            ord_width,
            native_ords: self.format == MIN_SORT_FORMAT,
        };
        let cache = SortCache::open(
            field,
            field_type,
            layout,
            &mut ord_in,
            ix_in.as_mut(),
            &mut dat_in,
        )?;
        debug!(segment = %self.segment.name(), field, cardinality, "opened sort cache");

        let mut caches = self.caches.lock();
        let cache = caches
            .entry(field.to_string())
            .or_insert_with(|| Arc::new(cache));
        Ok(Some(Arc::clone(cache)))
    }
}
