//! Segment identity and metadata.

use crate::error::{CoreError, CoreResult};
use lexis_storage::Folder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File name of the metadata record inside a segment directory.
pub const SEGMETA_FILENAME: &str = "segmeta.json";

/// An immutable, named unit of index data.
///
/// Fields are numbered from 1 in the order they are added; number 0 means
/// "not in this segment". Documents are numbered from 1 to
/// [`Segment::doc_max`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    name: String,
    doc_max: u32,
    fields: Vec<String>,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl Segment {
    /// Creates an empty segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] unless the name is a single
    /// non-empty path component.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(CoreError::invalid_argument(format!(
                "invalid segment name: '{name}'"
            )));
        }
        Ok(Self {
            name,
            doc_max: 0,
            fields: Vec::new(),
            metadata: BTreeMap::new(),
        })
    }

    /// Segment name, which is also its directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Highest document id in the segment.
    #[must_use]
    pub fn doc_max(&self) -> u32 {
        self.doc_max
    }

    /// Sets the highest document id.
    pub fn set_doc_max(&mut self, doc_max: u32) {
        self.doc_max = doc_max;
    }

    /// Registers a field, returning its number. Adding a known field
    /// returns the existing number.
    pub fn add_field(&mut self, field: &str) -> u32 {
        match self.field_num(field) {
            0 => {
                self.fields.push(field.to_string());
                self.fields.len() as u32
            }
            num => num,
        }
    }

    /// Number of `field`, or 0 if the segment doesn't have it.
    #[must_use]
    pub fn field_num(&self, field: &str) -> u32 {
        self.fields
            .iter()
            .position(|f| f == field)
            .map_or(0, |idx| idx as u32 + 1)
    }

    /// Name of field number `num`.
    #[must_use]
    pub fn field_name(&self, num: u32) -> Option<&str> {
        let idx = usize::try_from(num).ok()?.checked_sub(1)?;
        self.fields.get(idx).map(String::as_str)
    }

    /// Stores metadata for a component, replacing earlier data.
    pub fn store_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Returns a component's metadata.
    #[must_use]
    pub fn fetch_metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Path of a file inside the segment directory.
    #[must_use]
    pub fn file_path(&self, file: &str) -> String {
        format!("{}/{file}", self.name)
    }

    /// Writes `<name>/segmeta.json`, creating the segment directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_file(&self, folder: &dyn Folder) -> CoreResult<()> {
        if !folder.is_directory(&self.name) {
            folder.mkdir(&self.name)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        folder.spew_file(&self.file_path(SEGMETA_FILENAME), &json)?;
        Ok(())
    }

    /// Reads `<name>/segmeta.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not a segment record.
    pub fn read_file(folder: &dyn Folder, name: &str) -> CoreResult<Self> {
        let bytes = folder.slurp_file(&format!("{name}/{SEGMETA_FILENAME}"))?;
        let segment: Self = serde_json::from_slice(&bytes)?;
        if segment.name != name {
            return Err(CoreError::invalid_format(format!(
                "segment '{name}' records name '{}'",
                segment.name
            )));
        }
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_storage::RamFolder;
    use serde_json::json;

    #[test]
    fn field_numbers_start_at_one() {
        let mut seg = Segment::new("seg_1").unwrap();
        assert_eq!(seg.add_field("title"), 1);
        assert_eq!(seg.add_field("body"), 2);
        assert_eq!(seg.add_field("title"), 1);

        assert_eq!(seg.field_num("body"), 2);
        assert_eq!(seg.field_num("missing"), 0);
        assert_eq!(seg.field_name(1), Some("title"));
        assert_eq!(seg.field_name(0), None);
        assert_eq!(seg.field_name(3), None);
    }

    #[test]
    fn invalid_names_are_rejected() {
        for bad in ["", "a/b", "..", "."] {
            assert!(Segment::new(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn metadata_persists_through_folder() {
        let folder = RamFolder::new();
        let mut seg = Segment::new("seg_2").unwrap();
        seg.set_doc_max(10);
        seg.add_field("title");
        seg.store_metadata("sort", json!({ "format": 3, "counts": { "title": 4 } }));
        seg.write_file(&folder).unwrap();

        let read = Segment::read_file(&folder, "seg_2").unwrap();
        assert_eq!(read, seg);
        assert_eq!(read.fetch_metadata("sort").unwrap()["format"], 3);
        assert_eq!(read.file_path("sort-1.ord"), "seg_2/sort-1.ord");
    }

    #[test]
    fn missing_segmeta_is_an_error() {
        let folder = RamFolder::new();
        assert!(matches!(
            Segment::read_file(&folder, "seg_9"),
            Err(CoreError::Storage(_))
        ));
    }
}
