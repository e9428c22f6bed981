//! Field registry.

use crate::config::Architecture;
use crate::plan::field_type::FieldType;
use std::collections::BTreeMap;

/// Maps field names to their types and carries the index architecture.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    architecture: Architecture,
    fields: BTreeMap<String, FieldType>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(architecture: Architecture) -> Self {
        Self {
            architecture,
            fields: BTreeMap::new(),
        }
    }

    /// Defines (or redefines) a field.
    pub fn spec_field(&mut self, name: impl Into<String>, field_type: FieldType) -> &mut Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Returns the type of `name`, if defined.
    #[must_use]
    pub fn fetch_type(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    /// The index architecture.
    #[must_use]
    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    /// Number of defined fields.
    #[must_use]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PrimitiveKind;

    #[test]
    fn spec_and_fetch() {
        let mut schema = Schema::new(Architecture::new().index_interval(4));
        schema
            .spec_field("title", FieldType::new(PrimitiveKind::Text).sortable(true))
            .spec_field("year", FieldType::new(PrimitiveKind::Int32));

        assert_eq!(schema.num_fields(), 2);
        assert_eq!(schema.architecture().index_interval, 4);
        assert!(schema.fetch_type("title").unwrap().is_sortable());
        assert!(schema.fetch_type("body").is_none());
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["title", "year"]);
    }
}
