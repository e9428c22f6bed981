//! Field types and schema.
//!
//! These are the narrow collaborators the storage components consume: a
//! comparator and primitive kind per field, a sortable flag, and the
//! index-wide [`Architecture`](crate::Architecture).

mod field_type;
mod schema;

pub use field_type::{FieldType, PrimitiveKind, Value};
pub use schema::Schema;
