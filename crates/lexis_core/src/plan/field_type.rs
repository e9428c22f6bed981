//! Field types and the values they hold.

use crate::error::{CoreError, CoreResult};
use crate::index::{NumericTermStepper, TermStepper, TextTermStepper};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The primitive representation of a field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// UTF-8 text.
    Text,
    /// Opaque bytes.
    Blob,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
}

impl PrimitiveKind {
    /// Lower-case name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Blob => "blob",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Returns true for kinds whose encoded values vary in length.
    #[must_use]
    pub const fn is_variable_width(self) -> bool {
        matches!(self, Self::Text | Self::Blob)
    }

    /// Encoded width of fixed-width kinds.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Text | Self::Blob => None,
            Self::Int32 | Self::Float32 => Some(4),
            Self::Int64 | Self::Float64 => Some(8),
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Blob => 1,
            Self::Int32 => 2,
            Self::Int64 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed term or field value.
///
/// Values order first by kind and then by value; floats use IEEE total
/// ordering, so every value (NaN included) has a place in a sort. Within
/// one field all values share a kind, so the kind order never shows up in
/// index files.
#[derive(Debug, Clone)]
pub enum Value {
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Blob(Vec<u8>),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
}

impl Value {
    /// The value's primitive kind.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Text(_) => PrimitiveKind::Text,
            Self::Blob(_) => PrimitiveKind::Blob,
            Self::Int32(_) => PrimitiveKind::Int32,
            Self::Int64(_) => PrimitiveKind::Int64,
            Self::Float32(_) => PrimitiveKind::Float32,
            Self::Float64(_) => PrimitiveKind::Float64,
        }
    }

    /// The smallest value of `kind` (empty text or bytes, the minimum
    /// integer, the lowest float in total order).
    #[must_use]
    pub fn min_of(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Text => Self::Text(String::new()),
            PrimitiveKind::Blob => Self::Blob(Vec::new()),
            PrimitiveKind::Int32 => Self::Int32(i32::MIN),
            PrimitiveKind::Int64 => Self::Int64(i64::MIN),
            PrimitiveKind::Float32 => Self::Float32(f32::from_bits(u32::MAX)),
            PrimitiveKind::Float64 => Self::Float64(f64::from_bits(u64::MAX)),
        }
    }

    /// Approximate heap plus inline size, used for sort memory accounting.
    #[must_use]
    pub fn mem_size(&self) -> usize {
        let inline = std::mem::size_of::<Self>();
        match self {
            Self::Text(s) => inline + s.len(),
            Self::Blob(b) => inline + b.len(),
            _ => inline,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            (Self::Int32(a), Self::Int32(b)) => a.cmp(b),
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Float32(a), Self::Float32(b)) => a.total_cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.total_cmp(b),
            _ => self.kind().rank().cmp(&other.kind().rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

/// Describes how a field's values are stored and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    kind: PrimitiveKind,
    sortable: bool,
}

impl FieldType {
    /// Creates a non-sortable field type.
    #[must_use]
    pub const fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            sortable: false,
        }
    }

    /// Sets whether the field gets a sort cache.
    #[must_use]
    pub const fn sortable(mut self, value: bool) -> Self {
        self.sortable = value;
        self
    }

    /// The field's primitive kind.
    #[must_use]
    pub const fn primitive_kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Returns true if the field gets a sort cache.
    #[must_use]
    pub const fn is_sortable(&self) -> bool {
        self.sortable
    }

    /// Checks that `value` belongs to this field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the kinds differ.
    pub fn check_value(&self, value: &Value) -> CoreResult<()> {
        if value.kind() == self.kind {
            Ok(())
        } else {
            Err(CoreError::type_mismatch(self.kind, value.kind()))
        }
    }

    /// Compares two values of this field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if either value has another kind.
    pub fn compare_values(&self, a: &Value, b: &Value) -> CoreResult<Ordering> {
        self.check_value(a)?;
        self.check_value(b)?;
        Ok(a.cmp(b))
    }

    /// Compares two optional values with missing values sorting last.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if a present value has another
    /// kind.
    pub fn null_back_compare(&self, a: Option<&Value>, b: Option<&Value>) -> CoreResult<Ordering> {
        match (a, b) {
            (None, None) => Ok(Ordering::Equal),
            (None, Some(_)) => Ok(Ordering::Greater),
            (Some(_), None) => Ok(Ordering::Less),
            (Some(a), Some(b)) => self.compare_values(a, b),
        }
    }

    /// Creates the key-frame codec for this field's terms.
    #[must_use]
    pub fn make_term_stepper(&self) -> Box<dyn TermStepper> {
        if self.kind.is_variable_width() {
            Box::new(TextTermStepper::new(self.kind))
        } else {
            Box::new(NumericTermStepper::new(self.kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_order_within_a_kind() {
        assert!(Value::from("apple") < Value::from("banana"));
        assert!(Value::Int32(-5) < Value::Int32(3));
        assert!(Value::Float64(-0.0) < Value::Float64(0.0));
        assert!(Value::Float64(f64::NAN) > Value::Float64(f64::INFINITY));
    }

    #[test]
    fn min_of_is_smallest() {
        assert!(Value::min_of(PrimitiveKind::Int32) <= Value::Int32(i32::MIN));
        assert!(Value::min_of(PrimitiveKind::Float32) < Value::Float32(f32::NEG_INFINITY));
        assert!(Value::min_of(PrimitiveKind::Float64) < Value::Float64(-f64::NAN));
        assert!(Value::min_of(PrimitiveKind::Text) <= Value::from(""));
    }

    #[test]
    fn compare_rejects_other_kinds() {
        let ty = FieldType::new(PrimitiveKind::Text);
        assert_eq!(
            ty.compare_values(&"a".into(), &"b".into()).unwrap(),
            Ordering::Less
        );
        let err = ty.compare_values(&"a".into(), &Value::Int32(1)).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert_eq!(err.to_string(), "type mismatch: expected text, got int32");
    }

    #[test]
    fn nulls_sort_last() {
        let ty = FieldType::new(PrimitiveKind::Int64);
        let v = Value::Int64(i64::MAX);
        assert_eq!(ty.null_back_compare(Some(&v), None).unwrap(), Ordering::Less);
        assert_eq!(ty.null_back_compare(None, Some(&v)).unwrap(), Ordering::Greater);
        assert_eq!(ty.null_back_compare(None, None).unwrap(), Ordering::Equal);
    }

    #[test]
    fn builder_sets_sortable() {
        let ty = FieldType::new(PrimitiveKind::Float32).sortable(true);
        assert!(ty.is_sortable());
        assert_eq!(ty.primitive_kind(), PrimitiveKind::Float32);
        assert!(!FieldType::new(PrimitiveKind::Blob).is_sortable());
    }
}
