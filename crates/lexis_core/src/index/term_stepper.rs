//! Key-frame codecs for lexicon terms.
//!
//! A key frame is the complete encoding of one term, as opposed to a delta
//! against the previous term. Sparse lexicon indexes store only key frames
//! so that any entry can be decoded after a seek.

use crate::error::{CoreError, CoreResult};
use crate::plan::{PrimitiveKind, Value};
use crate::store::{InStream, OutStream};
use std::fmt;

/// Decodes and encodes the terms of one field type.
///
/// A stepper remembers the last value it read or wrote, which is what
/// [`TermStepper::value`] returns.
pub trait TermStepper: fmt::Debug + Send {
    /// Kind of the values this stepper handles.
    fn kind(&self) -> PrimitiveKind;

    /// The current value, if any.
    fn value(&self) -> Option<&Value>;

    /// Forgets the current value.
    fn reset(&mut self);

    /// Reads one key frame and makes it the current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream ends early or the frame is corrupt.
    fn read_key_frame(&mut self, input: &mut InStream) -> CoreResult<()>;

    /// Writes `value` as a key frame and makes it the current value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if `value` has another kind, or
    /// an error if the write fails.
    fn write_key_frame(&mut self, out: &mut OutStream, value: &Value) -> CoreResult<()>;
}

fn check_kind(expected: PrimitiveKind, value: &Value) -> CoreResult<()> {
    if value.kind() == expected {
        Ok(())
    } else {
        Err(CoreError::type_mismatch(expected, value.kind()))
    }
}

/// Key frames for text and blob terms: a C32 byte length, then the bytes.
#[derive(Debug, Clone)]
pub struct TextTermStepper {
    kind: PrimitiveKind,
    value: Option<Value>,
}

impl TextTermStepper {
    /// Creates a stepper for `kind`, which should be `Text` or `Blob`.
    #[must_use]
    pub fn new(kind: PrimitiveKind) -> Self {
        Self { kind, value: None }
    }
}

impl TermStepper for TextTermStepper {
    fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn reset(&mut self) {
        self.value = None;
    }

    fn read_key_frame(&mut self, input: &mut InStream) -> CoreResult<()> {
        let len = input.read_c32()? as usize;
        let bytes = input.read_bytes(len)?;
        let value = match self.kind {
            PrimitiveKind::Text => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    CoreError::invalid_format(format!(
                        "bad UTF-8 in term at {} of '{}': {e}",
                        input.tell(),
                        input.name()
                    ))
                })?;
                Value::Text(text)
            }
            PrimitiveKind::Blob => Value::Blob(bytes),
            other => return Err(CoreError::type_mismatch("text or blob", other)),
        };
        self.value = Some(value);
        Ok(())
    }

    fn write_key_frame(&mut self, out: &mut OutStream, value: &Value) -> CoreResult<()> {
        check_kind(self.kind, value)?;
        let bytes: &[u8] = match value {
            Value::Text(s) => s.as_bytes(),
            Value::Blob(b) => b,
            other => return Err(CoreError::type_mismatch(self.kind, other.kind())),
        };
        let len = u32::try_from(bytes.len()).map_err(|_| {
            CoreError::invalid_argument(format!("term too long: {} bytes", bytes.len()))
        })?;
        out.write_c32(len)?;
        out.write_bytes(bytes)?;
        self.value = Some(value.clone());
        Ok(())
    }
}

/// Key frames for fixed-width numeric terms, stored big-endian.
#[derive(Debug, Clone)]
pub struct NumericTermStepper {
    kind: PrimitiveKind,
    value: Option<Value>,
}

impl NumericTermStepper {
    /// Creates a stepper for a numeric `kind`.
    #[must_use]
    pub fn new(kind: PrimitiveKind) -> Self {
        Self { kind, value: None }
    }
}

impl TermStepper for NumericTermStepper {
    fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn reset(&mut self) {
        self.value = None;
    }

    fn read_key_frame(&mut self, input: &mut InStream) -> CoreResult<()> {
        let width = self
            .kind
            .fixed_width()
            .ok_or_else(|| CoreError::type_mismatch("numeric kind", self.kind))?;
        let bytes = input.read_bytes(width)?;
        let value = match self.kind {
            PrimitiveKind::Int32 => Value::Int32(lexis_codec::get_i32_be(&bytes)?),
            PrimitiveKind::Int64 => Value::Int64(lexis_codec::get_i64_be(&bytes)?),
            PrimitiveKind::Float32 => Value::Float32(lexis_codec::get_f32_be(&bytes)?),
            PrimitiveKind::Float64 => Value::Float64(lexis_codec::get_f64_be(&bytes)?),
            other => return Err(CoreError::type_mismatch("numeric kind", other)),
        };
        self.value = Some(value);
        Ok(())
    }

    fn write_key_frame(&mut self, out: &mut OutStream, value: &Value) -> CoreResult<()> {
        check_kind(self.kind, value)?;
        let mut bytes = Vec::with_capacity(8);
        match *value {
            Value::Int32(v) => lexis_codec::put_i32_be(&mut bytes, v),
            Value::Int64(v) => lexis_codec::put_i64_be(&mut bytes, v),
            Value::Float32(v) => lexis_codec::put_f32_be(&mut bytes, v),
            Value::Float64(v) => lexis_codec::put_f64_be(&mut bytes, v),
            ref other => return Err(CoreError::type_mismatch(self.kind, other.kind())),
        }
        out.write_bytes(&bytes)?;
        self.value = Some(value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_storage::{Folder, RamFolder};

    fn round_trip(stepper: &mut dyn TermStepper, values: &[Value]) -> Vec<Value> {
        let folder = RamFolder::new();
        let mut out = OutStream::open(&folder, "frames").unwrap();
        for value in values {
            stepper.write_key_frame(&mut out, value).unwrap();
            assert_eq!(stepper.value(), Some(value));
        }
        out.flush().unwrap();
        drop(out);

        stepper.reset();
        assert!(stepper.value().is_none());
        let mut input = InStream::open(&folder, "frames").unwrap();
        values
            .iter()
            .map(|_| {
                stepper.read_key_frame(&mut input).unwrap();
                stepper.value().unwrap().clone()
            })
            .collect()
    }

    #[test]
    fn text_frames() {
        let values: Vec<Value> = ["", "a", "héllo", "zebra"].iter().map(|s| (*s).into()).collect();
        let mut stepper = TextTermStepper::new(PrimitiveKind::Text);
        assert_eq!(round_trip(&mut stepper, &values), values);
    }

    #[test]
    fn blob_frames_allow_any_bytes() {
        let values = vec![Value::Blob(vec![0xff, 0x00]), Value::Blob(Vec::new())];
        let mut stepper = TextTermStepper::new(PrimitiveKind::Blob);
        assert_eq!(round_trip(&mut stepper, &values), values);
    }

    #[test]
    fn numeric_frames_are_fixed_width() {
        let folder = RamFolder::new();
        let mut out = OutStream::open(&folder, "n").unwrap();
        let mut stepper = NumericTermStepper::new(PrimitiveKind::Int32);
        stepper.write_key_frame(&mut out, &Value::Int32(-2)).unwrap();
        assert_eq!(out.tell(), 4);
        out.flush().unwrap();
        drop(out);
        assert_eq!(folder.slurp_file("n").unwrap(), vec![0xff, 0xff, 0xff, 0xfe]);

        let values = vec![Value::Float64(-1.5), Value::Float64(f64::MAX)];
        let mut stepper = NumericTermStepper::new(PrimitiveKind::Float64);
        assert_eq!(round_trip(&mut stepper, &values), values);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let folder = RamFolder::new();
        let mut out = OutStream::open(&folder, "x").unwrap();
        let mut stepper = NumericTermStepper::new(PrimitiveKind::Int64);
        let err = stepper.write_key_frame(&mut out, &Value::Int32(1)).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert_eq!(out.tell(), 0);
    }

    #[test]
    fn invalid_utf8_is_a_format_error() {
        let folder = RamFolder::new();
        folder.spew_file("bad", &[2, 0xc3, 0x28]).unwrap();
        let mut input = InStream::open(&folder, "bad").unwrap();
        let mut stepper = TextTermStepper::new(PrimitiveKind::Text);
        assert!(matches!(
            stepper.read_key_frame(&mut input),
            Err(CoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn truncated_frame_fails() {
        let folder = RamFolder::new();
        folder.spew_file("short", &[5, b'a']).unwrap();
        let mut input = InStream::open(&folder, "short").unwrap();
        let mut stepper = TextTermStepper::new(PrimitiveKind::Text);
        assert!(stepper.read_key_frame(&mut input).is_err());
    }
}
