//! Structural arithmetic over master payloads.
//!
//! Master values can be plain numbers or arbitrarily nested sequences and
//! keyed records of numbers (glyph coordinates, metric tables, kerning
//! values). Deltas are computed itemwise, so every operand must have the same
//! shape; mismatches are reported as [`ShapeMismatch`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Values that can be blended by a variation model.
///
/// Scaling never fails; adding and subtracting require both operands to have
/// the same shape.
pub trait Blend: Clone {
    fn try_add(&self, other: &Self) -> Result<Self, ShapeMismatch>;
    fn try_sub(&self, other: &Self) -> Result<Self, ShapeMismatch>;
    fn scale(&self, factor: f64) -> Self;
}

impl Blend for f64 {
    #[inline]
    fn try_add(&self, other: &Self) -> Result<Self, ShapeMismatch> {
        Ok(self + other)
    }

    #[inline]
    fn try_sub(&self, other: &Self) -> Result<Self, ShapeMismatch> {
        Ok(self - other)
    }

    #[inline]
    fn scale(&self, factor: f64) -> Self {
        self * factor
    }
}

/// A master value: a number, a sequence, or a keyed record.
///
/// Serializes untagged, so `1.5`, `[1, 2]` and `{"x": 1}` are all payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Number(f64),
    Sequence(Vec<Payload>),
    Keyed(IndexMap<String, Payload>),
}

/// Two payloads could not be combined itemwise.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeMismatch {
    #[error("cannot combine {left} with {right}")]
    Kind { left: &'static str, right: &'static str },

    #[error("sequence lengths differ: {left} != {right}")]
    Length { left: usize, right: usize },

    #[error("record keys differ: '{key}' is not present on both sides")]
    Keys { key: String },
}

impl Payload {
    /// The number, if this payload is a plain number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Payload::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// The field `key`, if this payload is a keyed record.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        match self {
            Payload::Keyed(fields) => fields.get(key),
            _ => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Payload::Number(_) => "number",
            Payload::Sequence(_) => "sequence",
            Payload::Keyed(_) => "record",
        }
    }

    fn zip_with(&self, other: &Payload, op: &dyn Fn(f64, f64) -> f64) -> Result<Payload, ShapeMismatch> {
        match (self, other) {
            (Payload::Number(a), Payload::Number(b)) => Ok(Payload::Number(op(*a, *b))),
            (Payload::Sequence(a), Payload::Sequence(b)) => {
                if a.len() != b.len() {
                    return Err(ShapeMismatch::Length { left: a.len(), right: b.len() });
                }
                a.iter()
                    .zip(b)
                    .map(|(x, y)| x.zip_with(y, op))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Payload::Sequence)
            }
            (Payload::Keyed(a), Payload::Keyed(b)) => {
                if let Some(key) = b.keys().find(|key| !a.contains_key(*key)) {
                    return Err(ShapeMismatch::Keys { key: key.clone() });
                }
                a.iter()
                    .map(|(key, x)| {
                        let y = b.get(key).ok_or_else(|| ShapeMismatch::Keys { key: key.clone() })?;
                        Ok((key.clone(), x.zip_with(y, op)?))
                    })
                    .collect::<Result<IndexMap<_, _>, _>>()
                    .map(Payload::Keyed)
            }
            (a, b) => Err(ShapeMismatch::Kind { left: a.kind_name(), right: b.kind_name() }),
        }
    }
}

impl Blend for Payload {
    fn try_add(&self, other: &Self) -> Result<Self, ShapeMismatch> {
        self.zip_with(other, &|a, b| a + b)
    }

    fn try_sub(&self, other: &Self) -> Result<Self, ShapeMismatch> {
        self.zip_with(other, &|a, b| a - b)
    }

    fn scale(&self, factor: f64) -> Self {
        match self {
            Payload::Number(value) => Payload::Number(value * factor),
            Payload::Sequence(items) => {
                Payload::Sequence(items.iter().map(|item| item.scale(factor)).collect())
            }
            Payload::Keyed(fields) => Payload::Keyed(
                fields.iter().map(|(key, item)| (key.clone(), item.scale(factor))).collect(),
            ),
        }
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Number(value)
    }
}

impl From<Vec<f64>> for Payload {
    fn from(values: Vec<f64>) -> Self {
        Payload::Sequence(values.into_iter().map(Payload::Number).collect())
    }
}
