//! Axis coordinate codec.
//!
//! A [`Coordinate`] is the open, user-defined key identifying one image —
//! `{time: 3, channel: "GFP", z: 12}`. Its canonical form is a UTF-8 JSON
//! object whose keys are sorted lexicographically; that canonical string is
//! the primary lookup key everywhere in the engine (index records, the
//! in-memory coordinate maps, the write-pending table).
//!
//! Per the design notes, the encoder is a small hand-written emitter rather
//! than a dependency on any JSON library's default key ordering — the
//! sorted-key contract is part of the on-disk format, not an incidental
//! property of whichever map type happens to back it.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::CodecError;

/// The value of a single axis: either a signed 32-bit integer or a string.
///
/// An axis name is bound to one of these kinds at first use; subsequent
/// writes that disagree fail with [`CodecError`] at the caller boundary or
/// [`crate::error::StorageError::AxisTypeConflict`] once routed through the
/// storage engine's axis-type table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AxisValue {
    Int(i32),
    Str(String),
}

impl AxisValue {
    /// A human-readable name for the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AxisValue::Int(_) => "integer",
            AxisValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Int(v) => write!(f, "{v}"),
            AxisValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for AxisValue {
    fn from(v: i32) -> Self {
        AxisValue::Int(v)
    }
}

impl From<&str> for AxisValue {
    fn from(v: &str) -> Self {
        AxisValue::Str(v.to_string())
    }
}

impl From<String> for AxisValue {
    fn from(v: String) -> Self {
        AxisValue::Str(v)
    }
}

/// An N-dimensional coordinate: a mapping from axis name to axis value.
///
/// Backed by a [`BTreeMap`] so that iteration is already key-sorted; the
/// canonical JSON serialization just walks it in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Coordinate {
    axes: BTreeMap<String, AxisValue>,
}

impl Coordinate {
    /// An empty coordinate (used for non-tiled, axis-free datasets and as
    /// the base for building up tiled tile coordinates).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a coordinate from `(axis, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AxisValue>,
    {
        let mut axes = BTreeMap::new();
        for (k, v) in pairs {
            axes.insert(k.into(), v.into());
        }
        Self { axes }
    }

    /// Return a copy of this coordinate with `axis` set to `value`, used by
    /// the pyramid orchestrator to derive a tile's coordinate at a coarser
    /// level from its full-resolution coordinate.
    pub fn with_axis(&self, axis: impl Into<String>, value: impl Into<AxisValue>) -> Self {
        let mut axes = self.axes.clone();
        axes.insert(axis.into(), value.into());
        Self { axes }
    }

    pub fn get(&self, axis: &str) -> Option<&AxisValue> {
        self.axes.get(axis)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AxisValue)> {
        self.axes.iter()
    }

    /// Reserved `row` axis (tiled datasets only).
    pub fn row(&self) -> Option<i32> {
        match self.axes.get("row") {
            Some(AxisValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Reserved `column` axis (tiled datasets only).
    pub fn column(&self) -> Option<i32> {
        match self.axes.get("column") {
            Some(AxisValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Serialize to the canonical, sorted-key JSON form. This is the
    /// contract that lets coordinate equality be a byte-compare and the
    /// index be a flat append-only log: callers must never hand-roll this
    /// themselves.
    pub fn serialize(&self) -> String {
        let mut out = String::from("{");
        for (i, (key, value)) in self.axes.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            escape_json_string_into(key, &mut out);
            out.push_str("\":");
            match value {
                AxisValue::Int(v) => out.push_str(&v.to_string()),
                AxisValue::Str(v) => {
                    out.push('"');
                    escape_json_string_into(v, &mut out);
                    out.push('"');
                }
            }
        }
        out.push('}');
        out
    }

    /// Parse a coordinate from its canonical (or any equivalent-but-
    /// reordered) JSON form.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::MalformedCoordinate(e.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| CodecError::MalformedCoordinate(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| CodecError::MalformedCoordinate("expected a JSON object".into()))?;

        let mut axes = BTreeMap::new();
        for (key, v) in object {
            let axis_value = if let Some(i) = v.as_i64() {
                AxisValue::Int(i as i32)
            } else if let Some(s) = v.as_str() {
                AxisValue::Str(s.to_string())
            } else {
                return Err(CodecError::UnsupportedAxisValue { axis: key.clone() });
            };
            axes.insert(key.clone(), axis_value);
        }
        Ok(Self { axes })
    }
}

/// Append `s`, JSON-escaped, onto `out`. Handles the characters that can
/// appear in axis names and string axis values (quotes, backslashes,
/// control characters); axis names and values in practice are short
/// identifiers, so this does not need to be a general-purpose JSON writer.
fn escape_json_string_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}
