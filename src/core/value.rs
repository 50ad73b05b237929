// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The decoded value model shared by every decoder.
//!
//! Both the Protobuf and JSON decoders produce the same tagged-value tree so
//! that downstream consumers (the pub/sub subscribers, the HDF5 writer, the
//! plot accumulators) never need to know which wire format a message arrived
//! in. Protobuf's narrower integer widths are widened to `Int64`/`UInt64`/
//! `Float64` on the way in, but the type *category* — signed, unsigned,
//! float, string, bool — is preserved so the HDF5 writer can still pick a
//! correct compound column type and the pub/sub layer can still detect a
//! signal's leaf type changing across chunks (`TypeDrift`).

use std::collections::HashMap;
use std::fmt;

/// A decoded message is a field name to value map. Field order is not
/// significant; downstream consumers look fields up by name.
pub type DecodedMessage = HashMap<String, DecodedValue>;

/// A single decoded leaf or composite value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// A boolean field.
    Bool(bool),
    /// Any signed integer field (`int32`, `int64`, `sint32`, `sfixed64`, …),
    /// widened to 64 bits.
    Int64(i64),
    /// Any unsigned integer field (`uint32`, `uint64`, `fixed32`, …), widened
    /// to 64 bits.
    UInt64(u64),
    /// Any floating-point field (`float`, `double`), widened to 64 bits.
    Float64(f64),
    /// A string or bytes field. Bytes are not a separate variant: the
    /// pipeline never needs raw binary payloads past decode.
    String(String),
    /// A Protobuf enum field, resolved to its symbolic name rather than its
    /// wire number.
    Enum(String),
    /// A nested message.
    Struct(DecodedMessage),
    /// A repeated field.
    Array(Vec<DecodedValue>),
    /// A field that was absent, or a JSON `null`.
    Null,
}

impl DecodedValue {
    /// The type category name used in `TypeDrift` comparisons and HDF5
    /// compound-column selection. Two values of the same category may still
    /// differ in exact numeric width, but that's not drift.
    pub fn category(&self) -> &'static str {
        match self {
            DecodedValue::Bool(_) => "bool",
            DecodedValue::Int64(_) => "int64",
            DecodedValue::UInt64(_) => "uint64",
            DecodedValue::Float64(_) => "float64",
            DecodedValue::String(_) => "string",
            DecodedValue::Enum(_) => "enum",
            DecodedValue::Struct(_) => "struct",
            DecodedValue::Array(_) => "array",
            DecodedValue::Null => "null",
        }
    }

    /// True for the leaf categories the HDF5 writer can place directly in a
    /// scalar compound column (everything but `Struct`/`Array`/`Null`).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            DecodedValue::Bool(_)
                | DecodedValue::Int64(_)
                | DecodedValue::UInt64(_)
                | DecodedValue::Float64(_)
                | DecodedValue::String(_)
                | DecodedValue::Enum(_)
        )
    }

    /// Returns the value as `f64` if it is any numeric or boolean category,
    /// used by the plot accumulators which only ever care about magnitude.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            DecodedValue::Int64(v) => Some(*v as f64),
            DecodedValue::UInt64(v) => Some(*v as f64),
            DecodedValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `&str` for `String` and `Enum` categories.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::String(s) => Some(s.as_str()),
            DecodedValue::Enum(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the inner message if this is a `Struct`.
    pub fn as_struct(&self) -> Option<&DecodedMessage> {
        match self {
            DecodedValue::Struct(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the inner slice if this is an `Array`.
    pub fn as_array(&self) -> Option<&[DecodedValue]> {
        match self {
            DecodedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a dotted path (`"pose.position.x"`) through nested `Struct`
    /// values, used by the plot accumulators to pull named signals out of a
    /// decoded message without the caller needing to walk the tree by hand.
    pub fn get_path<'a>(&'a self, path: &str) -> Option<&'a DecodedValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_struct()?.get(segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Bool(b) => write!(f, "{b}"),
            DecodedValue::Int64(v) => write!(f, "{v}"),
            DecodedValue::UInt64(v) => write!(f, "{v}"),
            DecodedValue::Float64(v) => write!(f, "{v}"),
            DecodedValue::String(s) => write!(f, "{s}"),
            DecodedValue::Enum(s) => write!(f, "{s}"),
            DecodedValue::Struct(_) => write!(f, "<struct>"),
            DecodedValue::Array(items) => write!(f, "<array[{}]>", items.len()),
            DecodedValue::Null => write!(f, "null"),
        }
    }
}

/// Converts a `serde_json::Value` into a `DecodedValue`, used by the JSON
/// decode path (§4.B) so that both decoders land on the same tree shape.
impl From<serde_json::Value> for DecodedValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DecodedValue::Null,
            serde_json::Value::Bool(b) => DecodedValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DecodedValue::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    DecodedValue::UInt64(u)
                } else {
                    DecodedValue::Float64(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => DecodedValue::String(s),
            serde_json::Value::Array(items) => {
                DecodedValue::Array(items.into_iter().map(DecodedValue::from).collect())
            }
            serde_json::Value::Object(map) => DecodedValue::Struct(
                map.into_iter()
                    .map(|(k, v)| (k, DecodedValue::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_distinguishes_numeric_kinds() {
        assert_eq!(DecodedValue::Int64(-1).category(), "int64");
        assert_eq!(DecodedValue::UInt64(1).category(), "uint64");
        assert_eq!(DecodedValue::Float64(1.5).category(), "float64");
    }

    #[test]
    fn scalar_excludes_composites() {
        assert!(DecodedValue::Bool(true).is_scalar());
        assert!(DecodedValue::Enum("RUNNING".into()).is_scalar());
        assert!(!DecodedValue::Array(vec![]).is_scalar());
        assert!(!DecodedValue::Struct(DecodedMessage::new()).is_scalar());
        assert!(!DecodedValue::Null.is_scalar());
    }

    #[test]
    fn as_f64_widens_bool_and_ints() {
        assert_eq!(DecodedValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(DecodedValue::Int64(-5).as_f64(), Some(-5.0));
        assert_eq!(DecodedValue::UInt64(5).as_f64(), Some(5.0));
        assert_eq!(DecodedValue::String("x".into()).as_f64(), None);
    }

    #[test]
    fn get_path_walks_nested_structs() {
        let mut position = DecodedMessage::new();
        position.insert("x".to_string(), DecodedValue::Float64(1.0));
        position.insert("y".to_string(), DecodedValue::Float64(2.0));
        let mut pose = DecodedMessage::new();
        pose.insert("position".to_string(), DecodedValue::Struct(position));
        let msg = DecodedValue::Struct(pose);

        assert_eq!(msg.get_path("position.x"), Some(&DecodedValue::Float64(1.0)));
        assert_eq!(msg.get_path("position.z"), None);
        assert_eq!(msg.get_path("missing.x"), None);
    }

    #[test]
    fn json_conversion_preserves_shape() {
        let json = serde_json::json!({
            "lat": 37.77,
            "lon": -122.41,
            "tags": ["a", "b"],
            "active": true,
            "note": null,
        });
        let decoded: DecodedValue = json.into();
        let obj = decoded.as_struct().expect("object decodes to struct");
        assert_eq!(obj.get("lat").and_then(DecodedValue::as_f64), Some(37.77));
        assert_eq!(obj.get("active"), Some(&DecodedValue::Bool(true)));
        assert_eq!(obj.get("note"), Some(&DecodedValue::Null));
        assert_eq!(
            obj.get("tags")
                .and_then(DecodedValue::as_array)
                .map(|a| a.len()),
            Some(2)
        );
    }
}
