// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! JSON channel decoding.
//!
//! JSON channels carry no schema record; the payload is simply parsed and
//! converted field-for-field into a [`DecodedMessage`].

use crate::core::{DecodedMessage, DecodedValue, IngestError, Result};

/// Decode a JSON message payload into a [`DecodedMessage`].
///
/// Returns `DecodeFailure` if the bytes aren't valid JSON, or if the
/// top-level value isn't an object (arrays and bare scalars have nowhere to
/// go in a field map).
pub fn decode_json(topic: &str, data: &[u8]) -> Result<DecodedMessage> {
    let value: serde_json::Value = serde_json::from_slice(data)
        .map_err(|e| IngestError::decode_failure(topic, e.to_string()))?;

    match DecodedValue::from(value) {
        DecodedValue::Struct(message) => Ok(message),
        other => Err(IngestError::decode_failure(
            topic,
            format!("top-level JSON value was not an object (got {})", other.category()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_flat_object() {
        let data = br#"{"lat": 37.7, "lon": -122.4, "fix": "RTK"}"#;
        let message = decode_json("/gps", data).unwrap();
        assert_eq!(message.get("lat").and_then(DecodedValue::as_f64), Some(37.7));
        assert_eq!(message.get("fix").and_then(DecodedValue::as_str), Some("RTK"));
    }

    #[test]
    fn decodes_nested_object() {
        let data = br#"{"pose": {"position": {"x": 1.0, "y": 2.0}}}"#;
        let message = decode_json("/pose", data).unwrap();
        let decoded = DecodedValue::Struct(message);
        assert_eq!(
            decoded.get_path("pose.position.x"),
            Some(&DecodedValue::Float64(1.0))
        );
    }

    #[test]
    fn rejects_invalid_json() {
        let err = decode_json("/gps", b"{not json").unwrap_err();
        assert!(matches!(err, IngestError::DecodeFailure { .. }));
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = decode_json("/gps", b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, IngestError::DecodeFailure { .. }));
    }
}
