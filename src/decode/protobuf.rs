// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Protobuf channel decoding via dynamic reflection.
//!
//! Messages are decoded against the [`MessageDescriptor`] the schema
//! resolver produced, without any generated message types — the set of
//! telemetry message types isn't known until the MCAP's own schema records
//! are read, so nothing can be `prost_build`-generated ahead of time.

use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, Value};

use crate::core::{DecodedMessage, DecodedValue, IngestError, Result};

/// Decode a Protobuf message payload against a resolved descriptor.
pub fn decode_protobuf(
    topic: &str,
    data: &[u8],
    descriptor: &MessageDescriptor,
) -> Result<DecodedMessage> {
    let message = DynamicMessage::decode(descriptor.clone(), data)
        .map_err(|e| IngestError::decode_failure(topic, e.to_string()))?;

    Ok(dynamic_to_decoded(&message))
}

fn dynamic_to_decoded(message: &DynamicMessage) -> DecodedMessage {
    let mut fields = DecodedMessage::new();
    for field in message.descriptor().fields() {
        let name = field.name().to_string();
        if !message.has_field(&field) {
            fields.insert(name, DecodedValue::Null);
            continue;
        }
        let value = message.get_field(&field);
        fields.insert(name, reflect_value_to_decoded(&value, &field));
    }
    fields
}

fn reflect_value_to_decoded(value: &Value, field: &FieldDescriptor) -> DecodedValue {
    match value {
        Value::Bool(b) => DecodedValue::Bool(*b),
        Value::I32(v) => DecodedValue::Int64(*v as i64),
        Value::I64(v) => DecodedValue::Int64(*v),
        Value::U32(v) => DecodedValue::UInt64(*v as u64),
        Value::U64(v) => DecodedValue::UInt64(*v),
        Value::F32(v) => DecodedValue::Float64(*v as f64),
        Value::F64(v) => DecodedValue::Float64(*v),
        Value::String(s) => DecodedValue::String(s.clone()),
        Value::Bytes(b) => DecodedValue::String(String::from_utf8_lossy(b).into_owned()),
        Value::EnumNumber(number) => DecodedValue::Enum(enum_symbol(field, *number)),
        Value::Message(nested) => DecodedValue::Struct(dynamic_to_decoded(nested)),
        Value::List(items) => {
            DecodedValue::Array(items.iter().map(|item| reflect_value_to_decoded(item, field)).collect())
        }
        Value::Map(entries) => DecodedValue::Array(
            entries
                .values()
                .map(|item| reflect_value_to_decoded(item, field))
                .collect(),
        ),
    }
}

/// Resolves an enum field's wire number to its symbolic name, falling back
/// to the raw number (stringified) if the pool has no matching value — a
/// forward-compatible producer can emit enum numbers a stale schema doesn't
/// know about yet.
fn enum_symbol(field: &FieldDescriptor, number: i32) -> String {
    if let Kind::Enum(enum_descriptor) = field.kind() {
        if let Some(value) = enum_descriptor.get_value(number) {
            return value.name().to_string();
        }
    }
    number.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaResolver;
    use prost::Message;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorSet};

    fn vehicle_state_descriptor() -> MessageDescriptor {
        let file = prost_types::FileDescriptorProto {
            name: Some("telemetry/vehicle_state.proto".to_string()),
            package: Some("telemetry".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("VehicleState".to_string()),
                field: vec![
                    FieldDescriptorProto {
                        name: Some("rpm".to_string()),
                        number: Some(1),
                        label: Some(Label::Optional as i32),
                        r#type: Some(Type::Double as i32),
                        ..Default::default()
                    },
                    FieldDescriptorProto {
                        name: Some("gear".to_string()),
                        number: Some(2),
                        label: Some(Label::Optional as i32),
                        r#type: Some(Type::Enum as i32),
                        type_name: Some(".telemetry.Gear".to_string()),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Gear".to_string()),
                value: vec![
                    prost_types::EnumValueDescriptorProto {
                        name: Some("NEUTRAL".to_string()),
                        number: Some(0),
                        ..Default::default()
                    },
                    prost_types::EnumValueDescriptorProto {
                        name: Some("FIRST".to_string()),
                        number: Some(1),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };
        let bytes = FileDescriptorSet { file: vec![file] }.encode_to_vec();
        let mut resolver = SchemaResolver::new();
        resolver.resolve(&bytes, "telemetry.VehicleState").unwrap()
    }

    #[test]
    fn decodes_scalar_and_enum_fields() {
        let descriptor = vehicle_state_descriptor();
        let mut message = DynamicMessage::new(descriptor.clone());
        message.set_field_by_number(1, Value::F64(6200.0));
        message.set_field_by_number(2, Value::EnumNumber(1));
        let bytes = message.encode_to_vec();

        let decoded = decode_protobuf("/vehicle-state", &bytes, &descriptor).unwrap();
        assert_eq!(decoded.get("rpm").and_then(DecodedValue::as_f64), Some(6200.0));
        assert_eq!(decoded.get("gear").and_then(DecodedValue::as_str), Some("FIRST"));
    }

    #[test]
    fn unknown_enum_number_falls_back_to_stringified_number() {
        let descriptor = vehicle_state_descriptor();
        let mut message = DynamicMessage::new(descriptor.clone());
        message.set_field_by_number(2, Value::EnumNumber(99));
        let bytes = message.encode_to_vec();

        let decoded = decode_protobuf("/vehicle-state", &bytes, &descriptor).unwrap();
        assert_eq!(decoded.get("gear").and_then(DecodedValue::as_str), Some("99"));
    }

    #[test]
    fn malformed_bytes_report_decode_failure() {
        let descriptor = vehicle_state_descriptor();
        let err = decode_protobuf("/vehicle-state", &[0xFF, 0xFF, 0xFF], &descriptor).unwrap_err();
        assert!(matches!(err, IngestError::DecodeFailure { .. }));
    }
}
