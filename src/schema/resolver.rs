// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Iterative (N+1-pass) Protobuf schema resolution against a single shared
//! [`prost_reflect::DescriptorPool`].
//!
//! Every MCAP schema record for a Protobuf channel carries a complete
//! `FileDescriptorSet`: the message's own `.proto` file plus everything it
//! transitively imports. Because channels are discovered in channel-ID
//! order, not dependency order, two schemas can disagree about which file
//! comes first, and a shared dependency (e.g. `google/protobuf/timestamp.proto`)
//! commonly appears verbatim in more than one channel's set. The resolver
//! collects every `FileDescriptorProto` it has seen that isn't in the pool
//! yet, and repeatedly sweeps that pending set, adding whatever the pool is
//! now able to accept, until a full sweep makes no progress.

use std::collections::HashMap;

use prost::Message;
use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::FileDescriptorSet;

use crate::core::{IngestError, Result};

/// Resolves Protobuf schemas into queryable message descriptors, merging
/// every schema seen into one pool for the lifetime of an ingest job.
pub struct SchemaResolver {
    pool: DescriptorPool,
    pending: HashMap<String, prost_types::FileDescriptorProto>,
}

impl SchemaResolver {
    /// An empty resolver with no registered files.
    pub fn new() -> Self {
        Self {
            pool: DescriptorPool::new(),
            pending: HashMap::new(),
        }
    }

    /// Register a channel's schema bytes (a serialized `FileDescriptorSet`)
    /// and resolve the named top-level message type.
    ///
    /// Safe to call once per channel even when the same files repeat across
    /// channels: files already present in the pool are skipped rather than
    /// re-added.
    pub fn resolve(
        &mut self,
        schema_data: &[u8],
        message_type: &str,
    ) -> Result<MessageDescriptor> {
        let set = FileDescriptorSet::decode(schema_data)
            .map_err(|e| IngestError::schema_unresolvable(vec![format!("decode: {e}")]))?;

        for file in set.file {
            if self.pool.get_file_by_name(&file.name).is_none() {
                self.pending.insert(file.name.clone(), file);
            }
        }

        self.drain_pending()?;

        self.pool
            .get_message_by_name(message_type)
            .ok_or_else(|| IngestError::schema_unresolvable(vec![message_type.to_string()]))
    }

    /// Sweep the pending file set until a full pass adds nothing, mirroring
    /// the original implementation's incremental single-file build loop.
    fn drain_pending(&mut self) -> Result<()> {
        loop {
            let mut made_progress = false;
            let names: Vec<String> = self.pending.keys().cloned().collect();

            for name in names {
                let file = match self.pending.remove(&name) {
                    Some(file) => file,
                    None => continue, // already consumed earlier in this sweep
                };

                match self.pool.add_file_descriptor_proto(file.clone()) {
                    Ok(()) => made_progress = true,
                    Err(_) => {
                        // Still missing a dependency; retry on a later sweep
                        // once more files have landed in the pool.
                        self.pending.insert(name, file);
                    }
                }
            }

            if !made_progress {
                break;
            }
        }

        if !self.pending.is_empty() {
            return Err(IngestError::schema_unresolvable(
                self.pending.keys().cloned().collect(),
            ));
        }

        Ok(())
    }
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_set(files: Vec<prost_types::FileDescriptorProto>) -> Vec<u8> {
        FileDescriptorSet { file: files }.encode_to_vec()
    }

    fn scalar_file(name: &str, message: &str, deps: Vec<&str>) -> prost_types::FileDescriptorProto {
        use prost_types::field_descriptor_proto::{Label, Type};
        use prost_types::{DescriptorProto, FieldDescriptorProto};

        prost_types::FileDescriptorProto {
            name: Some(name.to_string()),
            package: Some("telemetry".to_string()),
            dependency: deps.into_iter().map(str::to_string).collect(),
            message_type: vec![DescriptorProto {
                name: Some(message.to_string()),
                field: vec![FieldDescriptorProto {
                    name: Some("value".to_string()),
                    number: Some(1),
                    label: Some(Label::Optional as i32),
                    r#type: Some(Type::Double as i32),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_single_file_schema() {
        let file = scalar_file("telemetry/value.proto", "Value", vec![]);
        let bytes = encode_set(vec![file]);

        let mut resolver = SchemaResolver::new();
        let descriptor = resolver.resolve(&bytes, "telemetry.Value").unwrap();
        assert_eq!(descriptor.full_name(), "telemetry.Value");
    }

    #[test]
    fn resolves_out_of_order_dependency_chain() {
        // Listed child-before-parent: resolver must not require dependency order.
        let child = scalar_file("telemetry/child.proto", "Child", vec!["telemetry/base.proto"]);
        let base = scalar_file("telemetry/base.proto", "Base", vec![]);
        let bytes = encode_set(vec![child, base]);

        let mut resolver = SchemaResolver::new();
        let descriptor = resolver.resolve(&bytes, "telemetry.Child").unwrap();
        assert_eq!(descriptor.full_name(), "telemetry.Child");
    }

    #[test]
    fn repeated_schema_across_channels_is_idempotent() {
        let file = scalar_file("telemetry/value.proto", "Value", vec![]);
        let bytes = encode_set(vec![file]);

        let mut resolver = SchemaResolver::new();
        resolver.resolve(&bytes, "telemetry.Value").unwrap();
        let second = resolver.resolve(&bytes, "telemetry.Value").unwrap();
        assert_eq!(second.full_name(), "telemetry.Value");
    }

    #[test]
    fn missing_dependency_reports_schema_unresolvable() {
        let child = scalar_file("telemetry/child.proto", "Child", vec!["telemetry/missing.proto"]);
        let bytes = encode_set(vec![child]);

        let mut resolver = SchemaResolver::new();
        let err = resolver.resolve(&bytes, "telemetry.Child").unwrap_err();
        assert!(matches!(err, IngestError::SchemaUnresolvable { .. }));
    }
}
