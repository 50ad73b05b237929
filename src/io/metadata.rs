// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shared metadata types describing an MCAP file's channels and messages.

use std::collections::HashMap;

/// Information about a channel/topic in an MCAP file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// Unique channel ID within the file.
    pub id: u16,
    /// Topic name (e.g., "/vehicle/position").
    pub topic: String,
    /// Message type name (the Protobuf message's fully-qualified name, or a
    /// JSON channel's declared type).
    pub message_type: String,
    /// Encoding format ("protobuf" or "json").
    pub encoding: String,
    /// Schema binary data (a serialized `FileDescriptorSet` for Protobuf
    /// channels; absent for JSON channels, which carry no schema).
    pub schema_data: Option<Vec<u8>>,
    /// Schema encoding ("protobuf"), mirroring the MCAP schema record.
    pub schema_encoding: Option<String>,
    /// Number of messages in this channel (0 if unknown).
    pub message_count: u64,
}

impl ChannelInfo {
    /// Create a new ChannelInfo.
    pub fn new(id: u16, topic: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
            message_type: message_type.into(),
            encoding: String::new(),
            schema_data: None,
            schema_encoding: None,
            message_count: 0,
        }
    }

    /// Set the encoding.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Set the schema data.
    pub fn with_schema_data(mut self, data: Vec<u8>, encoding: impl Into<String>) -> Self {
        self.schema_data = Some(data);
        self.schema_encoding = Some(encoding.into());
        self
    }

    /// Set the message count.
    pub fn with_message_count(mut self, count: u64) -> Self {
        self.message_count = count;
        self
    }
}

/// Raw message data with metadata (undecoded).
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Channel ID this message belongs to.
    pub channel_id: u16,
    /// Log timestamp (nanoseconds since Unix epoch).
    pub log_time: u64,
    /// Publish timestamp (nanoseconds since Unix epoch).
    pub publish_time: u64,
    /// Raw message data bytes.
    pub data: Vec<u8>,
    /// Sequence number, if present in the record.
    pub sequence: Option<u64>,
}

impl RawMessage {
    /// Create a new RawMessage.
    pub fn new(channel_id: u16, log_time: u64, publish_time: u64, data: Vec<u8>) -> Self {
        Self {
            channel_id,
            log_time,
            publish_time,
            data,
            sequence: None,
        }
    }

    /// Set the sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Get the data length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the message has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Information about an MCAP file, gathered at open time.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// File path.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// All channels in the file.
    pub channels: HashMap<u16, ChannelInfo>,
    /// Total message count (0 if unknown).
    pub message_count: u64,
    /// Start timestamp (nanoseconds, 0 if unknown).
    pub start_time: u64,
    /// End timestamp (nanoseconds, 0 if unknown).
    pub end_time: u64,
}

impl FileInfo {
    /// Create a new FileInfo.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            channels: HashMap::new(),
            message_count: 0,
            start_time: 0,
            end_time: 0,
        }
    }

    /// Check if the file has a specific topic.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.channels.values().any(|c| c.topic == topic)
    }

    /// Get all channels for a specific topic.
    pub fn channels_for_topic(&self, topic: &str) -> Vec<&ChannelInfo> {
        self.channels
            .values()
            .filter(|c| c.topic == topic)
            .collect()
    }

    /// Duration in nanoseconds, 0 if unknown or malformed.
    pub fn duration(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_info_builder() {
        let info = ChannelInfo::new(1, "/vehicle/position", "veh.Position")
            .with_encoding("protobuf")
            .with_message_count(100);

        assert_eq!(info.id, 1);
        assert_eq!(info.topic, "/vehicle/position");
        assert_eq!(info.encoding, "protobuf");
        assert_eq!(info.message_count, 100);
    }

    #[test]
    fn raw_message_len_and_sequence() {
        let msg = RawMessage::new(1, 1000, 900, b"test data".to_vec()).with_sequence(5);
        assert_eq!(msg.sequence, Some(5));
        assert_eq!(msg.len(), 9);
        assert!(!msg.is_empty());
    }

    #[test]
    fn file_info_topic_lookup() {
        let mut info = FileInfo::new("run.mcap");
        info.size = 1000;
        info.channels.insert(1, ChannelInfo::new(1, "/gps", "veh.Position"));
        info.channels.insert(2, ChannelInfo::new(2, "/gps", "veh.Position"));

        assert!(info.has_topic("/gps"));
        assert_eq!(info.channels_for_topic("/gps").len(), 2);
    }
}
