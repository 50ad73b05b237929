// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequential MCAP reader.
//!
//! Opens a file, memory-maps it, and prefers the summary section (if
//! present) to build the channel table without a full scan. When no summary
//! is present — or it fails to parse — falls back to streaming the whole
//! file once to discover channels as they're declared.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::core::{IngestError, Result};
use crate::io::metadata::{ChannelInfo, FileInfo, RawMessage};
use crate::io::traits::McapSource;

/// A sequential, memory-mapped MCAP reader.
pub struct SequentialMcapReader {
    path: std::path::PathBuf,
    mmap: Mmap,
    channels: HashMap<u16, ChannelInfo>,
    file_info: FileInfo,
}

impl SequentialMcapReader {
    /// Open an MCAP file for sequential reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| IngestError::storage_failure("mcap-open", e.to_string()))?;
        let size = file
            .metadata()
            .map_err(|e| IngestError::storage_failure("mcap-open", e.to_string()))?
            .len();
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| IngestError::storage_failure("mcap-mmap", e.to_string()))?
        };

        let mut file_info = FileInfo::new(path.display().to_string());
        file_info.size = size;

        let channels = match mcap::Summary::read(&mmap) {
            Ok(Some(summary)) => {
                let table = channels_from_summary(&summary);
                file_info.message_count = summary
                    .stats
                    .as_ref()
                    .map(|s| s.message_count)
                    .unwrap_or(0);
                file_info.start_time = summary
                    .stats
                    .as_ref()
                    .map(|s| s.message_start_time)
                    .unwrap_or(0);
                file_info.end_time = summary
                    .stats
                    .as_ref()
                    .map(|s| s.message_end_time)
                    .unwrap_or(0);
                table
            }
            Ok(None) => {
                tracing::warn!(context = "mcap-summary", path = %path.display(), "no summary section, scanning");
                scan_channels(&mmap, &mut file_info)?
            }
            Err(err) => {
                tracing::warn!(context = "mcap-summary", path = %path.display(), error = %err, "summary read failed, scanning");
                scan_channels(&mmap, &mut file_info)?
            }
        };

        file_info.channels = channels.clone();

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            channels,
            file_info,
        })
    }

    /// The path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn channels_from_summary(summary: &mcap::Summary) -> HashMap<u16, ChannelInfo> {
    let mut table = HashMap::new();
    for channel in summary.channels.values() {
        let mut info = ChannelInfo::new(channel.id, channel.topic.clone(), String::new())
            .with_encoding(channel.message_encoding.clone());
        if let Some(schema) = channel.schema.as_ref() {
            info.message_type = schema.name.clone();
            info = info.with_schema_data(schema.data.to_vec(), schema.encoding.clone());
        }
        if let Some(stats) = summary.stats.as_ref() {
            if let Some(count) = stats.channel_message_counts.get(&channel.id) {
                info = info.with_message_count(*count);
            }
        }
        table.insert(channel.id, info);
    }
    table
}

fn scan_channels(mmap: &Mmap, file_info: &mut FileInfo) -> Result<HashMap<u16, ChannelInfo>> {
    let mut table: HashMap<u16, ChannelInfo> = HashMap::new();
    let stream = mcap::MessageStream::new(mmap)
        .map_err(|e| IngestError::storage_failure("mcap-scan", e.to_string()))?;

    let mut count = 0u64;
    let mut start = u64::MAX;
    let mut end = 0u64;

    for message in stream {
        let message = message.map_err(|e| IngestError::storage_failure("mcap-scan", e.to_string()))?;
        table.entry(message.channel.id).or_insert_with(|| {
            let mut info =
                ChannelInfo::new(message.channel.id, message.channel.topic.clone(), String::new())
                    .with_encoding(message.channel.message_encoding.clone());
            if let Some(schema) = message.channel.schema.as_ref() {
                info.message_type = schema.name.clone();
                info = info.with_schema_data(schema.data.to_vec(), schema.encoding.clone());
            }
            info
        });
        count += 1;
        start = start.min(message.log_time);
        end = end.max(message.log_time);
    }

    file_info.message_count = count;
    if count > 0 {
        file_info.start_time = start;
        file_info.end_time = end;
    }

    Ok(table)
}

/// Iterator over raw messages paired with their channel info, replaying the
/// mapped file through `mcap::MessageStream`. Borrows from the reader, so
/// the reader must outlive it.
struct SequentialRawIter<'a> {
    stream: mcap::MessageStream<'a>,
    channels: &'a HashMap<u16, ChannelInfo>,
}

impl Iterator for SequentialRawIter<'_> {
    type Item = Result<(RawMessage, ChannelInfo)>;

    fn next(&mut self) -> Option<Self::Item> {
        let message = match self.stream.next()? {
            Ok(m) => m,
            Err(err) => {
                return Some(Err(IngestError::storage_failure(
                    "mcap-read",
                    err.to_string(),
                )))
            }
        };
        let channel = self
            .channels
            .get(&message.channel.id)
            .cloned()
            .unwrap_or_else(|| {
                ChannelInfo::new(message.channel.id, message.channel.topic.clone(), String::new())
            });
        let raw = RawMessage::new(
            message.channel.id,
            message.log_time,
            message.publish_time,
            message.data.to_vec(),
        )
        .with_sequence(message.sequence as u64);
        Some(Ok((raw, channel)))
    }
}

impl McapSource for SequentialMcapReader {
    fn channels(&self) -> &HashMap<u16, ChannelInfo> {
        &self.channels
    }

    fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    fn iter_raw(&self) -> Box<dyn Iterator<Item = Result<(RawMessage, ChannelInfo)>> + '_> {
        match mcap::MessageStream::new(&self.mmap) {
            Ok(stream) => Box::new(SequentialRawIter {
                stream,
                channels: &self.channels,
            }),
            Err(err) => {
                let err = IngestError::storage_failure("mcap-read", err.to_string());
                Box::new(std::iter::once(Err(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_file_reports_storage_failure() {
        let err = SequentialMcapReader::open("/nonexistent/path.mcap").unwrap_err();
        assert!(matches!(err, IngestError::StorageFailure { .. }));
    }
}
