// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core trait for reading an MCAP source sequentially.
//!
//! The pipeline has exactly one producer (§4.C): a single thread that reads
//! an MCAP file end to end and pushes raw messages into the pub/sub engine.
//! There is no pluggable multi-format or parallel-chunk reading surface —
//! that generality belongs to a format-conversion tool, not an ingestion
//! pipeline with one input format.

use std::collections::HashMap;

use crate::core::Result;

use super::metadata::{ChannelInfo, FileInfo, RawMessage};

/// A sequential source of raw MCAP messages.
pub trait McapSource: Send {
    /// All channels declared in the file (from the summary section, or
    /// discovered by scanning when no summary is present).
    fn channels(&self) -> &HashMap<u16, ChannelInfo>;

    /// Channel info by topic name. Returns the first match; a single MCAP
    /// run is not expected to declare the same topic on two channels, but
    /// nothing prevents it.
    fn channel_by_topic(&self, topic: &str) -> Option<&ChannelInfo> {
        self.channels().values().find(|c| c.topic == topic)
    }

    /// File-level metadata gathered at open time.
    fn file_info(&self) -> &FileInfo;

    /// Iterate every message in log-time order paired with its channel info.
    fn iter_raw(&self) -> Box<dyn Iterator<Item = Result<(RawMessage, ChannelInfo)>> + '_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        channels: HashMap<u16, ChannelInfo>,
        file_info: FileInfo,
    }

    impl McapSource for FixedSource {
        fn channels(&self) -> &HashMap<u16, ChannelInfo> {
            &self.channels
        }

        fn file_info(&self) -> &FileInfo {
            &self.file_info
        }

        fn iter_raw(&self) -> Box<dyn Iterator<Item = Result<(RawMessage, ChannelInfo)>> + '_> {
            Box::new(std::iter::empty())
        }
    }

    #[test]
    fn channel_by_topic_finds_match() {
        let mut channels = HashMap::new();
        channels.insert(1, ChannelInfo::new(1, "/gps", "veh.Position"));
        let source = FixedSource {
            channels,
            file_info: FileInfo::new("run.mcap"),
        };

        assert!(source.channel_by_topic("/gps").is_some());
        assert!(source.channel_by_topic("/missing").is_none());
    }
}
