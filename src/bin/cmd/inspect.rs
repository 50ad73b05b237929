// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - show MCAP file information, topics, schemas, stats.

use std::path::PathBuf;

use clap::Subcommand;
use paddock::io::{McapSource, SequentialMcapReader};

use crate::common::{format_duration, format_timestamp, Result};

/// Inspect an MCAP file's contents.
#[derive(Subcommand, Clone, Debug)]
pub enum InspectCmd {
    /// Show basic file information and summary
    Info {
        /// Input MCAP file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List all channels in the file
    Topics {
        /// Input MCAP file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Filter topics by substring
        #[arg(short, long)]
        filter: Option<String>,

        /// Show message counts
        #[arg(long)]
        counts: bool,
    },

    /// Show schema metadata for a topic or message type
    Schema {
        /// Input MCAP file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Topic or message type to show (shows all if not specified)
        #[arg(value_name = "TOPIC|TYPE")]
        topic_or_type: Option<String>,
    },

    /// Show file statistics
    Stats {
        /// Input MCAP file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

impl InspectCmd {
    pub fn run(self) -> Result<()> {
        match self {
            InspectCmd::Info { input } => cmd_info(input),
            InspectCmd::Topics { input, filter, counts } => cmd_topics(input, filter, counts),
            InspectCmd::Schema { input, topic_or_type } => cmd_schema(input, topic_or_type),
            InspectCmd::Stats { input } => cmd_stats(input),
        }
    }
}

fn cmd_info(input: PathBuf) -> Result<()> {
    let reader = SequentialMcapReader::open(&input)?;
    let info = reader.file_info();

    println!("=== {} ===", input.display());
    println!("Channels: {}", reader.channels().len());
    println!("Messages: {}", info.message_count);

    if info.start_time != 0 && info.end_time != 0 {
        println!("Start: {}", format_timestamp(info.start_time));
        println!("End: {}", format_timestamp(info.end_time));
        println!("Duration: {}", format_duration(info.duration()));
    }

    println!();
    println!("Channels:");
    let mut channels: Vec<_> = reader.channels().values().collect();
    channels.sort_by_key(|c| c.id);
    for ch in channels {
        println!(
            "  [{}] {} | {} | {} messages",
            ch.id, ch.topic, ch.message_type, ch.message_count
        );
    }

    Ok(())
}

fn cmd_topics(input: PathBuf, filter: Option<String>, show_counts: bool) -> Result<()> {
    let reader = SequentialMcapReader::open(&input)?;

    println!("=== Topics in {} ===", input.display());
    println!();

    let mut channels: Vec<_> = reader.channels().values().collect();
    channels.sort_by_key(|c| c.id);
    for channel in channels {
        if let Some(ref pattern) = filter {
            let lower = pattern.to_lowercase();
            if !channel.topic.to_lowercase().contains(&lower)
                && !channel.message_type.to_lowercase().contains(&lower)
            {
                continue;
            }
        }

        println!("Topic: {}", channel.topic);
        println!("  Type: {}", channel.message_type);
        println!("  Encoding: {}", channel.encoding);
        if show_counts {
            println!("  Messages: {}", channel.message_count);
        }
        println!();
    }

    Ok(())
}

fn cmd_schema(input: PathBuf, topic_or_type: Option<String>) -> Result<()> {
    let reader = SequentialMcapReader::open(&input)?;

    let mut found = false;
    let mut channels: Vec<_> = reader.channels().values().collect();
    channels.sort_by_key(|c| c.id);
    for channel in channels {
        if let Some(ref filter) = topic_or_type {
            if !channel.topic.contains(filter) && !channel.message_type.contains(filter) {
                continue;
            }
        }

        found = true;
        println!("=== {} @ {} ===", channel.message_type, channel.topic);
        match (&channel.schema_data, &channel.schema_encoding) {
            (Some(bytes), Some(encoding)) => {
                println!("  Schema encoding: {encoding}");
                println!("  Descriptor size: {} bytes", bytes.len());
            }
            _ => println!("  (self-describing, no schema record)"),
        }
        println!();
    }

    if !found {
        if let Some(filter) = topic_or_type {
            println!("No matching topic or type found: {filter}");
        }
    }

    Ok(())
}

fn cmd_stats(input: PathBuf) -> Result<()> {
    let reader = SequentialMcapReader::open(&input)?;
    let info = reader.file_info();

    println!("=== Statistics for {} ===", input.display());
    println!("Total messages: {}", info.message_count);
    println!("Channels: {}", reader.channels().len());

    let mut topics = std::collections::HashSet::new();
    for channel in reader.channels().values() {
        topics.insert(&channel.topic);
    }
    println!("Unique topics: {}", topics.len());

    if info.start_time != 0 && info.end_time != 0 {
        println!("Duration: {}", format_duration(info.duration()));
    }

    println!();
    println!("=== Per-Channel Breakdown ===");
    println!();

    let mut channels: Vec<_> = reader.channels().values().collect();
    channels.sort_by(|a, b| b.message_count.cmp(&a.message_count));

    for channel in channels {
        let percentage = if info.message_count > 0 {
            (channel.message_count as f64 / info.message_count as f64) * 100.0
        } else {
            0.0
        };
        println!("{}: {} ({:.1}%)", channel.topic, channel.message_count, percentage);
        println!("  Type: {}", channel.message_type);
    }

    Ok(())
}
