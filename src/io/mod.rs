// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! MCAP I/O: file metadata, the sequential reader trait, and its
//! memory-mapped implementation.

pub mod formats;
pub mod metadata;
pub mod traits;

pub use formats::mcap::SequentialMcapReader;
pub use metadata::{ChannelInfo, FileInfo, RawMessage};
pub use traits::McapSource;
