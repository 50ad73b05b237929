// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! MCAP container format support: opcode constants and the sequential reader.

pub mod constants;
pub mod sequential;

pub use sequential::SequentialMcapReader;
