// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Protobuf schema resolution.
//!
//! MCAP schema records are self-describing: each carries a serialized
//! `FileDescriptorSet` rather than a reference to an externally known
//! `.proto` file. Channels are not guaranteed to declare their dependencies
//! before their dependents, and the same `.proto` file can legitimately be
//! repeated across channels that share a type. [`resolver::SchemaResolver`]
//! absorbs that disorder into one shared descriptor pool.

pub mod resolver;

pub use resolver::SchemaResolver;
