// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decoders that turn a channel's raw message bytes into a [`DecodedMessage`](crate::core::DecodedMessage).
//!
//! Both decoders converge on the same [`crate::core::DecodedValue`] tree so
//! the rest of the pipeline never branches on encoding.

pub mod json;
pub mod protobuf;

pub use json::decode_json;
pub use protobuf::decode_protobuf;
