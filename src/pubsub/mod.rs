// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bounded pub/sub fan-out from one MCAP producer to many named subscribers.

pub mod engine;
pub mod routing;

pub use engine::{run, Event, Subscriber};
pub use routing::RoutingTable;
