// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Plot accumulator subscribers: lat/lon track maps and velocity-over-time
//! charts, rendered to PNG as each run finishes.

pub mod accumulator;

pub use accumulator::{LatLonPlotAccumulator, VelocityPlotAccumulator};
