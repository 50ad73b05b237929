// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Paddock
//!
//! MCAP vehicle-telemetry ingestion and fan-out pipeline for a race car's
//! data-acquisition stack.
//!
//! An uploaded MCAP run is decoded message-by-message against its embedded
//! Protobuf schemas, fanned out to a fixed set of subscribers — an HDF5
//! exporter and a pair of plot accumulators — and the resulting artifacts
//! are shipped to object storage with a catalog record written to the run
//! repository. [`orchestrator::ingest_job`] is the single place that wires
//! this together; [`http`] exposes it over the network.
//!
//! ## Module map
//!
//! - [`core`] — the decoded-value tree, encoding tags, and error taxonomy
//!   every other module shares.
//! - [`io`] — the sequential, memory-mapped MCAP reader.
//! - [`schema`] — Protobuf descriptor resolution from embedded
//!   `FileDescriptorSet`s.
//! - [`decode`] — JSON and Protobuf decoders converging on [`core::DecodedMessage`].
//! - [`pubsub`] — the bounded single-producer/multi-consumer fan-out engine.
//! - [`plot`] — lat/lon track and velocity-over-time PNG accumulators.
//! - [`hdf5_writer`] — the chunked, type-preserving HDF5 exporter.
//! - [`upload`] — the disk-backed upload job queue and its state machine.
//! - [`admission`] — content-length and quota checks ahead of accepting an upload.
//! - [`orchestrator`] — per-job pipeline wiring.
//! - [`external`] — object store, run repository, and MATLAB dispatcher traits.
//! - [`http`] — the `axum` router exposing the pipeline over HTTP.
//! - [`config`] — process configuration read from the environment.

pub mod admission;
pub mod config;
pub mod core;
pub mod decode;
pub mod external;
pub mod hdf5_writer;
pub mod http;
pub mod io;
pub mod orchestrator;
pub mod plot;
pub mod pubsub;
pub mod schema;
pub mod upload;

pub use core::{DecodedMessage, DecodedValue, Encoding, IngestError, Result};
