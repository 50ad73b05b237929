// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Wires one queued MCAP file through schema resolution, decode, fan-out,
//! export, and upload.
//!
//! This is the single place that ties `schema`, `decode`, `pubsub`, `plot`,
//! `hdf5_writer`, and `external` together into the per-job pipeline the
//! upload queue drives. Everything it calls is independently testable; this
//! module is deliberately thin plumbing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use prost_reflect::MessageDescriptor;

use crate::core::{DecodedMessage, Encoding, IngestError, Result};
use crate::decode::{decode_json, decode_protobuf};
use crate::external::{MatlabDispatcher, ObjectStore, RunRecord, RunRepository};
use crate::hdf5_writer::Hdf5Writer;
use crate::io::metadata::ChannelInfo;
use crate::io::{McapSource, SequentialMcapReader};
use crate::plot::{LatLonPlotAccumulator, VelocityPlotAccumulator};
use crate::pubsub::{self, RoutingTable, Subscriber};
use crate::schema::SchemaResolver;
use crate::upload::{Job, JobDate};

/// Default dotted field paths and routing topics used to drive the plot
/// accumulators and the pub/sub routing table. A deployment with a
/// differently-shaped telemetry schema would need to override these;
/// exposing them as a struct rather than hardcoding them keeps that a
/// configuration change, not a code change.
pub struct FieldPaths {
    pub lat_path: &'static str,
    pub lon_path: &'static str,
    pub rpm_path: &'static str,
    /// Schema-declared name of the GPS position channel (§8: `pos.GPS`).
    pub position_topic: &'static str,
    /// Schema-declared name of the vehicle state channel (§8: `veh.VehicleData`).
    pub vehicle_state_topic: &'static str,
}

impl Default for FieldPaths {
    fn default() -> Self {
        Self {
            lat_path: "lat",
            lon_path: "lon",
            rpm_path: "rpm",
            position_topic: "pos.GPS",
            vehicle_state_topic: "veh.VehicleData",
        }
    }
}

/// Resolved artifact locations plus the run record written for a completed
/// job.
pub struct IngestOutcome {
    pub hdf5_path: PathBuf,
    pub lat_lon_plot_path: PathBuf,
    pub velocity_plot_path: PathBuf,
    pub mcap_object_key: String,
    pub hdf5_object_key: String,
    pub run_record: RunRecord,
}

/// Everything one ingest needs, gathered in one place so `ingest_job`'s
/// signature doesn't grow a parameter every time a collaborator is added.
pub struct IngestContext {
    pub object_store: Arc<dyn ObjectStore>,
    pub run_repository: Arc<dyn RunRepository>,
    pub matlab_dispatcher: Arc<dyn MatlabDispatcher>,
    pub scratch_dir: PathBuf,
    pub field_paths: FieldPaths,
    /// When set, a second copy of each run's MCAP is written under
    /// `/data/run_metadata/MM-DD-YYYY/` (§6's on-disk layout note).
    pub production_mode: bool,
    /// The process-wide shutdown signal (§5). Observed by the pub/sub
    /// producer: once set, it stops pulling further decoded messages but
    /// still delivers `Eof` to every subscriber so the in-flight job still
    /// finishes and uploads whatever it managed to export.
    pub cancel: Arc<AtomicBool>,
}

/// Reads a recording date out of the MCAP's own statistics (its earliest
/// message timestamp) when one is present, falling back to the time the job
/// was enqueued otherwise.
fn resolve_job_date(reader: &SequentialMcapReader, enqueued_at: DateTime<Utc>) -> JobDate {
    job_date_from_start_time(reader.file_info().start_time, enqueued_at)
}

/// `start_time_ns` is the file's earliest message log-time (nanoseconds
/// since the Unix epoch), or 0 when the file carries no messages. Split out
/// from `resolve_job_date` so the date math is testable without opening a
/// real MCAP file.
fn job_date_from_start_time(start_time_ns: u64, enqueued_at: DateTime<Utc>) -> JobDate {
    if start_time_ns == 0 {
        return JobDate::from_enqueue_time(enqueued_at);
    }
    match DateTime::<Utc>::from_timestamp(
        (start_time_ns / 1_000_000_000) as i64,
        (start_time_ns % 1_000_000_000) as u32,
    ) {
        Some(date) => JobDate::from_metadata(date),
        None => JobDate::from_enqueue_time(enqueued_at),
    }
}

/// Decodes every raw message in the file against its channel's schema,
/// resolving Protobuf descriptors lazily and caching one per channel.
///
/// Returns a lazy iterator rather than a materialized `Vec`: `pubsub::run`
/// pulls one decoded message at a time, so a slow subscriber's backpressure
/// actually bounds how far ahead of it the decoder runs, instead of the
/// whole run sitting fully decoded in memory before fan-out even starts
/// (§2/§4.C/§9).
fn decoded_messages<'a>(
    reader: &'a SequentialMcapReader,
    resolver: &'a mut SchemaResolver,
) -> impl Iterator<Item = Result<(String, DecodedMessage, u64)>> + 'a {
    let mut descriptors: HashMap<u16, MessageDescriptor> = HashMap::new();
    reader.iter_raw().map(move |item| {
        let (raw, channel) = item?;
        decode_one(&raw.data, raw.log_time, &channel, &mut descriptors, resolver)
    })
}

fn decode_one(
    data: &[u8],
    log_time: u64,
    channel: &ChannelInfo,
    descriptors: &mut HashMap<u16, MessageDescriptor>,
    resolver: &mut SchemaResolver,
) -> Result<(String, DecodedMessage, u64)> {
    let encoding: Encoding = channel
        .encoding
        .parse()
        .map_err(|_| IngestError::unsupported_encoding(channel.encoding.clone()))?;

    let message = match encoding {
        Encoding::Json => decode_json(&channel.topic, data)?,
        Encoding::Protobuf => {
            let descriptor = match descriptors.get(&channel.id) {
                Some(d) => d.clone(),
                None => {
                    let schema_data = channel.schema_data.as_deref().ok_or_else(|| {
                        IngestError::schema_unresolvable(vec![channel.message_type.clone()])
                    })?;
                    let resolved = resolver.resolve(schema_data, &channel.message_type)?;
                    descriptors.insert(channel.id, resolved.clone());
                    resolved
                }
            };
            decode_protobuf(&channel.message_type, data, &descriptor)?
        }
    };

    Ok((channel.message_type.clone(), message, log_time))
}

fn build_subscribers(
    hdf5_path: PathBuf,
    lat_lon_plot_path: PathBuf,
    velocity_plot_path: PathBuf,
    field_paths: &FieldPaths,
) -> Vec<Box<dyn Subscriber>> {
    vec![
        Box::new(Hdf5Writer::new(hdf5_path)),
        Box::new(LatLonPlotAccumulator::new(
            lat_lon_plot_path,
            field_paths.lat_path,
            field_paths.lon_path,
        )),
        Box::new(VelocityPlotAccumulator::new(velocity_plot_path, field_paths.rpm_path)),
    ]
}

/// Runs the full pipeline for one job: decode, fan-out, export, upload, and
/// run-record insertion. On success, the job's scratch artifacts (the
/// source MCAP, the HDF5 export, and the rendered plots) are removed from
/// disk; the job itself is left to the caller to mark completed/failed so
/// the upload queue's byte accounting happens in one place.
pub async fn ingest_job(ctx: &IngestContext, job: &mut Job, enqueued_at: DateTime<Utc>) -> Result<IngestOutcome> {
    job.start(Utc::now());

    let scratch_path = PathBuf::from(&job.scratch_path);
    let run_id = job.id.to_string();

    let reader = SequentialMcapReader::open(&scratch_path)?;
    let job_date = resolve_job_date(&reader, enqueued_at);

    let mut resolver = SchemaResolver::new();
    let messages = decoded_messages(&reader, &mut resolver);
    let routing_table = RoutingTable::new(ctx.field_paths.position_topic, ctx.field_paths.vehicle_state_topic);

    let hdf5_path = ctx.scratch_dir.join(format!("{run_id}.h5"));
    let lat_lon_plot_path = ctx.scratch_dir.join(format!("{run_id}_track.png"));
    let velocity_plot_path = ctx.scratch_dir.join(format!("{run_id}_velocity.png"));

    let subscribers = build_subscribers(
        hdf5_path.clone(),
        lat_lon_plot_path.clone(),
        velocity_plot_path.clone(),
        &ctx.field_paths,
    );

    let results = pubsub::run(subscribers, messages, &routing_table, &ctx.cancel);
    for (name, outcome) in &results {
        if let Err(err) = outcome {
            tracing::warn!(subscriber = %name, error = %err, "subscriber finished with an error");
            if err.is_fatal_to_job() {
                return Err(IngestError::storage_failure(
                    "orchestrator",
                    format!("subscriber '{name}' failed fatally: {err}"),
                ));
            }
        }
    }

    let (year, month, day) = (job_date.date.format("%Y"), job_date.date.format("%m"), job_date.date.format("%d"));
    let prefix = format!("{year}-{month}-{day}/{run_id}");
    let mcap_object_key = format!("{prefix}.mcap");
    let hdf5_object_key = format!("{prefix}.h5");
    let lat_lon_object_key = format!("{prefix}_track.png");
    let velocity_object_key = format!("{prefix}_velocity.png");

    // Open Question 2: the scratch file was already read to EOF by
    // `reader.iter_raw()` above. Reopening here (rather than rewinding that
    // handle) guarantees the bytes shipped to object storage are a fresh,
    // complete read of the file, not whatever the mmap's cursor state left
    // behind.
    let mcap_bytes = std::fs::read(&scratch_path)
        .map_err(|e| IngestError::storage_failure("scratch-reopen", e.to_string()))?;
    if ctx.production_mode {
        write_run_metadata_copy(&job_date, &run_id, &mcap_bytes);
    }
    ctx.object_store.put(&mcap_object_key, mcap_bytes).await?;

    let hdf5_bytes = std::fs::read(&hdf5_path)
        .map_err(|e| IngestError::storage_failure("scratch-reopen", e.to_string()))?;
    ctx.object_store.put(&hdf5_object_key, hdf5_bytes).await?;

    upload_plot_if_present(ctx, &lat_lon_plot_path, &lat_lon_object_key).await?;
    upload_plot_if_present(ctx, &velocity_plot_path, &velocity_object_key).await?;

    let run_record = RunRecord {
        run_id: run_id.clone(),
        date: job_date.date,
        object_store_key: mcap_object_key.clone(),
        size_bytes: job.size_bytes,
        location: None,
        notes: None,
        event_type: None,
        car_model: None,
    };
    ctx.run_repository.create(run_record.clone()).await?;

    ctx.matlab_dispatcher.submit(&hdf5_object_key).await?;

    cleanup_scratch(&scratch_path, &hdf5_path, &lat_lon_plot_path, &velocity_plot_path);

    job.complete(Utc::now());

    Ok(IngestOutcome {
        hdf5_path,
        lat_lon_plot_path,
        velocity_plot_path,
        mcap_object_key,
        hdf5_object_key,
        run_record,
    })
}

const PRODUCTION_RUN_METADATA_DIR: &str = "/data/run_metadata";

/// Best-effort volume copy for production deployments. Failure here is
/// logged, not propagated: the object-store upload is the artifact of
/// record, this is a convenience mirror for local operator tooling.
fn write_run_metadata_copy(job_date: &JobDate, run_id: &str, bytes: &[u8]) {
    let dir = Path::new(PRODUCTION_RUN_METADATA_DIR).join(job_date.date.format("%m-%d-%Y").to_string());
    if let Err(err) = std::fs::create_dir_all(&dir) {
        tracing::warn!(dir = %dir.display(), error = %err, "failed to create run metadata volume directory");
        return;
    }
    let path = dir.join(format!("{run_id}.mcap"));
    if let Err(err) = std::fs::write(&path, bytes) {
        tracing::warn!(path = %path.display(), error = %err, "failed to write run metadata volume copy");
    }
}

async fn upload_plot_if_present(ctx: &IngestContext, path: &Path, object_key: &str) -> Result<()> {
    match std::fs::read(path) {
        Ok(bytes) => ctx.object_store.put(object_key, bytes).await,
        Err(_) => {
            tracing::debug!(path = %path.display(), "plot was not rendered, skipping upload");
            Ok(())
        }
    }
}

fn cleanup_scratch(scratch_path: &Path, hdf5_path: &Path, lat_lon_plot_path: &Path, velocity_plot_path: &Path) {
    for path in [scratch_path, hdf5_path, lat_lon_plot_path, velocity_plot_path] {
        if let Err(err) = std::fs::remove_file(path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove scratch artifact");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_enqueue_time_when_no_messages_recorded() {
        let enqueued_at = Utc::now();
        let date = job_date_from_start_time(0, enqueued_at);
        assert_eq!(date.source, crate::upload::job::DateSource::EnqueueTime);
        assert_eq!(date.date, enqueued_at);
    }

    #[test]
    fn reads_date_from_earliest_message_timestamp() {
        let start_time_ns = 1_700_000_000_000_000_000u64; // 2023-11-14T22:13:20Z
        let date = job_date_from_start_time(start_time_ns, Utc::now());
        assert_eq!(date.source, crate::upload::job::DateSource::Metadata);
        assert_eq!(date.date.timestamp(), 1_700_000_000);
    }

    #[test]
    fn default_field_paths_match_documented_topics() {
        let paths = FieldPaths::default();
        assert_eq!(paths.lat_path, "lat");
        assert_eq!(paths.rpm_path, "rpm");
        assert_eq!(paths.position_topic, "pos.GPS");
        assert_eq!(paths.vehicle_state_topic, "veh.VehicleData");
    }
}
