// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The raw (down-sampled, type-preserving) HDF5 writer subscriber.
//!
//! Output layout is a root `/data` group holding one sub-group per chunk
//! (`/data/chunk_0`, `/data/chunk_1`, …). Each chunk is a self-contained
//! snapshot: every signal observed since the last flush gets its own
//! compound-typed dataset (`{data, timestamp}`) named after its dotted
//! signal path, written once and closed. Signals are down-sampled to
//! 200 Hz per-signal (a 5 ms minimum gap between recorded samples); a
//! single watermark tracks the longest in-memory buffer across *all*
//! signals, and once it exceeds 100,000 samples the whole in-memory map is
//! flushed together into a fresh chunk group. Unlike the source this was
//! distilled from, scalar columns are NOT collapsed to `f64`: each observed
//! type category gets its own compound type, so an integer gear position or
//! a string fix-quality signal round-trips as its own type rather than
//! being coerced to a float.

use std::collections::HashMap;
use std::path::PathBuf;

use hdf5::types::VarLenUnicode;
use hdf5::{File as H5File, Group, H5Type};

use crate::core::{DecodedMessage, DecodedValue, IngestError, Result};
use crate::pubsub::{routing, Event, Subscriber};

/// Minimum gap between recorded samples for a single signal (200 Hz).
const SAMPLE_GATE_NS: u64 = 5_000_000;

/// Longest in-memory signal buffer, across every signal, before the whole
/// map is flushed together into a fresh chunk group.
const FLUSH_WATERMARK: usize = 100_000;

#[derive(H5Type, Clone, Copy)]
#[repr(C)]
struct F64Sample {
    data: f64,
    timestamp: f64,
}

#[derive(H5Type, Clone, Copy)]
#[repr(C)]
struct I64Sample {
    data: i64,
    timestamp: f64,
}

#[derive(H5Type, Clone, Copy)]
#[repr(C)]
struct U64Sample {
    data: u64,
    timestamp: f64,
}

#[derive(H5Type, Clone, Copy)]
#[repr(C)]
struct BoolSample {
    data: bool,
    timestamp: f64,
}

#[derive(H5Type, Clone)]
#[repr(C)]
struct StringSample {
    data: VarLenUnicode,
    timestamp: f64,
}

/// Buffered samples for one signal, tagged by the category first observed
/// for it. A later sample of a different category is a `TypeDrift` and is
/// dropped rather than written, to keep one dataset single-typed.
enum SignalBuffer {
    Float(Vec<F64Sample>),
    Int(Vec<I64Sample>),
    UInt(Vec<U64Sample>),
    Bool(Vec<BoolSample>),
    String(Vec<StringSample>),
}

impl SignalBuffer {
    fn category(&self) -> &'static str {
        match self {
            SignalBuffer::Float(_) => "float64",
            SignalBuffer::Int(_) => "int64",
            SignalBuffer::UInt(_) => "uint64",
            SignalBuffer::Bool(_) => "bool",
            SignalBuffer::String(_) => "string",
        }
    }

    fn len(&self) -> usize {
        match self {
            SignalBuffer::Float(v) => v.len(),
            SignalBuffer::Int(v) => v.len(),
            SignalBuffer::UInt(v) => v.len(),
            SignalBuffer::Bool(v) => v.len(),
            SignalBuffer::String(v) => v.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            SignalBuffer::Float(v) => v.clear(),
            SignalBuffer::Int(v) => v.clear(),
            SignalBuffer::UInt(v) => v.clear(),
            SignalBuffer::Bool(v) => v.clear(),
            SignalBuffer::String(v) => v.clear(),
        }
    }

    fn from_value(value: &DecodedValue, timestamp: f64) -> Option<Self> {
        Some(match value {
            DecodedValue::Float64(v) => SignalBuffer::Float(vec![F64Sample { data: *v, timestamp }]),
            DecodedValue::Int64(v) => SignalBuffer::Int(vec![I64Sample { data: *v, timestamp }]),
            DecodedValue::UInt64(v) => SignalBuffer::UInt(vec![U64Sample { data: *v, timestamp }]),
            DecodedValue::Bool(v) => SignalBuffer::Bool(vec![BoolSample { data: *v, timestamp }]),
            DecodedValue::String(v) | DecodedValue::Enum(v) => SignalBuffer::String(vec![StringSample {
                data: v.parse().unwrap_or_default(),
                timestamp,
            }]),
            DecodedValue::Struct(_) | DecodedValue::Array(_) | DecodedValue::Null => return None,
        })
    }

    fn push(&mut self, value: &DecodedValue, timestamp: f64) -> bool {
        match (self, value) {
            (SignalBuffer::Float(buf), DecodedValue::Float64(v)) => buf.push(F64Sample { data: *v, timestamp }),
            (SignalBuffer::Int(buf), DecodedValue::Int64(v)) => buf.push(I64Sample { data: *v, timestamp }),
            (SignalBuffer::UInt(buf), DecodedValue::UInt64(v)) => buf.push(U64Sample { data: *v, timestamp }),
            (SignalBuffer::Bool(buf), DecodedValue::Bool(v)) => buf.push(BoolSample { data: *v, timestamp }),
            (SignalBuffer::String(buf), DecodedValue::String(v) | DecodedValue::Enum(v)) => {
                buf.push(StringSample { data: v.parse().unwrap_or_default(), timestamp })
            }
            _ => return false,
        }
        true
    }

    /// Writes the buffer as one self-contained compound-typed table under
    /// `group`, named by the signal's dotted path. Called once per flush;
    /// the caller clears the buffer afterward.
    fn write_chunk(&self, group: &Group, name: &str) -> Result<()> {
        if self.len() == 0 {
            return Ok(());
        }
        macro_rules! write_table {
            ($buf:expr) => {{
                group
                    .new_dataset_builder()
                    .with_data($buf)
                    .create(name)
                    .map_err(|e| IngestError::storage_failure("hdf5", e.to_string()))?;
            }};
        }
        match self {
            SignalBuffer::Float(buf) => write_table!(buf.as_slice()),
            SignalBuffer::Int(buf) => write_table!(buf.as_slice()),
            SignalBuffer::UInt(buf) => write_table!(buf.as_slice()),
            SignalBuffer::Bool(buf) => write_table!(buf.as_slice()),
            SignalBuffer::String(buf) => write_table!(buf.as_slice()),
        }
        Ok(())
    }
}

struct SignalState {
    buffer: SignalBuffer,
    last_recorded_ns: u64,
}

/// The raw down-sampled HDF5 writer.
pub struct Hdf5Writer {
    output_path: PathBuf,
    file: Option<H5File>,
    data_group: Option<Group>,
    signals: HashMap<String, SignalState>,
    chunk_index: usize,
    /// Seconds-since-epoch of the first message seen; every timestamp
    /// written is relative to this anchor.
    t0: Option<f64>,
}

impl Hdf5Writer {
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            output_path,
            file: None,
            data_group: None,
            signals: HashMap::new(),
            chunk_index: 0,
            t0: None,
        }
    }

    fn record(&mut self, topic: &str, message: &DecodedMessage, log_time_ns: u64) -> Result<()> {
        let seconds = log_time_ns as f64 / 1_000_000_000.0;
        let t0 = *self.t0.get_or_insert(seconds);
        let timestamp = seconds - t0;

        let trimmed_topic = trim_topic(topic);
        let mut leaves = Vec::new();
        flatten(trimmed_topic, message, &mut leaves);

        for (path, value) in leaves {
            let gated_recently = self
                .signals
                .get(&path)
                .map(|s| log_time_ns.saturating_sub(s.last_recorded_ns) < SAMPLE_GATE_NS)
                .unwrap_or(false);
            if gated_recently {
                continue;
            }

            match self.signals.get_mut(&path) {
                Some(state) => {
                    if state.buffer.category() != value.category() && value.category() != "null" {
                        tracing::warn!(
                            path = %path,
                            previous = state.buffer.category(),
                            observed = value.category(),
                            "signal type drift, sample dropped"
                        );
                        continue;
                    }
                    if state.buffer.push(&value, timestamp) {
                        state.last_recorded_ns = log_time_ns;
                    }
                }
                None => {
                    if let Some(buffer) = SignalBuffer::from_value(&value, timestamp) {
                        self.signals.insert(
                            path,
                            SignalState {
                                buffer,
                                last_recorded_ns: log_time_ns,
                            },
                        );
                    }
                }
            }
        }

        self.flush_if_saturated()
    }

    /// Checks the single cross-signal watermark and, if tripped, flushes
    /// every buffered signal together into one fresh chunk group.
    fn flush_if_saturated(&mut self) -> Result<()> {
        let max_signal_length = self.signals.values().map(|s| s.buffer.len()).max().unwrap_or(0);
        if max_signal_length > FLUSH_WATERMARK {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Writes every non-empty signal buffer into a fresh `/data/chunk_N`
    /// group, then clears the in-memory map. A no-op if nothing is
    /// buffered or the file was never opened.
    fn flush_chunk(&mut self) -> Result<()> {
        let Some(data_group) = self.data_group.as_ref() else {
            return Ok(());
        };
        if self.signals.values().all(|s| s.buffer.len() == 0) {
            return Ok(());
        }

        let chunk_group = data_group
            .create_group(&format!("chunk_{}", self.chunk_index))
            .map_err(|e| IngestError::storage_failure("hdf5", e.to_string()))?;

        for (path, state) in self.signals.iter_mut() {
            state.buffer.write_chunk(&chunk_group, path)?;
            state.buffer.clear();
        }

        self.chunk_index += 1;
        Ok(())
    }
}

/// Trims a schema name or topic to its last dotted segment, e.g.
/// `pkg.VehicleData` -> `VehicleData`. A name with no dot is returned
/// unchanged.
fn trim_topic(topic: &str) -> &str {
    topic.rsplit('.').next().unwrap_or(topic)
}

/// Recursively flattens a decoded message into `(dotted_path, leaf_value)`
/// pairs. Arrays are expanded by index; structs recurse.
fn flatten(prefix: &str, message: &DecodedMessage, out: &mut Vec<(String, DecodedValue)>) {
    for (field, value) in message {
        let path = format!("{prefix}.{field}");
        flatten_value(&path, value, out);
    }
}

fn flatten_value(path: &str, value: &DecodedValue, out: &mut Vec<(String, DecodedValue)>) {
    match value {
        DecodedValue::Struct(nested) => flatten(path, nested, out),
        DecodedValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_value(&format!("{path}.{i}"), item, out);
            }
        }
        leaf => out.push((path.to_string(), leaf.clone())),
    }
}

impl Subscriber for Hdf5Writer {
    fn name(&self) -> &str {
        routing::MATLAB_WRITER
    }

    fn handle(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Init => {
                let file = H5File::create(&self.output_path)
                    .map_err(|e| IngestError::storage_failure("hdf5", e.to_string()))?;
                let data_group = file
                    .create_group("data")
                    .map_err(|e| IngestError::storage_failure("hdf5", e.to_string()))?;
                self.data_group = Some(data_group);
                self.file = Some(file);
                Ok(())
            }
            Event::Message { topic, message, log_time } => self.record(topic, message, *log_time),
            Event::Eof => self.flush_chunk(),
        }
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_expands_nested_struct_and_array() {
        let mut inner = DecodedMessage::new();
        inner.insert("x".to_string(), DecodedValue::Float64(1.0));
        let mut message = DecodedMessage::new();
        message.insert("position".to_string(), DecodedValue::Struct(inner));
        message.insert(
            "tags".to_string(),
            DecodedValue::Array(vec![DecodedValue::String("a".into())]),
        );

        let mut out = Vec::new();
        flatten("GPS", &message, &mut out);
        let paths: Vec<&str> = out.iter().map(|(p, _)| p.as_str()).collect();
        assert!(paths.contains(&"GPS.position.x"));
        assert!(paths.contains(&"GPS.tags.0"));
    }

    #[test]
    fn trim_topic_keeps_only_the_last_dotted_segment() {
        assert_eq!(trim_topic("pkg.VehicleData"), "VehicleData");
        assert_eq!(trim_topic("veh.nested.GPS"), "GPS");
        assert_eq!(trim_topic("/vehicle/state"), "/vehicle/state");
    }

    #[test]
    fn signal_buffer_rejects_category_mismatch_push() {
        let mut buffer = SignalBuffer::from_value(&DecodedValue::Float64(1.0), 0.0).unwrap();
        assert!(!buffer.push(&DecodedValue::Int64(2), 1.0));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn gate_drops_samples_within_five_milliseconds() {
        let mut writer = Hdf5Writer::new(PathBuf::from("/tmp/does-not-exist.h5"));
        writer.file = None; // exercise record() without touching the filesystem
        writer.data_group = None;
        let mut message = DecodedMessage::new();
        message.insert("rpm".to_string(), DecodedValue::Float64(6200.0));

        writer.record("/vehicle/state", &message, 0).unwrap();
        writer.record("/vehicle/state", &message, 1_000_000).unwrap();
        let state = &writer.signals["/vehicle/state.rpm"];
        assert_eq!(state.buffer.len(), 1, "second sample arrived within the 5ms gate");

        writer.record("/vehicle/state", &message, 6_000_000).unwrap();
        let state = &writer.signals["/vehicle/state.rpm"];
        assert_eq!(state.buffer.len(), 2, "third sample cleared the gate");
    }

    #[test]
    fn timestamps_are_relative_to_the_first_message_seen() {
        let mut writer = Hdf5Writer::new(PathBuf::from("/tmp/does-not-exist.h5"));
        writer.file = None;
        writer.data_group = None;
        let mut message = DecodedMessage::new();
        message.insert("rpm".to_string(), DecodedValue::Float64(1000.0));

        writer.record("veh.VehicleData", &message, 5_000_000_000).unwrap();
        writer.record("veh.VehicleData", &message, 5_100_000_000).unwrap();

        let state = &writer.signals["VehicleData.rpm"];
        match &state.buffer {
            SignalBuffer::Float(samples) => {
                assert_eq!(samples[0].timestamp, 0.0);
                assert!((samples[1].timestamp - 0.1).abs() < 1e-9);
            }
            _ => panic!("expected float buffer"),
        }
    }

    #[test]
    fn flush_resets_every_signal_together_on_the_shared_watermark() {
        let mut writer = Hdf5Writer::new(PathBuf::from("/tmp/does-not-exist.h5"));
        writer.file = None;
        writer.data_group = None;

        let mut message = DecodedMessage::new();
        message.insert("a".to_string(), DecodedValue::Float64(1.0));
        message.insert("b".to_string(), DecodedValue::Float64(2.0));

        for i in 0..5 {
            writer.record("veh.State", &message, i * SAMPLE_GATE_NS).unwrap();
        }
        // No file is open in this test, so flush_chunk() is a no-op and the
        // buffers keep growing; this just exercises that both signals
        // share one growth path under the same watermark check.
        assert_eq!(writer.signals["State.a"].buffer.len(), writer.signals["State.b"].buffer.len());
    }
}
