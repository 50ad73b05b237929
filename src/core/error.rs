// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Error taxonomy for the ingestion pipeline.
//!
//! One enum carries every failure mode named by the pipeline's error
//! handling design: admission rejection, per-message decode failure, fatal
//! schema/storage errors, and the non-fatal `TypeDrift`/`PlotRenderFailure`
//! advisories. Variants are hand-rolled rather than derived so each carries
//! the structured context a log line needs.

use std::fmt;

/// Errors produced anywhere in the ingestion pipeline.
#[derive(Debug, Clone)]
pub enum IngestError {
    /// An upload was rejected by the admission guard (missing length, or
    /// would exceed the configured budget).
    AdmissionRejected {
        /// Human-readable reason.
        reason: String,
    },

    /// A single message failed to decode; the pipeline logs and continues.
    DecodeFailure {
        /// Topic the message belonged to.
        topic: String,
        /// Underlying cause.
        cause: String,
    },

    /// The schema resolver could not make progress across a full pass.
    SchemaUnresolvable {
        /// Names of files that never resolved.
        unresolved: Vec<String>,
    },

    /// A schema declared an encoding this decoder does not understand.
    UnsupportedEncoding {
        /// The encoding tag as it appeared on the channel.
        encoding: String,
    },

    /// A filesystem, object-store, or database write failed. Fatal to the job.
    StorageFailure {
        /// Which subsystem failed (e.g. "hdf5", "object-store", "mongo").
        subsystem: String,
        /// Underlying cause.
        cause: String,
    },

    /// The plot renderer refused the data; the plot artifact is skipped.
    PlotRenderFailure {
        /// Which plot variant failed (e.g. "lat_lon", "velocity").
        variant: String,
        /// Underlying cause.
        cause: String,
    },

    /// A signal's observed leaf type changed between chunks. Logged, not fatal.
    TypeDrift {
        /// The signal path that drifted.
        path: String,
        /// Previously observed type name.
        previous: String,
        /// Newly observed type name.
        observed: String,
    },

    /// Catch-all for errors that cross a module boundary without a more
    /// specific taxonomy entry (wrapped I/O errors, lock poisoning, etc).
    Other(String),
}

impl IngestError {
    /// Build an `AdmissionRejected`.
    pub fn admission_rejected(reason: impl Into<String>) -> Self {
        IngestError::AdmissionRejected {
            reason: reason.into(),
        }
    }

    /// Build a `DecodeFailure`.
    pub fn decode_failure(topic: impl Into<String>, cause: impl Into<String>) -> Self {
        IngestError::DecodeFailure {
            topic: topic.into(),
            cause: cause.into(),
        }
    }

    /// Build a `SchemaUnresolvable`.
    pub fn schema_unresolvable(unresolved: Vec<String>) -> Self {
        IngestError::SchemaUnresolvable { unresolved }
    }

    /// Build an `UnsupportedEncoding`.
    pub fn unsupported_encoding(encoding: impl Into<String>) -> Self {
        IngestError::UnsupportedEncoding {
            encoding: encoding.into(),
        }
    }

    /// Build a `StorageFailure`.
    pub fn storage_failure(subsystem: impl Into<String>, cause: impl Into<String>) -> Self {
        IngestError::StorageFailure {
            subsystem: subsystem.into(),
            cause: cause.into(),
        }
    }

    /// Build a `PlotRenderFailure`.
    pub fn plot_render_failure(variant: impl Into<String>, cause: impl Into<String>) -> Self {
        IngestError::PlotRenderFailure {
            variant: variant.into(),
            cause: cause.into(),
        }
    }

    /// Build a `TypeDrift`.
    pub fn type_drift(
        path: impl Into<String>,
        previous: impl Into<String>,
        observed: impl Into<String>,
    ) -> Self {
        IngestError::TypeDrift {
            path: path.into(),
            previous: previous.into(),
            observed: observed.into(),
        }
    }

    /// True for errors that must mark the enclosing job `Failed`; false for
    /// errors the pipeline absorbs and continues past (§7 propagation policy).
    pub fn is_fatal_to_job(&self) -> bool {
        matches!(
            self,
            IngestError::SchemaUnresolvable { .. }
                | IngestError::UnsupportedEncoding { .. }
                | IngestError::StorageFailure { .. }
        )
    }

    /// Structured fields for a `tracing` event, matching the house
    /// convention of logging a `context`/`cause`/reason style tuple list
    /// rather than only the `Display` string.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            IngestError::AdmissionRejected { reason } => vec![("reason", reason.clone())],
            IngestError::DecodeFailure { topic, cause } => {
                vec![("topic", topic.clone()), ("cause", cause.clone())]
            }
            IngestError::SchemaUnresolvable { unresolved } => {
                vec![("unresolved", unresolved.join(","))]
            }
            IngestError::UnsupportedEncoding { encoding } => {
                vec![("encoding", encoding.clone())]
            }
            IngestError::StorageFailure { subsystem, cause } => {
                vec![("subsystem", subsystem.clone()), ("cause", cause.clone())]
            }
            IngestError::PlotRenderFailure { variant, cause } => {
                vec![("variant", variant.clone()), ("cause", cause.clone())]
            }
            IngestError::TypeDrift {
                path,
                previous,
                observed,
            } => vec![
                ("path", path.clone()),
                ("previous", previous.clone()),
                ("observed", observed.clone()),
            ],
            IngestError::Other(msg) => vec![("message", msg.clone())],
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::AdmissionRejected { reason } => {
                write!(f, "admission rejected: {reason}")
            }
            IngestError::DecodeFailure { topic, cause } => {
                write!(f, "decode failure on topic '{topic}': {cause}")
            }
            IngestError::SchemaUnresolvable { unresolved } => write!(
                f,
                "schema unresolvable, no progress with files remaining: {}",
                unresolved.join(", ")
            ),
            IngestError::UnsupportedEncoding { encoding } => {
                write!(f, "unsupported encoding: '{encoding}'")
            }
            IngestError::StorageFailure { subsystem, cause } => {
                write!(f, "storage failure in {subsystem}: {cause}")
            }
            IngestError::PlotRenderFailure { variant, cause } => {
                write!(f, "plot render failure ({variant}): {cause}")
            }
            IngestError::TypeDrift {
                path,
                previous,
                observed,
            } => write!(
                f,
                "type drift on signal '{path}': was {previous}, now {observed}"
            ),
            IngestError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::StorageFailure {
            subsystem: "io".to_string(),
            cause: err.to_string(),
        }
    }
}

/// Result type for ingestion pipeline operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification_matches_taxonomy() {
        assert!(IngestError::schema_unresolvable(vec!["a.proto".into()]).is_fatal_to_job());
        assert!(IngestError::unsupported_encoding("cbor").is_fatal_to_job());
        assert!(IngestError::storage_failure("hdf5", "disk full").is_fatal_to_job());
        assert!(!IngestError::decode_failure("GPS", "bad varint").is_fatal_to_job());
        assert!(!IngestError::plot_render_failure("lat_lon", "oom").is_fatal_to_job());
        assert!(!IngestError::type_drift("GPS.lat", "float64", "string").is_fatal_to_job());
    }

    #[test]
    fn display_includes_context() {
        let err = IngestError::decode_failure("veh.VehicleData", "truncated varint");
        let msg = err.to_string();
        assert!(msg.contains("veh.VehicleData"));
        assert!(msg.contains("truncated varint"));
    }

    #[test]
    fn log_fields_cover_every_variant() {
        let samples = vec![
            IngestError::admission_rejected("over quota"),
            IngestError::decode_failure("t", "c"),
            IngestError::schema_unresolvable(vec!["x".into()]),
            IngestError::unsupported_encoding("cbor"),
            IngestError::storage_failure("hdf5", "c"),
            IngestError::plot_render_failure("lat_lon", "c"),
            IngestError::type_drift("p", "float64", "string"),
            IngestError::Other("misc".into()),
        ];
        for err in samples {
            assert!(!err.log_fields().is_empty());
        }
    }
}
