// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout the ingestion pipeline.
//!
//! - [`IngestError`] - the pipeline's error taxonomy
//! - [`DecodedValue`] - the decoder-agnostic value tree
//! - [`Encoding`] - message encoding format identifier

pub mod error;
pub mod value;

pub use error::{IngestError, Result};
pub use value::{DecodedMessage, DecodedValue};

/// Encoding format identifier for a channel, taken from the MCAP channel
/// record's `message_encoding` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Protobuf binary encoding.
    Protobuf,
    /// JSON text encoding.
    Json,
}

/// Error returned when parsing an `Encoding` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseEncodingError {
    _private: (),
}

impl std::fmt::Display for ParseEncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid encoding name, expected 'protobuf' or 'json'")
    }
}

impl std::error::Error for ParseEncodingError {}

impl std::str::FromStr for Encoding {
    type Err = ParseEncodingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "protobuf" => Ok(Encoding::Protobuf),
            "json" => Ok(Encoding::Json),
            _ => Err(ParseEncodingError { _private: () }),
        }
    }
}

impl Encoding {
    /// Check if this encoding is Protobuf.
    pub fn is_protobuf(&self) -> bool {
        matches!(self, Encoding::Protobuf)
    }

    /// Check if this encoding is JSON.
    pub fn is_json(&self) -> bool {
        matches!(self, Encoding::Json)
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Protobuf => "protobuf",
            Encoding::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_encodings_case_insensitively() {
        assert_eq!("Protobuf".parse::<Encoding>().unwrap(), Encoding::Protobuf);
        assert_eq!("json".parse::<Encoding>().unwrap(), Encoding::Json);
        assert!("cdr".parse::<Encoding>().is_err());
    }
}
