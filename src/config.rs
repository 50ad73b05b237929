// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Process configuration, read once at startup from the environment.

use crate::core::{IngestError, Result};

/// Default upload budget: 10 GiB.
const DEFAULT_MAX_TOTAL_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Process-wide configuration. The core pipeline only consumes
/// `max_total_size`, `upload_dir`, and `production_mode` directly; the rest
/// exist so a binary wiring real `ObjectStore`/`RunRepository`/
/// `MatlabDispatcher` implementations has what it needs to construct them.
#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub aws_region: String,
    pub aws_s3_run_bucket: String,
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub matlab_uri: String,
    pub production_mode: bool,
    pub upload_dir: String,
    pub max_total_size: u64,
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| IngestError::Other(format!("missing required environment variable {name}")))
}

impl Config {
    /// Load configuration from the process environment. Fails hard (never
    /// panics) when a required variable is absent, rather than silently
    /// defaulting to an empty credential.
    pub fn from_env() -> Result<Self> {
        let max_total_size = std::env::var("MAX_TOTAL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOTAL_SIZE);
        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string());
        let production_mode = std::env::var("ENV").map(|v| v == "PRODUCTION").unwrap_or(false);

        Ok(Self {
            mongodb_uri: require_var("MONGODB_URI")?,
            aws_region: require_var("AWS_REGION")?,
            aws_s3_run_bucket: require_var("AWS_S3_RUN_BUCKET")?,
            aws_access_key: require_var("AWS_ACCESS_KEY")?,
            aws_secret_key: require_var("AWS_SECRET_KEY")?,
            matlab_uri: require_var("MATLAB_URI")?,
            production_mode,
            upload_dir,
            max_total_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_var_reports_missing_variable_by_name() {
        let err = require_var("PADDOCK_DEFINITELY_UNSET_VAR").unwrap_err();
        match err {
            IngestError::Other(msg) => assert!(msg.contains("PADDOCK_DEFINITELY_UNSET_VAR")),
            other => panic!("expected Other, got {other:?}"),
        }
    }
}
