// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Dispatch to the MATLAB processing service once a run's HDF5 export has
//! landed in object storage.
//!
//! The service is submit/poll: submitting an HDF5 object key hands back a
//! MATLAB-side job ID, and that ID is later polled for completion. This
//! crate only drives the submit half of that handshake; polling exists so a
//! future status-reporting surface (§2.1's run listing) has somewhere to
//! call into.

use async_trait::async_trait;

use crate::core::{IngestError, Result};

/// MATLAB-side processing status for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatlabJobStatus {
    Queued,
    Running,
    Done,
    Failed(String),
}

/// The MATLAB processing service's submit/poll surface.
#[async_trait]
pub trait MatlabDispatcher: Send + Sync {
    /// Submit an HDF5 object key for processing; returns MATLAB's job ID.
    async fn submit(&self, h5_key: &str) -> Result<String>;

    /// Poll a previously submitted job's status.
    async fn poll(&self, job_id: &str) -> Result<MatlabJobStatus>;
}

/// `MatlabDispatcher` backed by an HTTP call to the MATLAB service.
pub struct HttpMatlabDispatcher {
    client: reqwest::Client,
    base_uri: String,
}

impl HttpMatlabDispatcher {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_uri: base_uri.into(),
        }
    }
}

#[async_trait]
impl MatlabDispatcher for HttpMatlabDispatcher {
    async fn submit(&self, h5_key: &str) -> Result<String> {
        let url = format!("{}/runs", self.base_uri.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "h5_key": h5_key }))
            .send()
            .await
            .map_err(|e| IngestError::storage_failure("matlab-dispatcher", e.to_string()))?;

        if !response.status().is_success() {
            return Err(IngestError::storage_failure(
                "matlab-dispatcher",
                format!("MATLAB service responded with {}", response.status()),
            ));
        }

        #[derive(serde::Deserialize)]
        struct SubmitResponse {
            job_id: String,
        }
        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| IngestError::storage_failure("matlab-dispatcher", e.to_string()))?;
        Ok(body.job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<MatlabJobStatus> {
        let url = format!("{}/runs/{job_id}", self.base_uri.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IngestError::storage_failure("matlab-dispatcher", e.to_string()))?;

        if !response.status().is_success() {
            return Err(IngestError::storage_failure(
                "matlab-dispatcher",
                format!("MATLAB service responded with {}", response.status()),
            ));
        }

        #[derive(serde::Deserialize)]
        #[serde(tag = "status", rename_all = "lowercase")]
        enum PollResponse {
            Queued,
            Running,
            Done,
            Failed { reason: String },
        }
        let body: PollResponse = response
            .json()
            .await
            .map_err(|e| IngestError::storage_failure("matlab-dispatcher", e.to_string()))?;
        Ok(match body {
            PollResponse::Queued => MatlabJobStatus::Queued,
            PollResponse::Running => MatlabJobStatus::Running,
            PollResponse::Done => MatlabJobStatus::Done,
            PollResponse::Failed { reason } => MatlabJobStatus::Failed(reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingDispatcher {
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MatlabDispatcher for RecordingDispatcher {
        async fn submit(&self, h5_key: &str) -> Result<String> {
            self.submitted.lock().unwrap().push(h5_key.to_string());
            Ok(format!("job-for-{h5_key}"))
        }

        async fn poll(&self, job_id: &str) -> Result<MatlabJobStatus> {
            if job_id.starts_with("job-for-") {
                Ok(MatlabJobStatus::Done)
            } else {
                Ok(MatlabJobStatus::Failed("unknown job".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn submit_records_the_key_and_returns_a_job_id() {
        let dispatcher = RecordingDispatcher {
            submitted: Mutex::new(Vec::new()),
        };
        let job_id = dispatcher.submit("runs/run-1.h5").await.unwrap();
        assert_eq!(job_id, "job-for-runs/run-1.h5");
        assert_eq!(dispatcher.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn poll_reports_done_for_a_known_job() {
        let dispatcher = RecordingDispatcher {
            submitted: Mutex::new(Vec::new()),
        };
        let job_id = dispatcher.submit("runs/run-1.h5").await.unwrap();
        assert_eq!(dispatcher.poll(&job_id).await.unwrap(), MatlabJobStatus::Done);
    }
}
