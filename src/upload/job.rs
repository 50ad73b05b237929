// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The upload job record and its state machine.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a job's `date` came from. Kept on the record rather than silently
/// picking one source, since the two disagree whenever a run is uploaded
/// well after it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Read out of an MCAP metadata record in the file itself.
    Metadata,
    /// No metadata record was found; the time the job was enqueued was used.
    EnqueueTime,
}

/// A job's recording date, together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDate {
    pub date: DateTime<Utc>,
    pub source: DateSource,
}

impl JobDate {
    /// Use a date read from the MCAP's own metadata.
    pub fn from_metadata(date: DateTime<Utc>) -> Self {
        Self {
            date,
            source: DateSource::Metadata,
        }
    }

    /// Fall back to the time the job was enqueued.
    pub fn from_enqueue_time(now: DateTime<Utc>) -> Self {
        Self {
            date: now,
            source: DateSource::EnqueueTime,
        }
    }
}

/// Lifecycle state of an upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One queued MCAP upload and its processing state.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub filename: String,
    pub scratch_path: String,
    pub size_bytes: u64,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub date: JobDate,
}

impl Job {
    /// Create a new job in `Pending` state, stamping `created_at`/`updated_at`
    /// to `now`.
    pub fn new(
        filename: impl Into<String>,
        scratch_path: impl Into<String>,
        size_bytes: u64,
        date: JobDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            scratch_path: scratch_path.into(),
            size_bytes,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            date,
        }
    }

    /// Transition Pending -> Processing. No-op if already processing.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Processing;
            self.updated_at = now;
        }
    }

    /// Transition Processing -> Completed.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.updated_at = now;
    }

    /// Transition Processing -> Failed. A job may fail from any state, since
    /// a storage error can happen before processing formally starts.
    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.updated_at = now;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}
