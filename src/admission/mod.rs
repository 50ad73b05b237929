// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Admission control: content-length presence and quota checks ahead of
//! accepting an upload.

use std::sync::Arc;

use crate::core::{IngestError, Result};
use crate::upload::UploadQueue;

/// Checks an inbound upload against the configured space budget before any
/// bytes are read off the wire.
pub struct AdmissionGuard {
    queue: Arc<UploadQueue>,
}

impl AdmissionGuard {
    pub fn new(queue: Arc<UploadQueue>) -> Self {
        Self { queue }
    }

    /// Admit or reject an upload declaring `content_length` bytes.
    ///
    /// Rejects when the header is absent (the pipeline has no way to
    /// reserve space for an unbounded body) or when admitting it would push
    /// the middleware's running estimate over the configured ceiling. The
    /// check and the reservation happen as one atomic step on the queue, so
    /// two concurrent admissions that would individually fit but together
    /// overflow the budget can't both pass (§8).
    pub fn admit(&self, content_length: Option<u64>) -> Result<()> {
        let content_length = content_length
            .ok_or_else(|| IngestError::admission_rejected("missing Content-Length header"))?;

        if !self.queue.try_reserve_estimate(content_length) {
            return Err(IngestError::admission_rejected(format!(
                "upload of {content_length} bytes would exceed the {} byte budget",
                self.queue.max_total_size()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_content_length() {
        let guard = AdmissionGuard::new(Arc::new(UploadQueue::new(1_000)));
        let err = guard.admit(None).unwrap_err();
        assert!(matches!(err, IngestError::AdmissionRejected { .. }));
    }

    #[test]
    fn rejects_upload_exceeding_budget() {
        let guard = AdmissionGuard::new(Arc::new(UploadQueue::new(1_000)));
        let err = guard.admit(Some(2_000)).unwrap_err();
        assert!(matches!(err, IngestError::AdmissionRejected { .. }));
    }

    #[test]
    fn admits_upload_within_budget_and_records_estimate() {
        let queue = Arc::new(UploadQueue::new(1_000));
        let guard = AdmissionGuard::new(queue.clone());
        guard.admit(Some(400)).unwrap();
        assert_eq!(queue.middleware_estimate(), 400);
    }

    #[test]
    fn concurrent_admissions_that_together_overflow_reject_at_least_one() {
        use std::thread;

        let queue = Arc::new(UploadQueue::new(1_000));
        let guard1 = AdmissionGuard::new(queue.clone());
        let guard2 = AdmissionGuard::new(queue.clone());
        let t1 = thread::spawn(move || guard1.admit(Some(700)));
        let t2 = thread::spawn(move || guard2.admit(Some(700)));
        let results = [t1.join().unwrap(), t2.join().unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(queue.middleware_estimate(), 700);
    }
}
