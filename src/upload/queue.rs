// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Disk-backed bounded upload job queue.
//!
//! Jobs sit in a FIFO until an ingest worker pops one. Two byte counters
//! track how much scratch space is committed: `total_size` is the
//! authoritative sum, updated the moment a job is enqueued or finished;
//! `middleware_estimate` is what the admission guard saw at request time
//! and can run ahead of or behind `total_size` until the periodic
//! reconciliation pass brings it back in line (§4.H/§1.1).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use super::job::{Job, JobStatus};

/// Reconciliation interval between `middleware_estimate` and `total_size`.
pub const RECONCILE_INTERVAL_SECS: u64 = 60;

/// A bounded FIFO of upload jobs with atomic byte-budget tracking.
pub struct UploadQueue {
    jobs: Mutex<VecDeque<Job>>,
    total_size: AtomicU64,
    middleware_estimate: AtomicU64,
    max_total_size: u64,
    stop_requested: AtomicBool,
}

impl UploadQueue {
    pub fn new(max_total_size: u64) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            total_size: AtomicU64::new(0),
            middleware_estimate: AtomicU64::new(0),
            max_total_size,
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Push a job, accounting its size against `total_size`.
    pub fn enqueue(&self, job: Job) {
        self.total_size.fetch_add(job.size_bytes, Ordering::SeqCst);
        self.jobs.lock().expect("queue mutex poisoned").push_back(job);
    }

    /// Pop the oldest job, if any.
    pub fn dequeue(&self) -> Option<Job> {
        self.jobs.lock().expect("queue mutex poisoned").pop_front()
    }

    /// Mark a job finished (Completed or Failed), releasing its bytes from
    /// `total_size`.
    pub fn release(&self, size_bytes: u64) {
        self.total_size.fetch_sub(size_bytes, Ordering::SeqCst);
    }

    /// Record an admission-time estimate before the real job size is known.
    #[cfg(test)]
    fn record_middleware_estimate(&self, content_length: u64) {
        self.middleware_estimate.fetch_add(content_length, Ordering::SeqCst);
    }

    /// Atomically checks `additional_bytes` against the remaining budget and,
    /// if it fits, reserves it in one step. Returns `false` without
    /// reserving anything if admitting it would exceed `max_total_size`.
    ///
    /// This is the single combined check-and-reserve the admission guard
    /// must use instead of calling a separate check and a separate add: two
    /// concurrent callers both reading a stale estimate before either writes
    /// back is exactly the race a `fetch_add` after a `would_exceed_budget`
    /// check would allow (§8).
    pub fn try_reserve_estimate(&self, additional_bytes: u64) -> bool {
        let max_total_size = self.max_total_size;
        self.middleware_estimate
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if current + additional_bytes > max_total_size {
                    None
                } else {
                    Some(current + additional_bytes)
                }
            })
            .is_ok()
    }

    /// True if admitting `additional_bytes` on top of the current estimate
    /// would exceed the configured ceiling. For inspection/reporting only;
    /// admission decisions must go through `try_reserve_estimate`.
    pub fn would_exceed_budget(&self, additional_bytes: u64) -> bool {
        self.middleware_estimate() + additional_bytes > self.max_total_size
    }

    /// Requests a graceful stop (§4.F/§5): the in-flight job is allowed to
    /// finish, but the Job Runner loop skips its next dequeue and returns.
    /// Does not block; callers observe the runner's actual exit via its own
    /// task handle.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Whether a graceful stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// The authoritative committed byte total.
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    /// The admission guard's eventually-consistent estimate.
    pub fn middleware_estimate(&self) -> u64 {
        self.middleware_estimate.load(Ordering::SeqCst)
    }

    /// The configured ceiling.
    pub fn max_total_size(&self) -> u64 {
        self.max_total_size
    }

    /// Bring `middleware_estimate` back in line with the authoritative
    /// `total_size`. Called on a fixed interval (§1.1), not after every job,
    /// since the estimate only needs to be approximately right between
    /// reconciliations.
    pub fn reconcile(&self) {
        let authoritative = self.total_size();
        self.middleware_estimate.store(authoritative, Ordering::SeqCst);
    }

    /// Number of jobs currently queued (not yet dequeued).
    pub fn len(&self) -> usize {
        self.jobs.lock().expect("queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Marks a job's terminal status and releases its committed bytes.
pub fn finish_job(queue: &UploadQueue, job: &mut Job, succeeded: bool) {
    let now = chrono::Utc::now();
    if succeeded {
        job.complete(now);
    } else {
        job.fail(now);
    }
    debug_assert!(matches!(job.status, JobStatus::Completed | JobStatus::Failed));
    queue.release(job.size_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::job::JobDate;
    use chrono::Utc;

    fn job(size: u64) -> Job {
        let now = Utc::now();
        Job::new("run.mcap", "/scratch/run.mcap", size, JobDate::from_enqueue_time(now), now)
    }

    #[test]
    fn enqueue_dequeue_preserves_fifo_order() {
        let queue = UploadQueue::new(10_000);
        queue.enqueue(job(100));
        queue.enqueue(job(200));

        let first = queue.dequeue().unwrap();
        assert_eq!(first.size_bytes, 100);
        assert_eq!(queue.dequeue().unwrap().size_bytes, 200);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn total_size_tracks_enqueue_and_release() {
        let queue = UploadQueue::new(10_000);
        queue.enqueue(job(500));
        assert_eq!(queue.total_size(), 500);
        queue.release(500);
        assert_eq!(queue.total_size(), 0);
    }

    #[test]
    fn reconcile_pulls_estimate_back_to_authoritative_total() {
        let queue = UploadQueue::new(10_000);
        queue.enqueue(job(300));
        queue.record_middleware_estimate(9_000); // stale, diverged estimate
        assert_ne!(queue.middleware_estimate(), queue.total_size());

        queue.reconcile();
        assert_eq!(queue.middleware_estimate(), queue.total_size());
    }

    #[test]
    fn budget_check_uses_middleware_estimate() {
        let queue = UploadQueue::new(1_000);
        queue.record_middleware_estimate(900);
        assert!(queue.would_exceed_budget(200));
        assert!(!queue.would_exceed_budget(50));
    }

    #[test]
    fn try_reserve_estimate_rejects_without_mutating_on_overflow() {
        let queue = UploadQueue::new(1_000);
        queue.record_middleware_estimate(900);
        assert!(!queue.try_reserve_estimate(200));
        assert_eq!(queue.middleware_estimate(), 900);
        assert!(queue.try_reserve_estimate(100));
        assert_eq!(queue.middleware_estimate(), 1_000);
    }

    #[test]
    fn try_reserve_estimate_admits_at_most_one_of_two_racing_overflows() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(UploadQueue::new(1_000));
        let a = queue.clone();
        let b = queue.clone();
        let t1 = thread::spawn(move || a.try_reserve_estimate(600));
        let t2 = thread::spawn(move || b.try_reserve_estimate(600));
        let admitted = [t1.join().unwrap(), t2.join().unwrap()];
        assert_eq!(admitted.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(queue.middleware_estimate(), 600);
    }

    #[test]
    fn stop_requested_defaults_false_and_latches_true() {
        let queue = UploadQueue::new(1_000);
        assert!(!queue.stop_requested());
        queue.request_stop();
        assert!(queue.stop_requested());
    }
}
