//! Run progress tracking and the final verdict
//!
//! Progress is logged only when crossing milestone percentages so a run
//! over thousands of tasks does not flood the log. The final summary
//! decides the run verdict: zero tee times across the whole run is a
//! systemic failure even when every individual fetch "succeeded" empty.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use crate::models::{RunOutcome, TaskResult};

/// Percentages at which a progress line is emitted
const MILESTONES: [u64; 5] = [0, 25, 50, 75, 99];

/// Tracks completion and error counts across all workers
pub struct RunReporter {
    total: u64,
    completed: AtomicU64,
    fetch_errors: AtomicU64,
    last_logged_pct: AtomicI64,
    started: Instant,
}

impl RunReporter {
    pub fn new(total: usize) -> Self {
        Self {
            total: total as u64,
            completed: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            last_logged_pct: AtomicI64::new(-1),
            started: Instant::now(),
        }
    }

    /// Record one finished task and log milestone progress
    pub fn record(&self, result: &TaskResult) {
        if !result.success {
            self.fetch_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                course_id = result.course_id,
                date = %result.date,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "Task failed"
            );
        } else if result.subquery_errors > 0 {
            self.fetch_errors
                .fetch_add(result.subquery_errors as u64, Ordering::Relaxed);
        }

        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let pct = completed * 100 / self.total.max(1);

        if MILESTONES.contains(&pct)
            && self.last_logged_pct.swap(pct as i64, Ordering::Relaxed) != pct as i64
        {
            let fetch_errors = self.fetch_errors.load(Ordering::Relaxed);
            if fetch_errors > 0 {
                tracing::info!(
                    "Progress: {pct}% ({completed}/{}) | fetch errors: {fetch_errors}",
                    self.total
                );
            } else {
                tracing::info!("Progress: {pct}% ({completed}/{})", self.total);
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn fetch_errors(&self) -> u64 {
        self.fetch_errors.load(Ordering::Relaxed)
    }

    /// Log the execution summary and build the run outcome
    pub fn finish(&self, total_tee_times: u64, write_errors: u64, batches_attempted: u64) -> RunOutcome {
        let elapsed = self.started.elapsed().as_secs_f64();
        let fetch_errors = self.fetch_errors();
        let completed = self.completed();
        let has_errors = fetch_errors > 0 || write_errors > 0;

        let status = if has_errors {
            "COMPLETED WITH ERRORS"
        } else {
            "SUCCESS"
        };

        tracing::info!("=== EXECUTION SUMMARY ===");
        tracing::info!("Execution time: {elapsed:.2}s");
        tracing::info!("Course/date combinations: {}", self.total);
        tracing::info!("Successful fetches: {}", completed.saturating_sub(fetch_errors));
        tracing::info!("Fetch errors: {fetch_errors}");
        tracing::info!("Total tee times found: {total_tee_times}");
        tracing::info!("Sink batches attempted: {batches_attempted}");
        tracing::info!("Write errors: {write_errors}");
        tracing::info!("Status: {status}");
        tracing::info!("=========================");

        let message = if has_errors {
            format!("Completed with {fetch_errors} fetch errors and {write_errors} batch errors")
        } else {
            String::from("Success")
        };

        RunOutcome {
            success: !has_errors,
            message,
            fetch_errors,
            write_errors,
            total_tee_times,
            elapsed_secs: elapsed,
        }
    }
}
