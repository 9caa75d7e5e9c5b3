//! Batch accumulator and writer
//!
//! Buffers successful task results and flushes them to the sink once the
//! buffer reaches its threshold, writing fixed-size sub-batches via the
//! sink's upsert. A sub-batch failure is recorded and the remaining
//! sub-batches continue. The buffer is swapped for a fresh allocation at
//! every flush, so peak memory stays bounded no matter how many tasks a
//! run has.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::{TaskResult, TeeTimeRow};
use crate::storage::TeeTimeSink;

/// Accumulates successful task results and writes them in batches
pub struct BatchAccumulator {
    /// The only mutable state shared across workers; always drained as a
    /// whole under the lock, never partially
    buffer: Mutex<Vec<TaskResult>>,

    sink: Arc<dyn TeeTimeSink>,

    /// Buffered results that trigger a flush
    flush_threshold: usize,

    /// Rows per sink upsert call
    write_batch_size: usize,

    total_tee_times: AtomicU64,
    write_errors: AtomicU64,
    batches_attempted: AtomicU64,
}

impl BatchAccumulator {
    pub fn new(sink: Arc<dyn TeeTimeSink>, flush_threshold: usize, write_batch_size: usize) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            sink,
            flush_threshold: flush_threshold.max(1),
            write_batch_size: write_batch_size.max(1),
            total_tee_times: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            batches_attempted: AtomicU64::new(0),
        }
    }

    /// Buffer one successful task result, flushing when the threshold is hit
    pub async fn push(&self, result: TaskResult) {
        let drained = {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.push(result);
            if buffer.len() >= self.flush_threshold {
                // Swap in a fresh Vec so the flushed allocation is dropped
                // wholesale once written
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };

        if let Some(results) = drained {
            self.flush(results).await;
        }
    }

    /// Flush any buffered remainder; call once after the queue is drained
    pub async fn finish(&self) {
        let remainder = std::mem::take(&mut *self.buffer.lock().unwrap());
        self.flush(remainder).await;
    }

    /// Write a drained buffer to the sink in fixed-size sub-batches
    async fn flush(&self, results: Vec<TaskResult>) {
        if results.is_empty() {
            return;
        }

        let found: u64 = results.iter().map(|r| r.tee_times.len() as u64).sum();
        self.total_tee_times.fetch_add(found, Ordering::Relaxed);

        let updated_at = Utc::now();
        let rows: Vec<TeeTimeRow> = results
            .iter()
            .map(|r| TeeTimeRow::from_result(r, updated_at))
            .collect();
        drop(results);

        let total_batches = rows.len().div_ceil(self.write_batch_size);

        for (index, chunk) in rows.chunks(self.write_batch_size).enumerate() {
            self.batches_attempted.fetch_add(1, Ordering::Relaxed);

            if let Err(e) = self.sink.upsert_batch(chunk).await {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    batch = index + 1,
                    total_batches,
                    rows = chunk.len(),
                    error = %e,
                    "Sub-batch upsert failed"
                );
            }
        }

        tracing::debug!(
            rows = rows.len(),
            tee_times = found,
            total_batches,
            "Flushed result buffer"
        );
    }

    /// Tee times counted across all flushed results
    pub fn total_tee_times(&self) -> u64 {
        self.total_tee_times.load(Ordering::Relaxed)
    }

    /// Failed sub-batch writes
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Sub-batch writes attempted (failed ones included)
    pub fn batches_attempted(&self) -> u64 {
        self.batches_attempted.load(Ordering::Relaxed)
    }

    /// Currently buffered results (for tests and diagnostics)
    pub fn buffered(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalTeeTime;
    use crate::storage::{FailingSink, MemorySink};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn result(course_id: i64, day: u32, tee_time_count: usize) -> TaskResult {
        let date = NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        let tee_times = (0..tee_time_count)
            .map(|i| CanonicalTeeTime {
                start_datetime: format!("2025-06-{day:02}T{:02}:00", 7 + i),
                players_available: 4,
                available_participants: vec![1, 2, 3, 4],
                holes: 18,
                price: 45.0,
                booking_link: String::new(),
                booking_links: BTreeMap::new(),
                tee_time_id: format!("{course_id}202506{day:02}{:02}00-18", 7 + i),
            })
            .collect();
        TaskResult::ok(course_id, date, tee_times)
    }

    #[tokio::test]
    async fn test_flush_at_threshold() {
        let sink = Arc::new(MemorySink::new());
        let acc = BatchAccumulator::new(sink.clone(), 3, 100);

        acc.push(result(1, 1, 1)).await;
        acc.push(result(2, 1, 1)).await;
        assert_eq!(acc.buffered(), 2);
        assert_eq!(sink.len(), 0);

        acc.push(result(3, 1, 1)).await;
        assert_eq!(acc.buffered(), 0);
        assert_eq!(sink.len(), 3);
        assert_eq!(acc.total_tee_times(), 3);
    }

    #[tokio::test]
    async fn test_exact_flush_cadence() {
        // 75 results with a threshold of 30: flushes at 30, 60, and the
        // final drain writes the remaining 15
        let sink = Arc::new(MemorySink::new());
        let acc = BatchAccumulator::new(sink.clone(), 30, 100);

        for i in 0..75i64 {
            acc.push(result(i, 1, 1)).await;
        }
        assert_eq!(sink.len(), 60);
        assert_eq!(acc.buffered(), 15);
        assert_eq!(acc.batches_attempted(), 2);

        acc.finish().await;
        assert_eq!(sink.len(), 75);
        assert_eq!(acc.buffered(), 0);
        assert_eq!(acc.batches_attempted(), 3);
        assert_eq!(acc.write_errors(), 0);
    }

    #[tokio::test]
    async fn test_sub_batching_within_flush() {
        // 5 rows with a write batch size of 2 means 3 upsert calls
        let sink = Arc::new(MemorySink::new());
        let acc = BatchAccumulator::new(sink.clone(), 5, 2);

        for i in 0..5i64 {
            acc.push(result(i, 1, 1)).await;
        }
        assert_eq!(acc.batches_attempted(), 3);
        assert_eq!(sink.len(), 5);
    }

    #[tokio::test]
    async fn test_write_errors_do_not_block_later_flushes() {
        let sink = Arc::new(FailingSink);
        let acc = BatchAccumulator::new(sink, 2, 100);

        acc.push(result(1, 1, 2)).await;
        acc.push(result(2, 1, 3)).await;
        assert_eq!(acc.write_errors(), 1);
        assert_eq!(acc.buffered(), 0);

        // Later pushes still buffer and flush normally
        acc.push(result(3, 1, 1)).await;
        acc.finish().await;
        assert_eq!(acc.write_errors(), 2);
        // Tee times are still counted even when the write fails
        assert_eq!(acc.total_tee_times(), 6);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_course_date() {
        let sink = Arc::new(MemorySink::new());
        let acc = BatchAccumulator::new(sink.clone(), 1, 100);

        acc.push(result(1, 1, 2)).await;
        acc.push(result(1, 1, 5)).await;

        assert_eq!(sink.len(), 1);
        let row = sink.get(1, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()).unwrap();
        assert_eq!(row.tee_times_count, 5);
    }

    #[tokio::test]
    async fn test_finish_with_empty_buffer_is_noop() {
        let sink = Arc::new(MemorySink::new());
        let acc = BatchAccumulator::new(sink.clone(), 30, 100);
        acc.finish().await;
        assert_eq!(sink.len(), 0);
        assert_eq!(acc.batches_attempted(), 0);
    }
}
