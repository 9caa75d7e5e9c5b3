//! Task expansion and the bounded worker pool
//!
//! The course catalog expands into one [`SearchTask`] per (course, date)
//! within each course's visibility window. Tasks go onto a shared FIFO
//! channel and a fixed number of workers pull from it until the channel
//! closes; the worker count bounds upstream concurrency independently of
//! how many courses or hosts are in play.

use chrono::{DateTime, Days, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::harvest::accumulator::BatchAccumulator;
use crate::harvest::chrono_lightspeed::fetch_course_tee_times;
use crate::harvest::fetcher::TeeTimeFetcher;
use crate::harvest::progress::RunReporter;
use crate::models::{Course, SearchTask};
use crate::utils::time_string_to_minutes;

/// Expand courses into search tasks using each course's visibility window
///
/// Dates run from "today" (in the course's local timezone) through
/// `today + booking_visibility_days`. When a course declares a visibility
/// cutoff clock-time, the final day is excluded while the local time is
/// still before the cutoff — the booking window for that day has not
/// opened yet.
pub fn expand_tasks(courses: &[Arc<Course>], now: DateTime<Utc>) -> Vec<SearchTask> {
    let mut tasks = Vec::new();

    for course in courses {
        let tz: Tz = course.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                course_id = course.id,
                timezone = %course.timezone,
                "Unknown timezone, falling back to UTC"
            );
            Tz::UTC
        });

        let local_now = now.with_timezone(&tz);
        let start_date = local_now.date_naive();

        for offset in 0..=course.booking_visibility_days {
            if offset == course.booking_visibility_days {
                if let Some(cutoff) = &course.booking_visibility_start_time {
                    match time_string_to_minutes(cutoff) {
                        Ok(cutoff_minutes) => {
                            let local_minutes = local_now.hour() * 60 + local_now.minute();
                            if local_minutes < cutoff_minutes {
                                continue;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                course_id = course.id,
                                cutoff = %cutoff,
                                error = %e,
                                "Ignoring malformed visibility cutoff"
                            );
                        }
                    }
                }
            }

            if let Some(date) = start_date.checked_add_days(Days::new(offset as u64)) {
                tasks.push(SearchTask {
                    course: Arc::clone(course),
                    date,
                });
            }
        }
    }

    tasks
}

/// Drive the task list through `concurrency` workers
///
/// The sender side is dropped after enqueueing, so a closed channel is the
/// completion signal — no sentinel values, no polling. Each worker reports
/// its result to the reporter and hands successes to the accumulator
/// before pulling the next task; one failing task never disturbs its
/// siblings.
pub async fn run_tasks(
    tasks: Vec<SearchTask>,
    fetcher: Arc<TeeTimeFetcher>,
    accumulator: Arc<BatchAccumulator>,
    reporter: Arc<RunReporter>,
    concurrency: usize,
) {
    if tasks.is_empty() {
        return;
    }

    let (tx, rx) = mpsc::channel::<SearchTask>(tasks.len());
    for task in tasks {
        // Capacity equals the task count, so sends cannot block here
        if tx.send(task).await.is_err() {
            tracing::error!("Task channel closed before scheduling completed");
            break;
        }
    }
    drop(tx);

    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let mut handles = Vec::with_capacity(concurrency);

    for worker_id in 0..concurrency {
        let rx = Arc::clone(&rx);
        let fetcher = Arc::clone(&fetcher);
        let accumulator = Arc::clone(&accumulator);
        let reporter = Arc::clone(&reporter);

        let handle = tokio::spawn(async move {
            loop {
                let task = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };

                let task = match task {
                    Some(task) => task,
                    None => break,
                };

                tracing::debug!(
                    worker_id,
                    course_id = task.course.id,
                    date = %task.date,
                    "Fetching tee times"
                );

                let result = fetch_course_tee_times(&task.course, task.date, &fetcher).await;

                reporter.record(&result);
                if result.success {
                    accumulator.push(result).await;
                }
            }

            tracing::debug!(worker_id, "Worker shutting down");
        });

        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.await;
    }
}
