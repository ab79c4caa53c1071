//! Batch partitioning and concurrent batch execution
//!
//! Work items are cut into contiguous batches, every batch is dispatched at
//! once, and a semaphore bounds how many are in flight. A failed batch is
//! recorded and skipped; it never aborts its siblings.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Number of batches needed for `len` items, i.e. `ceil(len / batch_size)`.
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    let size = batch_size.max(1);
    (len + size - 1) / size
}

/// Split `items` into contiguous batches of at most `batch_size` items.
///
/// A batch size of zero is treated as one.
pub fn partition<T: Clone>(items: &[T], batch_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Sub-range of the overall progress bar that one stage reports into.
///
/// `percent = offset + completed / total * 100 * scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSpan {
    pub offset: f64,
    pub scale: f64,
}

impl ProgressSpan {
    /// The whole 0-100 range.
    pub const FULL: ProgressSpan = ProgressSpan {
        offset: 0.0,
        scale: 1.0,
    };

    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    /// Progress after `completed` of `total` batches, clamped to 0-100.
    pub fn at(&self, completed: usize, total: usize) -> u8 {
        let fraction = if total == 0 {
            1.0
        } else {
            completed as f64 / total as f64
        };
        let percent = self.offset + fraction * 100.0 * self.scale;
        percent.clamp(0.0, 100.0) as u8
    }

    pub fn start(&self) -> u8 {
        self.at(0, 1)
    }

    pub fn end(&self) -> u8 {
        self.at(1, 1)
    }
}

/// A batch that failed after all of its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

/// Aggregate of one concurrent batch run.
#[derive(Debug)]
pub struct BatchReport<O> {
    pub total_batches: usize,
    /// Successful outputs in completion order, tagged with their batch index.
    pub completed: Vec<(usize, O)>,
    pub failures: Vec<BatchFailure>,
}

impl<O> BatchReport<O> {
    pub fn succeeded(&self) -> usize {
        self.completed.len()
    }

    /// Successful outputs sorted back into input order.
    pub fn into_ordered(mut self) -> Vec<O> {
        self.completed.sort_by_key(|(index, _)| *index);
        self.completed.into_iter().map(|(_, output)| output).collect()
    }

    /// First failure message, if any batch failed.
    pub fn first_error(&self) -> Option<&str> {
        self.failures
            .iter()
            .min_by_key(|f| f.index)
            .map(|f| f.error.as_str())
    }
}

struct Aggregate<O> {
    done: usize,
    completed: Vec<(usize, O)>,
    failures: Vec<BatchFailure>,
}

/// Run every batch concurrently with at most `max_parallel` in flight.
///
/// `work` receives the batch index and its items. `on_progress` is called with
/// `(completed_batches, total_batches)` after each batch settles, success or
/// failure, while the aggregate lock is held so counts are observed in order.
pub async fn run_batches<T, O, E, F, Fut, P>(
    stage: &str,
    batches: Vec<Vec<T>>,
    max_parallel: usize,
    work: F,
    on_progress: P,
) -> BatchReport<O>
where
    F: Fn(usize, Vec<T>) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: Display,
    P: Fn(usize, usize),
{
    let total = batches.len();
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let aggregate = Mutex::new(Aggregate {
        done: 0,
        completed: Vec::with_capacity(total),
        failures: Vec::new(),
    });

    info!(stage = stage, total_batches = total, max_parallel = max_parallel, "Dispatching batches");

    let work = &work;
    let on_progress = &on_progress;
    let aggregate_ref = &aggregate;
    let tasks = batches.into_iter().enumerate().map(|(index, items)| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let size = items.len();
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => {
                    debug!(stage = stage, batch = index + 1, size = size, "Batch started");
                    work(index, items).await.map_err(|e| e.to_string())
                }
                Err(_) => Err("batch gate closed".to_string()),
            };

            let mut agg = aggregate_ref.lock().await;
            agg.done += 1;
            match outcome {
                Ok(output) => {
                    info!(
                        stage = stage,
                        batch = index + 1,
                        total_batches = total,
                        "Batch completed"
                    );
                    agg.completed.push((index, output));
                }
                Err(error) => {
                    warn!(stage = stage, batch = index + 1, error = %error, "Batch failed");
                    agg.failures.push(BatchFailure { index, error });
                }
            }
            on_progress(agg.done, total);
        }
    });

    futures::future::join_all(tasks).await;

    let agg = aggregate.into_inner();
    info!(
        stage = stage,
        succeeded = agg.completed.len(),
        failed = agg.failures.len(),
        "Batches settled"
    );

    BatchReport {
        total_batches: total,
        completed: agg.completed,
        failures: agg.failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[test]
    fn test_batch_count() {
        assert_eq!(batch_count(0, 3), 0);
        assert_eq!(batch_count(1, 3), 1);
        assert_eq!(batch_count(3, 3), 1);
        assert_eq!(batch_count(7, 3), 3);
        assert_eq!(batch_count(5, 0), 5);
    }

    #[test]
    fn test_partition_reconstructs_input() {
        for len in 0..20 {
            let items: Vec<usize> = (0..len).collect();
            for size in 1..6 {
                let batches = partition(&items, size);
                assert_eq!(batches.len(), batch_count(len, size));
                assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= size));
                let flat: Vec<usize> = batches.into_iter().flatten().collect();
                assert_eq!(flat, items);
            }
        }
    }

    #[test]
    fn test_partition_seven_by_three() {
        let sizes: Vec<usize> = partition(&[1, 2, 3, 4, 5, 6, 7], 3)
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_progress_span() {
        let span = ProgressSpan::new(25.0, 0.25);
        assert_eq!(span.start(), 25);
        assert_eq!(span.at(1, 2), 37);
        assert_eq!(span.end(), 50);

        assert_eq!(ProgressSpan::FULL.at(1, 3), 33);
        assert_eq!(ProgressSpan::FULL.at(3, 3), 100);
        assert_eq!(ProgressSpan::new(90.0, 1.0).end(), 100);
    }

    #[tokio::test]
    async fn test_run_batches_collects_all() {
        let progress = StdMutex::new(Vec::new());
        let batches = partition(&[1, 2, 3, 4, 5, 6, 7], 3);

        let report = run_batches(
            "double",
            batches,
            3,
            |_, items: Vec<i32>| async move {
                Ok::<_, String>(items.into_iter().map(|x| x * 2).collect::<Vec<_>>())
            },
            |done, total| progress.lock().unwrap().push((done, total)),
        )
        .await;

        assert_eq!(report.total_batches, 3);
        assert_eq!(report.succeeded(), 3);
        assert!(report.failures.is_empty());
        let flat: Vec<i32> = report.into_ordered().into_iter().flatten().collect();
        assert_eq!(flat, vec![2, 4, 6, 8, 10, 12, 14]);
        assert_eq!(*progress.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_abort_siblings() {
        let batches = partition(&[1, 2, 3, 4, 5, 6], 2);

        let report = run_batches(
            "flaky",
            batches,
            2,
            |index, items: Vec<i32>| async move {
                if index == 1 {
                    Err(format!("batch {} exploded", index))
                } else {
                    Ok(items)
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.failures,
            vec![BatchFailure {
                index: 1,
                error: "batch 1 exploded".to_string()
            }]
        );
        assert_eq!(report.first_error(), Some("batch 1 exploded"));
        let flat: Vec<i32> = report.into_ordered().into_iter().flatten().collect();
        assert_eq!(flat, vec![1, 2, 5, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallelism_is_bounded() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let batches = partition(&(0..10).collect::<Vec<_>>(), 1);

        let report = run_batches(
            "bounded",
            batches,
            3,
            |_, items: Vec<i32>| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(items)
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(report.succeeded(), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let report = run_batches(
            "empty",
            Vec::<Vec<i32>>::new(),
            3,
            |_, items| async move { Ok::<_, String>(items) },
            |_, _| panic!("no progress expected"),
        )
        .await;
        assert_eq!(report.total_batches, 0);
        assert_eq!(report.succeeded(), 0);
    }
}
