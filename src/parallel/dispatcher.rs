//! The partitioned drain loop.
//!
//! The orchestrator fills a batch of at most `batch_size` units from the
//! sequencer, dispatches each one concurrently, then waits for the whole batch
//! before filling the next. A batch that could not be filled completely means
//! the sequencer ran dry (or dispatch was cancelled), so the loop stops; a
//! sequence whose length is an exact multiple of the batch size therefore costs
//! one extra, empty, fill pass.
//!
//! ```text
//! ┌──────────────┐  next()   ┌──────────────┐  dispatch   ┌──────────────┐
//! │  Sequencer   │──────────▶│ Orchestrator │────────────▶│  Unit x N    │
//! │ (owned, 1x)  │           │  fill / join │◀────────────│  (parallel)  │
//! └──────────────┘           └──────────────┘  oneshot    └──────┬───────┘
//!                                                               │
//!                                     FailureSink / OrderedResultSink
//! ```

use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::oneshot;

use super::error::{LoopError, UnitFailure};
use super::options::{ExecutionOptions, SchedulingHint};
use super::sequencer::Sequencer;
use super::sinks::{FailureSink, OrderedResultSink};

/// What happened during one loop call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Units dispatched across all batches
    pub dispatched: usize,
    /// Batches that dispatched at least one unit
    pub batches: usize,
    /// Fill passes, including a trailing pass that found nothing
    pub passes: usize,
    /// Whether cancellation stopped dispatch before the sequencer ran dry
    pub cancelled: bool,
}

/// Runs sequencers to exhaustion in capped, joined batches.
///
/// With [`SchedulingHint::SharedPool`] the dispatcher owns a rayon pool with
/// one thread per batch slot, shared by every call (and every clone) of this
/// dispatcher, so a full batch of blocking units really runs at once.
#[derive(Debug, Clone)]
pub struct WorkDispatcher {
    options: ExecutionOptions,
    pool: Option<Arc<rayon::ThreadPool>>,
}

/// Completion signal for one dispatched unit.
struct UnitHandle {
    position: usize,
    done: oneshot::Receiver<()>,
}

impl WorkDispatcher {
    pub fn new(options: ExecutionOptions) -> Self {
        let pool = match options.scheduling() {
            SchedulingHint::SharedPool => build_pool(options.batch_size()),
            SchedulingHint::Blocking | SchedulingHint::Dedicated => None,
        };
        Self { options, pool }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Drain `sequencer`, running `work` once per value.
    ///
    /// Unit failures never interrupt sibling units; they are recorded in
    /// `failures` for the caller to drain once this returns. When `results`
    /// is given, each successful unit stores its value under its position.
    pub async fn run<S, F, R>(
        &self,
        sequencer: &mut S,
        work: Arc<F>,
        failures: &Arc<FailureSink>,
        results: Option<&Arc<OrderedResultSink<R>>>,
    ) -> RunStats
    where
        S: Sequencer,
        F: Fn(S::Item) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let batch_size = self.options.batch_size();
        let scheduling = self.options.scheduling();
        let scope = self.options.cancel_scope();
        let mut stats = RunStats::default();

        loop {
            let mut remaining = batch_size;
            let mut batch: Vec<UnitHandle> = Vec::with_capacity(batch_size);
            let mut source_exhausted = false;
            stats.passes += 1;

            while remaining > 0 {
                if scope.is_cancelled() {
                    if !stats.cancelled {
                        tracing::info!(
                            "Cancellation observed after {} units; no new units will start",
                            stats.dispatched + batch.len()
                        );
                    }
                    stats.cancelled = true;
                    break;
                }

                let next = match sequencer.has_next().await {
                    Ok(true) => sequencer.next(),
                    Ok(false) => {
                        source_exhausted = true;
                        break;
                    }
                    Err(err) => Err(err),
                };
                let (position, value) = match next {
                    Ok(item) => item,
                    Err(err) => {
                        failures.add(UnitFailure::source(err));
                        source_exhausted = true;
                        break;
                    }
                };

                tracing::trace!("Dispatching unit {}", position);
                let unit = Unit {
                    position,
                    value,
                    work: Arc::clone(&work),
                    failures: Arc::clone(failures),
                    results: results.cloned(),
                };
                batch.push(self.dispatch(scheduling, position, move || unit.execute()));
                remaining -= 1;
            }

            if batch.is_empty() {
                tracing::debug!("Pass {} found no work; stopping", stats.passes);
                break;
            }

            tracing::debug!(
                "Pass {}: joining batch of {} (batch size {})",
                stats.passes,
                batch.len(),
                batch_size
            );
            stats.batches += 1;
            stats.dispatched += batch.len();

            // Join barrier
            for handle in batch {
                if handle.done.await.is_err() {
                    failures.add(UnitFailure::at(
                        handle.position,
                        anyhow::anyhow!("unit was dropped before reporting completion"),
                    ));
                }
            }

            if remaining > 0 || source_exhausted {
                break;
            }
        }

        tracing::debug!(
            "Loop finished: {} units in {} batches over {} passes",
            stats.dispatched,
            stats.batches,
            stats.passes
        );
        stats
    }

    /// Run `sequencer` and turn captured failures into an error.
    pub async fn run_to_completion<S, F, R>(
        &self,
        sequencer: &mut S,
        work: F,
        results: Option<&Arc<OrderedResultSink<R>>>,
    ) -> Result<RunStats, LoopError>
    where
        S: Sequencer,
        F: Fn(S::Item) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let failures = Arc::new(FailureSink::new());
        let stats = self
            .run(sequencer, Arc::new(work), &failures, results)
            .await;

        match failures.drain() {
            Some(aggregate) => Err(LoopError::Aggregate(aggregate)),
            None => Ok(stats),
        }
    }

    /// Start `job` according to `hint`. The returned handle resolves once `job`
    /// has returned and dropped everything it captured.
    fn dispatch<J>(&self, hint: SchedulingHint, position: usize, job: J) -> UnitHandle
    where
        J: FnOnce() + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = move || {
            job();
            let _ = tx.send(());
        };

        match hint {
            SchedulingHint::SharedPool => match &self.pool {
                Some(pool) => pool.spawn(task),
                None => rayon::spawn(task),
            },
            SchedulingHint::Blocking => {
                tokio::task::spawn_blocking(task);
            }
            SchedulingHint::Dedicated => {
                let spawned = std::thread::Builder::new()
                    .name(format!("parloop-unit-{position}"))
                    .spawn(task);
                if let Err(err) = spawned {
                    tracing::error!("Failed to spawn thread for unit {}: {}", position, err);
                }
            }
        }

        UnitHandle { position, done: rx }
    }
}

/// One loop value bound to its own copy of everything it writes to.
struct Unit<T, F, R> {
    position: usize,
    value: T,
    work: Arc<F>,
    failures: Arc<FailureSink>,
    results: Option<Arc<OrderedResultSink<R>>>,
}

impl<T, F, R> Unit<T, F, R>
where
    F: Fn(T) -> anyhow::Result<R>,
{
    fn execute(self) {
        let Unit {
            position,
            value,
            work,
            failures,
            results,
        } = self;

        match catch_unwind(AssertUnwindSafe(|| (*work)(value))) {
            Ok(Ok(result)) => {
                if let Some(results) = results {
                    results.put(position, result);
                }
            }
            Ok(Err(err)) => failures.add(UnitFailure::at(position, err)),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                failures.add(UnitFailure::at(
                    position,
                    anyhow::anyhow!("unit panicked: {message}"),
                ));
            }
        }
    }
}

/// A rayon pool with one thread per batch slot. Falls back to the global
/// pool (and its one-thread-per-core cap) if threads cannot be created.
fn build_pool(threads: usize) -> Option<Arc<rayon::ThreadPool>> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("parloop-pool-{i}"))
        .build()
    {
        Ok(pool) => Some(Arc::new(pool)),
        Err(err) => {
            tracing::warn!(
                "Failed to build a {}-thread pool, using the global rayon pool: {}",
                threads,
                err
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::sequencer::{ArithmeticSequencer, EnumerableSequencer};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn dispatcher(batch_size: usize, hint: SchedulingHint) -> WorkDispatcher {
        WorkDispatcher::new(
            ExecutionOptions::configure(|o| {
                o.batch_size(batch_size).scheduling(hint);
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_every_value_dispatched_once() {
        for hint in [
            SchedulingHint::SharedPool,
            SchedulingHint::Blocking,
            SchedulingHint::Dedicated,
        ] {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let mut seq = ArithmeticSequencer::range(0, 10, 1).unwrap();

            let stats = dispatcher(3, hint)
                .run_to_completion(
                    &mut seq,
                    move |i| {
                        sink.lock().unwrap().push(i);
                        Ok(())
                    },
                    None,
                )
                .await
                .unwrap();

            let mut seen = seen.lock().unwrap().clone();
            seen.sort_unstable();
            assert_eq!(seen, (0..10).collect::<Vec<_>>(), "hint {hint:?}");
            assert_eq!(stats.dispatched, 10);
            assert_eq!(stats.batches, 4);
            assert_eq!(stats.passes, 4);
        }
    }

    #[tokio::test]
    async fn test_peak_concurrency_capped_by_batch_size() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let mut seq = EnumerableSequencer::new(0..12);

        dispatcher(4, SchedulingHint::Dedicated)
            .run_to_completion(
                &mut seq,
                move |_| {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    r.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                None,
            )
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shared_pool_runs_full_batch_at_once() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let mut seq = EnumerableSequencer::new(0..4);

        dispatcher(4, SchedulingHint::SharedPool)
            .run_to_completion(
                &mut seq,
                move |_| {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(100));
                    r.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_pool_sized_to_batch() {
        let shared = dispatcher(6, SchedulingHint::SharedPool);
        assert_eq!(shared.pool.as_ref().map(|p| p.current_num_threads()), Some(6));
        assert!(dispatcher(6, SchedulingHint::Dedicated).pool.is_none());
    }

    #[tokio::test]
    async fn test_panics_become_failures() {
        let mut seq = EnumerableSequencer::new(vec![1, 2, 3]);
        let err = dispatcher(2, SchedulingHint::SharedPool)
            .run_to_completion(
                &mut seq,
                |x: i32| {
                    if x == 2 {
                        panic!("bad input {x}");
                    }
                    Ok(())
                },
                None,
            )
            .await
            .unwrap_err();

        let aggregate = err.aggregate().unwrap();
        assert_eq!(aggregate.positions(), vec![1]);
        assert!(aggregate.to_string().contains("bad input 2"));
    }

    #[tokio::test]
    async fn test_results_keyed_by_position() {
        let results = Arc::new(OrderedResultSink::new());
        let mut seq = EnumerableSequencer::new(vec![30u64, 10, 20]);

        dispatcher(2, SchedulingHint::SharedPool)
            .run_to_completion(
                &mut seq,
                |ms| {
                    std::thread::sleep(Duration::from_millis(ms));
                    Ok(ms * 2)
                },
                Some(&results),
            )
            .await
            .unwrap();

        assert_eq!(results.drain(), vec![60, 20, 40]);
    }
}
