use std::sync::Arc;

use super::cursor::{ForwardCursor, ForwardReader};
use super::dispatcher::{RunStats, WorkDispatcher};
use super::error::{AggregateError, LoopError};
use super::options::{ExecutionOptions, OptionsBuilder};
use super::sequencer::{ArithmeticSequencer, EnumerableSequencer, LoopNumber, Sequencer};
use super::sinks::{FailureSink, OrderedResultSink};

/// Ordered results that tolerate failures.
///
/// `slots[i]` is the result for the i-th value of the sequence, or `None`
/// when that unit failed. Values never dispatched because of cancellation
/// have no slot at all; `stats.cancelled` tells the two cases apart.
#[derive(Debug)]
pub struct PartialResults<R> {
    pub slots: Vec<Option<R>>,
    pub failures: Option<AggregateError>,
    pub stats: RunStats,
}

impl<R> PartialResults<R> {
    /// Every value was dispatched and every unit succeeded.
    pub fn is_complete(&self) -> bool {
        !self.stats.cancelled
            && self.failures.is_none()
            && self.slots.iter().all(Option::is_some)
    }

    /// The successful results, in sequence order.
    pub fn successes(self) -> Vec<R> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Entry point for the for / for-each / while loop families.
///
/// Extra arguments the work function needs are captured by the closure;
/// each unit gets the loop value by move.
///
/// # Example
/// ```rust,no_run
/// use parloop::parallel::{ArithmeticSequencer, ParallelLoop};
///
/// # async fn demo() -> Result<(), parloop::parallel::LoopError> {
/// let runner = ParallelLoop::configure(|o| {
///     o.batch_size(3);
/// })?;
///
/// let stats = runner
///     .for_range(ArithmeticSequencer::range(0, 10, 1)?, |i| {
///         println!("unit {i}");
///         Ok(())
///     })
///     .await?;
/// assert_eq!(stats.dispatched, 10);
///
/// let lengths = runner
///     .for_each_ordered(vec!["a", "bb", "ccc"], |s| Ok(s.len()))
///     .await?;
/// assert_eq!(lengths, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ParallelLoop {
    dispatcher: WorkDispatcher,
}

impl Default for ParallelLoop {
    fn default() -> Self {
        Self::new(ExecutionOptions::default())
    }
}

impl ParallelLoop {
    pub fn new(options: ExecutionOptions) -> Self {
        Self {
            dispatcher: WorkDispatcher::new(options),
        }
    }

    /// Build a loop runner from option overrides, validated up front.
    pub fn configure<F>(callback: F) -> Result<Self, LoopError>
    where
        F: FnOnce(&mut OptionsBuilder),
    {
        ExecutionOptions::configure(callback).map(Self::new)
    }

    pub fn options(&self) -> &ExecutionOptions {
        self.dispatcher.options()
    }

    pub fn dispatcher(&self) -> &WorkDispatcher {
        &self.dispatcher
    }

    /// Run `work` for every value of an arithmetic sequence.
    pub async fn for_range<T, F>(
        &self,
        mut sequencer: ArithmeticSequencer<T>,
        work: F,
    ) -> Result<RunStats, LoopError>
    where
        T: LoopNumber,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run(&mut sequencer, work).await
    }

    /// Run `work` for every item of `items`.
    pub async fn for_each<I, F>(&self, items: I, work: F) -> Result<RunStats, LoopError>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run(&mut EnumerableSequencer::new(items), work).await
    }

    /// Map every item through `work`, returning results in input order.
    ///
    /// Any unit failure rejects the whole call: no partial results are
    /// returned. Use [`ParallelLoop::for_each_partial`] to keep them.
    pub async fn for_each_ordered<I, F, R>(&self, items: I, work: F) -> Result<Vec<R>, LoopError>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let results = Arc::new(OrderedResultSink::new());
        self.dispatcher
            .run_to_completion(&mut EnumerableSequencer::new(items), work, Some(&results))
            .await?;
        Ok(results.drain())
    }

    /// Like [`ParallelLoop::for_each_ordered`], but failed positions are
    /// left as `None` and the failures are returned alongside.
    pub async fn for_each_partial<I, F, R>(&self, items: I, work: F) -> PartialResults<R>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let failures = Arc::new(FailureSink::new());
        let results = Arc::new(OrderedResultSink::new());
        let mut sequencer = EnumerableSequencer::new(items);

        let stats = self
            .dispatcher
            .run(&mut sequencer, Arc::new(work), &failures, Some(&results))
            .await;

        PartialResults {
            slots: results.drain_slots(stats.dispatched),
            failures: failures.drain(),
            stats,
        }
    }

    /// Run `work` for every record a forward cursor yields.
    pub async fn for_cursor<Rd, P, T, F>(
        &self,
        mut cursor: ForwardCursor<Rd, P>,
        work: F,
    ) -> Result<RunStats, LoopError>
    where
        Rd: ForwardReader,
        P: FnMut(&mut Rd) -> anyhow::Result<T> + Send,
        T: Send + 'static,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run(&mut cursor, work).await
    }

    /// Run `work` for every value of any sequencer.
    pub async fn run<S, F>(&self, sequencer: &mut S, work: F) -> Result<RunStats, LoopError>
    where
        S: Sequencer,
        F: Fn(S::Item) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher
            .run_to_completion(sequencer, work, None::<&Arc<OrderedResultSink<()>>>)
            .await
    }

    /// Map every value of any sequencer through `work`, returning results in sequence order.
    pub async fn run_ordered<S, F, R>(&self, sequencer: &mut S, work: F) -> Result<Vec<R>, LoopError>
    where
        S: Sequencer,
        F: Fn(S::Item) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let results = Arc::new(OrderedResultSink::new());
        self.dispatcher
            .run_to_completion(sequencer, work, Some(&results))
            .await?;
        Ok(results.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_results_mark_gaps() {
        let runner = ParallelLoop::configure(|o| {
            o.batch_size(2);
        })
        .unwrap();

        let outcome = runner
            .for_each_partial(vec![1, 2, 3, 4], |x: i32| {
                if x % 2 == 0 {
                    anyhow::bail!("even {x}");
                }
                Ok(x * 100)
            })
            .await;

        assert!(!outcome.is_complete());
        assert_eq!(outcome.slots, vec![Some(100), None, Some(300), None]);
        assert_eq!(outcome.failures.as_ref().map(AggregateError::positions), Some(vec![1, 3]));
        assert_eq!(outcome.successes(), vec![100, 300]);
    }

    #[tokio::test]
    async fn test_cancelled_partial_run_is_incomplete() {
        let token = tokio_util::sync::CancellationToken::new();
        let trigger = token.clone();
        let runner = ParallelLoop::configure(|o| {
            o.batch_size(2).cancellation(token);
        })
        .unwrap();

        let outcome = runner
            .for_each_partial(0..10, move |i: u32| {
                if i == 0 {
                    trigger.cancel();
                }
                Ok(i)
            })
            .await;

        assert!(outcome.stats.cancelled);
        assert_eq!(outcome.slots, vec![Some(0), Some(1)]);
        assert!(outcome.failures.is_none());
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn test_finished_partial_run_is_complete() {
        let outcome = ParallelLoop::default()
            .for_each_partial(vec![3, 4], |x: i32| Ok(x + 1))
            .await;
        assert!(outcome.is_complete());
        assert_eq!(outcome.successes(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_run_ordered_over_range() {
        let runner = ParallelLoop::configure(|o| {
            o.batch_size(4);
        })
        .unwrap();
        let mut seq = ArithmeticSequencer::range(0u32, 10, 1).unwrap();

        let squares = runner.run_ordered(&mut seq, |i| Ok(i * i)).await.unwrap();
        assert_eq!(squares, (0..10).map(|i| i * i).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_fixed_arguments_captured_by_closure() {
        let prefix = Arc::new(String::from("item-"));
        let runner = ParallelLoop::default();

        let labels = runner
            .for_each_ordered(0..3, move |i| Ok(format!("{prefix}{i}")))
            .await
            .unwrap();
        assert_eq!(labels, vec!["item-0", "item-1", "item-2"]);
    }
}
