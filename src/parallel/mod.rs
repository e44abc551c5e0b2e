//! Partitioned parallel loop engine
//!
//! This module drives bounded-concurrency "for", "for-each" and "while" loops.
//! Values come from a [`Sequencer`]; each value becomes one unit of work that
//! runs concurrently with the rest of its batch. Batches never overlap, which
//! caps peak concurrency at the batch size without a semaphore.
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Sequencing**: arithmetic ranges, iterators and forward-only readers behind one cursor trait
//! - **Batching**: fills at most `batch_size` units, joins them, then decides whether to continue
//! - **Failure isolation**: per-unit errors and panics are captured, never propagated mid-loop
//! - **Ordering**: optional position-keyed results that drain in input order
//! - **Cancellation**: cooperative; stops new dispatch, never interrupts running units
//!
//! ## What This Module Does NOT Do:
//! - **Preemption**: a unit that ignores cancellation runs to completion
//! - **Loop validation**: a sequencer that never terminates is the caller's problem
//!   (supply a cancellation token or timeout as a safety net)
//! - **Slot refilling**: a slow unit holds its whole batch open
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   Sequencer     │    │   WorkDispatcher │    │   Sinks         │
//! │                 │───▶│                  │───▶│                 │
//! │ • Arithmetic    │    │ • fill batch     │    │ • FailureSink   │
//! │ • Enumerable    │    │ • dispatch units │    │ • OrderedResult │
//! │ • ForwardCursor │    │ • join barrier   │    │   Sink          │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use parloop::parallel::ParallelLoop;
//!
//! # async fn demo() -> Result<(), parloop::parallel::LoopError> {
//! let runner = ParallelLoop::configure(|o| {
//!     o.batch_size(2);
//! })?;
//!
//! let lengths = runner
//!     .for_each_ordered(vec!["a", "b", "c", "d", "e"], |s| Ok(s.len()))
//!     .await?;
//! assert_eq!(lengths, vec![1, 1, 1, 1, 1]);
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod dispatcher;
pub mod error;
pub mod loops;
pub mod options;
pub mod sequencer;
pub mod sinks;

// Re-export main types for easier access
pub use cursor::{AsyncCondition, ForwardCursor, ForwardReader, LineReader};
pub use dispatcher::{RunStats, WorkDispatcher};
pub use error::{AggregateError, LoopError, UnitFailure};
pub use loops::{ParallelLoop, PartialResults};
pub use options::{ExecutionOptions, OptionsBuilder, SchedulingHint, default_batch_size};
pub use sequencer::{
    ArithmeticSequencer, Assignment, EnumerableSequencer, LoopNumber, Relation, Sequencer,
};
pub use sinks::{FailureSink, OrderedResultSink};
