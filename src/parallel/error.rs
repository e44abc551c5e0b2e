//! Error types for parallel loop execution.
//!
//! Configuration problems are reported immediately as [`LoopError`] variants.
//! Failures inside individual units are captured while the loop runs and
//! surface once, at the end of the call, as a single [`AggregateError`].

use std::fmt;

/// Errors returned by the parallel loop engine.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// Batch size was zero.
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
    /// Timeout was zero.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
    /// Arithmetic step can never move the loop variable.
    #[error("step `{assignment} {step}` never advances the loop variable")]
    StalledStep {
        /// The assignment operator, e.g. `+=`.
        assignment: &'static str,
        /// The step value, rendered for display.
        step: String,
    },
    /// One or more units failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl LoopError {
    /// Returns the aggregate of unit failures, if that is what this error is.
    pub fn aggregate(&self) -> Option<&AggregateError> {
        match self {
            LoopError::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

/// A single captured failure.
#[derive(Debug)]
pub struct UnitFailure {
    /// Sequence position of the unit, or `None` when the sequence source itself failed.
    pub position: Option<usize>,
    /// The underlying error.
    pub error: anyhow::Error,
}

impl UnitFailure {
    pub(crate) fn at(position: usize, error: anyhow::Error) -> Self {
        Self {
            position: Some(position),
            error,
        }
    }

    pub(crate) fn source(error: anyhow::Error) -> Self {
        Self {
            position: None,
            error,
        }
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "unit {position}: {:#}", self.error),
            None => write!(f, "sequence source: {:#}", self.error),
        }
    }
}

/// All failures captured during one loop call.
///
/// Failures appear in completion order, not submission order.
#[derive(Debug)]
pub struct AggregateError {
    failures: Vec<UnitFailure>,
}

/// How many failures `Display` lists before summarizing the rest.
const DISPLAY_LIMIT: usize = 3;

impl AggregateError {
    pub(crate) fn new(failures: Vec<UnitFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<UnitFailure> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Positions of the failed units, ascending. Source failures are skipped.
    pub fn positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.failures.iter().filter_map(|f| f.position).collect();
        positions.sort_unstable();
        positions
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.failures.len();
        write!(f, "{count} unit{} failed", if count == 1 { "" } else { "s" })?;
        for failure in self.failures.iter().take(DISPLAY_LIMIT) {
            write!(f, "; {failure}")?;
        }
        if count > DISPLAY_LIMIT {
            write!(f, "; ... and {} more", count - DISPLAY_LIMIT)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
