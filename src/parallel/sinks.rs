use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::{AggregateError, UnitFailure};

/// Append-only, lock-free collector of unit failures.
#[derive(Debug, Default)]
pub struct FailureSink {
    failures: SegQueue<UnitFailure>,
}

impl FailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Safe to call from any number of workers.
    pub fn add(&self, failure: UnitFailure) {
        tracing::warn!("Captured failure: {}", failure);
        self.failures.push(failure);
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Take every captured failure. Returns `None` when nothing failed.
    pub fn drain(&self) -> Option<AggregateError> {
        let failures: Vec<UnitFailure> = std::iter::from_fn(|| self.failures.pop()).collect();
        (!failures.is_empty()).then(|| AggregateError::new(failures))
    }
}

/// Concurrent position-to-value map that drains in ascending position order.
#[derive(Debug)]
pub struct OrderedResultSink<R> {
    slots: DashMap<usize, R>,
}

impl<R> Default for OrderedResultSink<R> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<R> OrderedResultSink<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result for `position`. The first write wins; later writes are ignored.
    pub fn put(&self, position: usize, value: R) {
        match self.slots.entry(position) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(_) => {
                tracing::error!("Result for position {} was already recorded", position);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.slots.iter().map(|entry| *entry.key()).collect();
        positions.sort_unstable();
        positions
    }

    /// Take the values in ascending position order. Missing positions are skipped.
    pub fn drain(&self) -> Vec<R> {
        self.positions()
            .into_iter()
            .filter_map(|position| self.slots.remove(&position).map(|(_, value)| value))
            .collect()
    }

    /// Take one slot per position in `0..len`, `None` where no result was recorded.
    pub fn drain_slots(&self, len: usize) -> Vec<Option<R>> {
        (0..len)
            .map(|position| self.slots.remove(&position).map(|(_, value)| value))
            .collect()
    }
}
