//! Cursor abstraction over the iteration shapes the engine can drive.
//!
//! Only the orchestrating loop advances a sequencer, so implementations need
//! no internal synchronization. `has_next` may suspend (forward readers do);
//! `next` must only be called after `has_next` returned `true`.

use anyhow::{Result, anyhow};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::iter::Peekable;

use super::error::LoopError;

/// A single-consumer cursor yielding `(position, value)` pairs.
pub trait Sequencer: Send {
    type Item: Send + 'static;

    /// Whether another value is available. An error ends the sequence.
    fn has_next(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// Take the next value together with its zero-based position.
    fn next(&mut self) -> Result<(usize, Self::Item)>;
}

/// Relational operator evaluated as `relation(current, limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Relation {
    pub fn holds<T: PartialOrd>(self, current: &T, limit: &T) -> bool {
        match self {
            Relation::Lt => current < limit,
            Relation::Le => current <= limit,
            Relation::Gt => current > limit,
            Relation::Ge => current >= limit,
            Relation::Eq => current == limit,
            Relation::Ne => current != limit,
        }
    }
}

/// Compound assignment applied as `current = assignment(current, step)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Add,
    Sub,
    Mul,
    Div,
}

impl Assignment {
    pub fn symbol(self) -> &'static str {
        match self {
            Assignment::Add => "+=",
            Assignment::Sub => "-=",
            Assignment::Mul => "*=",
            Assignment::Div => "/=",
        }
    }
}

/// Numeric types an [`ArithmeticSequencer`] can count with.
pub trait LoopNumber: Copy + PartialOrd + Debug + Display + Send + 'static {
    const ZERO: Self;
    const ONE: Self;

    /// Apply `assignment` with `step`, or `None` when the result is not representable.
    fn apply(self, assignment: Assignment, step: Self) -> Option<Self>;
}

macro_rules! impl_loop_number_int {
    ($($t:ty),*) => {$(
        impl LoopNumber for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;

            fn apply(self, assignment: Assignment, step: Self) -> Option<Self> {
                match assignment {
                    Assignment::Add => self.checked_add(step),
                    Assignment::Sub => self.checked_sub(step),
                    Assignment::Mul => self.checked_mul(step),
                    Assignment::Div => self.checked_div(step),
                }
            }
        }
    )*};
}

macro_rules! impl_loop_number_float {
    ($($t:ty),*) => {$(
        impl LoopNumber for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            fn apply(self, assignment: Assignment, step: Self) -> Option<Self> {
                let next = match assignment {
                    Assignment::Add => self + step,
                    Assignment::Sub => self - step,
                    Assignment::Mul => self * step,
                    Assignment::Div => self / step,
                };
                next.is_finite().then_some(next)
            }
        }
    )*};
}

impl_loop_number_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_loop_number_float!(f32, f64);

/// `for (current = start; relation(current, limit); current = assignment(current, step))`
///
/// Integer steps are checked: a step that would overflow ends the sequence.
/// A step pointing away from `limit` is not detected and yields an unbounded
/// sequence; pair such loops with a cancellation token or timeout.
#[derive(Debug, Clone)]
pub struct ArithmeticSequencer<T> {
    current: Option<T>,
    limit: T,
    step: T,
    relation: Relation,
    assignment: Assignment,
    position: usize,
}

impl<T: LoopNumber> ArithmeticSequencer<T> {
    /// Build a sequencer, rejecting steps that can never move the loop variable.
    pub fn new(
        start: T,
        relation: Relation,
        limit: T,
        assignment: Assignment,
        step: T,
    ) -> Result<Self, LoopError> {
        let stalled = match assignment {
            Assignment::Add | Assignment::Sub => step == T::ZERO,
            Assignment::Mul => step == T::ONE,
            Assignment::Div => step == T::ONE || step == T::ZERO,
        };
        if stalled {
            return Err(LoopError::StalledStep {
                assignment: assignment.symbol(),
                step: step.to_string(),
            });
        }

        Ok(Self {
            current: Some(start),
            limit,
            step,
            relation,
            assignment,
            position: 0,
        })
    }

    /// `start..limit` counting up by `step`.
    pub fn range(start: T, limit: T, step: T) -> Result<Self, LoopError> {
        Self::new(start, Relation::Lt, limit, Assignment::Add, step)
    }

    fn active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| self.relation.holds(current, &self.limit))
    }
}

impl<T: LoopNumber> Sequencer for ArithmeticSequencer<T> {
    type Item = T;

    async fn has_next(&mut self) -> Result<bool> {
        Ok(self.active())
    }

    fn next(&mut self) -> Result<(usize, T)> {
        if !self.active() {
            return Err(anyhow!("arithmetic sequence is exhausted"));
        }
        let Some(value) = self.current else {
            return Err(anyhow!("arithmetic sequence is exhausted"));
        };

        self.current = value.apply(self.assignment, self.step);
        let position = self.position;
        self.position += 1;
        Ok((position, value))
    }
}

/// Wraps any iterator, finite or not.
pub struct EnumerableSequencer<I: Iterator> {
    source: Peekable<I>,
    position: usize,
}

impl<I: Iterator> EnumerableSequencer<I> {
    pub fn new<S>(source: S) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        Self {
            source: source.into_iter().peekable(),
            position: 0,
        }
    }
}

impl<I> Sequencer for EnumerableSequencer<I>
where
    I: Iterator + Send,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    async fn has_next(&mut self) -> Result<bool> {
        Ok(self.source.peek().is_some())
    }

    fn next(&mut self) -> Result<(usize, I::Item)> {
        let value = self
            .source
            .next()
            .ok_or_else(|| anyhow!("enumerable sequence is exhausted"))?;
        let position = self.position;
        self.position += 1;
        Ok((position, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain<S: Sequencer>(mut sequencer: S) -> Vec<(usize, S::Item)> {
        let mut items = Vec::new();
        while sequencer.has_next().await.unwrap() {
            items.push(sequencer.next().unwrap());
        }
        items
    }

    #[tokio::test]
    async fn test_range_counts_up() {
        let items = drain(ArithmeticSequencer::range(0, 5, 2).unwrap()).await;
        assert_eq!(items, vec![(0, 0), (1, 2), (2, 4)]);
    }

    #[tokio::test]
    async fn test_descending_inclusive() {
        let seq = ArithmeticSequencer::new(3i32, Relation::Ge, 0, Assignment::Sub, 1).unwrap();
        let values: Vec<i32> = drain(seq).await.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_multiplicative_step() {
        let seq = ArithmeticSequencer::new(1u32, Relation::Le, 100, Assignment::Mul, 3).unwrap();
        let values: Vec<u32> = drain(seq).await.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![1, 3, 9, 27, 81]);
    }

    #[tokio::test]
    async fn test_overflow_ends_sequence() {
        let seq = ArithmeticSequencer::new(250u8, Relation::Ne, 0, Assignment::Add, 3).unwrap();
        let values: Vec<u8> = drain(seq).await.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![250, 253]);
    }

    #[tokio::test]
    async fn test_float_range() {
        let seq = ArithmeticSequencer::range(0.0f64, 1.0, 0.25).unwrap();
        assert_eq!(drain(seq).await.len(), 4);
    }

    #[tokio::test]
    async fn test_relation_false_initially_is_empty() {
        let seq = ArithmeticSequencer::range(10, 0, 1).unwrap();
        assert!(drain(seq).await.is_empty());
    }

    #[test]
    fn test_stalled_steps_rejected() {
        assert!(ArithmeticSequencer::range(0, 10, 0).is_err());
        assert!(ArithmeticSequencer::new(1, Relation::Lt, 10, Assignment::Mul, 1).is_err());
        assert!(ArithmeticSequencer::new(8, Relation::Gt, 1, Assignment::Div, 0).is_err());

        let err = ArithmeticSequencer::new(0.0, Relation::Lt, 1.0, Assignment::Sub, 0.0).unwrap_err();
        assert!(err.to_string().contains("-= 0"));
    }

    #[tokio::test]
    async fn test_enumerable_positions() {
        let items = drain(EnumerableSequencer::new(vec!["a", "b", "c"])).await;
        assert_eq!(items, vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[tokio::test]
    async fn test_enumerable_infinite_source() {
        let mut seq = EnumerableSequencer::new(0u64..);
        for expected in 0..100 {
            assert!(seq.has_next().await.unwrap());
            assert_eq!(seq.next().unwrap(), (expected as usize, expected));
        }
    }

    #[tokio::test]
    async fn test_next_after_exhaustion_errors() {
        let mut seq = EnumerableSequencer::new(Vec::<i32>::new());
        assert!(!seq.has_next().await.unwrap());
        assert!(seq.next().is_err());
    }
}
