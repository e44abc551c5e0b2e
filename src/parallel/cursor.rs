//! Forward-only cursors for the "while" loop family.
//!
//! A [`ForwardCursor`] pairs an asynchronous condition (a [`ForwardReader`]
//! advancing to its next record) with a provider that materializes a value
//! from the reader's current record. The engine awaits the condition before
//! every dispatch, so a reader is never advanced concurrently.

use anyhow::{Result, anyhow};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::sequencer::Sequencer;

/// A source that can be advanced one record at a time.
pub trait ForwardReader: Send {
    /// Move to the next record. Returns `false` once the source is exhausted.
    fn advance(&mut self) -> impl Future<Output = Result<bool>> + Send;
}

/// Adapts an async closure into a [`ForwardReader`].
///
/// Useful for paging through external resources where the closure fetches
/// the next page and the provider reads from state it shares with it.
pub struct AsyncCondition<C> {
    condition: C,
}

impl<C, Fut> AsyncCondition<C>
where
    C: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool>> + Send,
{
    pub fn new(condition: C) -> Self {
        Self { condition }
    }
}

impl<C, Fut> ForwardReader for AsyncCondition<C>
where
    C: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool>> + Send,
{
    async fn advance(&mut self) -> Result<bool> {
        (self.condition)().await
    }
}

/// Reads lines from any async buffered reader.
pub struct LineReader<B> {
    lines: Lines<B>,
    current: Option<String>,
}

impl<B: AsyncBufRead + Unpin + Send> LineReader<B> {
    pub fn new(reader: B) -> Self {
        Self {
            lines: reader.lines(),
            current: None,
        }
    }

    /// Take the current line, leaving nothing behind.
    pub fn take_line(&mut self) -> Result<String> {
        self.current
            .take()
            .ok_or_else(|| anyhow!("no current line; advance the reader first"))
    }
}

impl<B: AsyncBufRead + Unpin + Send> ForwardReader for LineReader<B> {
    async fn advance(&mut self) -> Result<bool> {
        self.current = self.lines.next_line().await?;
        Ok(self.current.is_some())
    }
}

/// Drives a [`ForwardReader`] as a [`Sequencer`].
///
/// `has_next` awaits the reader's condition; once it returns `false` (or
/// fails) the cursor stays exhausted. `next` calls the provider on the
/// record the condition moved to.
pub struct ForwardCursor<Rd, P> {
    reader: Rd,
    provider: P,
    state: CursorState,
    position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    AwaitingCondition,
    Ready,
    Exhausted,
}

impl<Rd, P, T> ForwardCursor<Rd, P>
where
    Rd: ForwardReader,
    P: FnMut(&mut Rd) -> Result<T> + Send,
{
    pub fn new(reader: Rd, provider: P) -> Self {
        Self {
            reader,
            provider,
            state: CursorState::AwaitingCondition,
            position: 0,
        }
    }
}

impl<B> ForwardCursor<LineReader<B>, fn(&mut LineReader<B>) -> Result<String>>
where
    B: AsyncBufRead + Unpin + Send,
{
    /// One value per line of `reader`.
    pub fn lines(reader: B) -> Self {
        Self::new(LineReader::new(reader), LineReader::take_line)
    }
}

impl<Rd, P, T> Sequencer for ForwardCursor<Rd, P>
where
    Rd: ForwardReader,
    P: FnMut(&mut Rd) -> Result<T> + Send,
    T: Send + 'static,
{
    type Item = T;

    async fn has_next(&mut self) -> Result<bool> {
        match self.state {
            CursorState::Exhausted => Ok(false),
            CursorState::Ready => Ok(true),
            CursorState::AwaitingCondition => match self.reader.advance().await {
                Ok(true) => {
                    self.state = CursorState::Ready;
                    Ok(true)
                }
                Ok(false) => {
                    self.state = CursorState::Exhausted;
                    Ok(false)
                }
                Err(err) => {
                    self.state = CursorState::Exhausted;
                    Err(err)
                }
            },
        }
    }

    fn next(&mut self) -> Result<(usize, T)> {
        if self.state != CursorState::Ready {
            return Err(anyhow!("forward cursor has no pending record"));
        }
        self.state = CursorState::AwaitingCondition;

        let position = self.position;
        self.position += 1;
        let value = (self.provider)(&mut self.reader)?;
        Ok((position, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lines_cursor() {
        let input: &[u8] = b"alpha\nbeta\ngamma\n";
        let mut cursor = ForwardCursor::lines(input);

        let mut seen = Vec::new();
        while cursor.has_next().await.unwrap() {
            seen.push(cursor.next().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                (0, "alpha".to_string()),
                (1, "beta".to_string()),
                (2, "gamma".to_string())
            ]
        );
        // Exhaustion is permanent
        assert!(!cursor.has_next().await.unwrap());
    }

    #[tokio::test]
    async fn test_has_next_is_idempotent_until_next() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let condition = AsyncCondition::new(move || {
            let counter = Arc::clone(&counter);
            async move { Ok::<_, anyhow::Error>(counter.fetch_add(1, Ordering::SeqCst) < 2) }
        });
        let mut cursor = ForwardCursor::new(condition, |_: &mut _| Ok(()));

        assert!(cursor.has_next().await.unwrap());
        assert!(cursor.has_next().await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cursor.next().unwrap();
        assert!(cursor.has_next().await.unwrap());
        cursor.next().unwrap();
        assert!(!cursor.has_next().await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_condition_error_exhausts_cursor() {
        let condition = AsyncCondition::new(|| async { Err::<bool, _>(anyhow!("connection reset")) });
        let mut cursor = ForwardCursor::new(condition, |_: &mut _| Ok(1));

        assert!(cursor.has_next().await.is_err());
        assert!(!cursor.has_next().await.unwrap());
        assert!(cursor.next().is_err());
    }
}
