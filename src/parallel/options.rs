use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::LoopError;

/// Where dispatched units run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingHint {
    /// A rayon pool with one thread per batch slot, owned by the runner
    #[default]
    SharedPool,
    /// tokio's blocking thread pool
    Blocking,
    /// One dedicated OS thread per unit
    Dedicated,
}

/// Immutable per-call execution settings.
///
/// Built through [`ExecutionOptions::configure`], which applies caller overrides
/// on top of the defaults and validates them before any unit is dispatched.
///
/// Cancellation is cooperative: once the token (or the timeout derived from it)
/// fires, no new unit starts, but units already running are never interrupted.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    batch_size: usize,
    cancellation: CancellationToken,
    timeout: Option<Duration>,
    scheduling: SchedulingHint,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cancellation: CancellationToken::new(),
            timeout: None,
            scheduling: SchedulingHint::default(),
        }
    }
}

/// Two units per logical core.
pub fn default_batch_size() -> usize {
    std::cmp::max(1, num_cpus::get() * 2)
}

impl ExecutionOptions {
    /// Apply `callback` over the defaults and validate the result.
    ///
    /// # Example
    /// ```rust
    /// use parloop::parallel::ExecutionOptions;
    /// use std::time::Duration;
    ///
    /// let options = ExecutionOptions::configure(|o| {
    ///     o.batch_size(3).timeout(Duration::from_secs(5));
    /// })
    /// .unwrap();
    /// assert_eq!(options.batch_size(), 3);
    ///
    /// assert!(ExecutionOptions::configure(|o| {
    ///     o.batch_size(0);
    /// })
    /// .is_err());
    /// ```
    pub fn configure<F>(callback: F) -> Result<Self, LoopError>
    where
        F: FnOnce(&mut OptionsBuilder),
    {
        let mut builder = OptionsBuilder::default();
        callback(&mut builder);
        builder.build()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn scheduling(&self) -> SchedulingHint {
        self.scheduling
    }

    /// Derive the cancellation scope for one call.
    ///
    /// Must be called from within a tokio runtime when a timeout is set.
    pub(crate) fn cancel_scope(&self) -> CancelScope {
        let token = self.cancellation.child_token();
        let timer = self.timeout.map(|timeout| {
            let expiring = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::debug!("Timeout of {:?} elapsed, cancelling dispatch", timeout);
                expiring.cancel();
            })
        });
        CancelScope { token, timer }
    }
}

/// Mutable overrides handed to the [`ExecutionOptions::configure`] callback.
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    batch_size: usize,
    cancellation: Option<CancellationToken>,
    timeout: Option<Duration>,
    scheduling: SchedulingHint,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cancellation: None,
            timeout: None,
            scheduling: SchedulingHint::default(),
        }
    }
}

impl OptionsBuilder {
    pub fn batch_size(&mut self, batch_size: usize) -> &mut Self {
        self.batch_size = batch_size;
        self
    }

    pub fn cancellation(&mut self, token: CancellationToken) -> &mut Self {
        self.cancellation = Some(token);
        self
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn scheduling(&mut self, hint: SchedulingHint) -> &mut Self {
        self.scheduling = hint;
        self
    }

    fn build(self) -> Result<ExecutionOptions, LoopError> {
        if self.batch_size == 0 {
            return Err(LoopError::InvalidBatchSize);
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(LoopError::InvalidTimeout);
        }

        Ok(ExecutionOptions {
            batch_size: self.batch_size,
            cancellation: self.cancellation.unwrap_or_default(),
            timeout: self.timeout,
            scheduling: self.scheduling,
        })
    }
}

/// Cancellation state owned by one loop call. Aborts the timeout timer on drop.
pub(crate) struct CancelScope {
    token: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl CancelScope {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancelScope {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
