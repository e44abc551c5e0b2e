//! Configuration management for parloop
//!
//! Settings are layered with figment: embedded defaults, the user config,
//! the repository `parloop.toml`, an explicit `--config` file, `PARLOOP_`
//! environment variables and finally command-line flags.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::parallel::{ExecutionOptions, LoopError, SchedulingHint};

mod loader;

#[cfg(test)]
mod tests;

/// Main configuration structure for parloop
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoopConfig {
    /// How loops are executed
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// How results are presented
    #[serde(default)]
    pub output: OutputConfig,
}

/// Execution settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExecutionConfig {
    /// Units per batch (0 = twice the logical core count)
    #[serde(default)]
    pub batch_size: usize,

    /// Milliseconds after which no new unit starts
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Where units run
    #[serde(default)]
    pub scheduling: SchedulingHint,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// Print results in input order
    #[serde(default)]
    pub keep_order: bool,
}

/// Command-line values layered on top of every other source.
///
/// `None` fields are skipped so they never mask lower layers.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ConfigOverrides {
    pub execution: ExecutionOverrides,
    pub output: OutputOverrides,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ExecutionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<SchedulingHint>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct OutputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_order: Option<bool>,
}

impl LoopConfig {
    /// Build validated execution options, cancelled through `cancellation`.
    pub fn execution_options(
        &self,
        cancellation: CancellationToken,
    ) -> Result<ExecutionOptions, LoopError> {
        let execution = &self.execution;
        ExecutionOptions::configure(|o| {
            o.cancellation(cancellation).scheduling(execution.scheduling);
            if execution.batch_size > 0 {
                o.batch_size(execution.batch_size);
            }
            if let Some(ms) = execution.timeout_ms {
                o.timeout(Duration::from_millis(ms));
            }
        })
    }
}
