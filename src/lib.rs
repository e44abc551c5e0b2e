//! # parloop - Partitioned parallel loops
//!
//! Bounded-concurrency `for`, `for-each` and `while` loops that run every
//! iteration as its own unit of work, in capped batches.
//!
//! ## Features
//!
//! - **Three loop shapes**: arithmetic ranges, any iterator, and forward-only async readers
//! - **Capped concurrency**: at most `batch_size` units run at once; batches never overlap
//! - **Failure isolation**: failing or panicking units never stop their siblings;
//!   all failures are reported together at the end
//! - **Ordered results**: map a sequence in parallel and get results back in input order
//! - **Cooperative cancellation**: a token or timeout stops new dispatch, never running units
//!
//! ## Quick Start
//!
//! ```bash
//! # Run a command for 0..10, three at a time
//! parloop -b 3 range 0 10 -- echo {}
//!
//! # One unit per line of stdin, output kept in input order
//! ls | parloop --keep-order lines -- wc -c {}
//! ```

pub mod cli;
pub mod config;
pub mod parallel;

pub use cli::{Cli, Output};
pub use config::LoopConfig;
pub use parallel::{ExecutionOptions, LoopError, ParallelLoop};

/// Result type alias for parloop operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
