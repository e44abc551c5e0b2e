//! Command-line interface for parloop
//!
//! Parses arguments with clap, layers configuration, and drives the parallel
//! loop engine over shell commands.

pub mod commands;
mod output;

pub use commands::Cli;
pub use output::Output;
