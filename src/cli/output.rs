//! Status output for parloop
//!
//! Command output owns stdout, so every status line goes to stderr.

use console::style;

use crate::parallel::{AggregateError, RunStats};

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    /// Create a new output handler
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("✔").green(), message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        // Errors are always shown, even in quiet mode
        eprintln!("{} {}", style("✖").red(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("⚠").yellow(), message);
        }
    }

    /// Print a verbose message (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            eprintln!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    /// Summarize a finished run
    pub fn run_summary(&self, stats: &RunStats) {
        if stats.cancelled {
            self.warning(&format!(
                "Cancelled after {} units; remaining input was not started",
                stats.dispatched
            ));
        } else {
            self.success(&format!("{} units completed", stats.dispatched));
        }
        self.verbose(&format!(
            "{} units in {} batches ({} passes)",
            stats.dispatched, stats.batches, stats.passes
        ));
    }

    /// List every captured failure
    pub fn failures(&self, aggregate: &AggregateError) {
        for failure in aggregate.failures() {
            self.error(&failure.to_string());
        }
        self.error(&format!(
            "{} {}",
            style(aggregate.len()).red().bold(),
            if aggregate.len() == 1 { "unit failed" } else { "units failed" }
        ));
    }
}
