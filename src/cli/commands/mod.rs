use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::Output;
use crate::config::{ConfigOverrides, ExecutionOverrides, LoopConfig, OutputOverrides};
use crate::parallel::{
    FailureSink, LoopError, OrderedResultSink, ParallelLoop, RunStats, SchedulingHint, Sequencer,
};

pub mod each;
pub mod lines;
pub mod range;
pub mod shell;

use shell::ShellCommand;

#[derive(Parser)]
#[command(
    name = "parloop",
    version = env!("CARGO_PKG_VERSION"),
    about = "Run a command for every value of a range, list or input stream, in parallel batches",
    long_about = "parloop runs a command once per loop value. Values are dispatched in batches of \
                  at most --batch-size concurrent units; each batch finishes before the next starts. \
                  Failing units never stop their siblings and are reported together at the end."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Maximum units per batch (default: twice the logical core count)
    #[arg(short, long, global = true)]
    pub batch_size: Option<usize>,

    /// Stop starting new units after this many milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Where units run
    #[arg(long, value_enum, global = true)]
    pub scheduling: Option<SchedulingArg>,

    /// Print command output in input order instead of completion order
    #[arg(short, long, global = true)]
    pub keep_order: bool,

    /// Format of the final run summary on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Loop over an arithmetic range
    Range(range::RangeArgs),
    /// Loop over the given values
    Each(each::EachArgs),
    /// Loop over lines of a file or stdin
    Lines(lines::LinesArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchedulingArg {
    SharedPool,
    Blocking,
    Dedicated,
}

impl From<SchedulingArg> for SchedulingHint {
    fn from(arg: SchedulingArg) -> Self {
        match arg {
            SchedulingArg::SharedPool => SchedulingHint::SharedPool,
            SchedulingArg::Blocking => SchedulingHint::Blocking,
            SchedulingArg::Dedicated => SchedulingHint::Dedicated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Everything a command needs to run its loop.
pub struct RunContext {
    pub runner: ParallelLoop,
    pub keep_order: bool,
    pub format: OutputFormat,
    pub output: Output,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Set up logging based on verbosity
        setup_logging(self.verbose, self.quiet);

        // 0 means auto in config files; an explicit flag of 0 is rejected
        if self.batch_size == Some(0) {
            return Err(LoopError::InvalidBatchSize.into());
        }

        let config = LoopConfig::load_with(self.config.as_deref(), Some(&self.overrides()))?;
        tracing::debug!("Effective configuration: {:?}", config);

        let cancellation = CancellationToken::new();
        cancel_on_interrupt(cancellation.clone());

        let ctx = RunContext {
            runner: ParallelLoop::new(config.execution_options(cancellation)?),
            keep_order: config.output.keep_order,
            format: self.format,
            output: Output::new(self.verbose > 0, self.quiet),
        };

        match self.command {
            Commands::Range(args) => range::execute(args, &ctx).await,
            Commands::Each(args) => each::execute(args, &ctx).await,
            Commands::Lines(args) => lines::execute(args, &ctx).await,
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            execution: ExecutionOverrides {
                batch_size: self.batch_size,
                timeout_ms: self.timeout_ms,
                scheduling: self.scheduling.map(SchedulingHint::from),
            },
            output: OutputOverrides {
                keep_order: self.keep_order.then_some(true),
            },
        }
    }
}

/// Run `command` once per value of `sequencer` and report the outcome.
pub(crate) async fn drive<S>(sequencer: &mut S, command: ShellCommand, ctx: &RunContext) -> Result<()>
where
    S: Sequencer,
    S::Item: Display,
{
    let command = Arc::new(command);
    let outcome = if ctx.keep_order {
        // Successful outputs still print, in order, when some units fail
        let failures = Arc::new(FailureSink::new());
        let outputs = Arc::new(OrderedResultSink::new());
        let stats = ctx
            .runner
            .dispatcher()
            .run(
                sequencer,
                Arc::new(move |value: S::Item| command.output(&value.to_string())),
                &failures,
                Some(&outputs),
            )
            .await;

        let mut stdout = std::io::stdout().lock();
        for output in outputs.drain() {
            stdout.write_all(&output)?;
        }
        stdout.flush()?;

        match failures.drain() {
            Some(aggregate) => Err(LoopError::Aggregate(aggregate)),
            None => Ok(stats),
        }
    } else {
        ctx.runner
            .run(sequencer, move |value: S::Item| {
                let output = command.output(&value.to_string())?;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&output)?;
                stdout.flush()?;
                Ok(())
            })
            .await
    };

    report(outcome, ctx)
}

fn report(outcome: Result<RunStats, LoopError>, ctx: &RunContext) -> Result<()> {
    match outcome {
        Ok(stats) => {
            ctx.output.run_summary(&stats);
            if ctx.format == OutputFormat::Json {
                println!("{}", serde_json::to_string(&stats)?);
            }
            Ok(())
        }
        Err(LoopError::Aggregate(aggregate)) => {
            ctx.output.failures(&aggregate);
            anyhow::bail!(
                "{} of the dispatched units failed",
                aggregate.len()
            )
        }
        Err(err) => Err(err.into()),
    }
}

fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; letting running units finish");
            token.cancel();
        }
    });
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_only_set_flags() {
        let cli = Cli::parse_from(["parloop", "-b", "3", "each", "a", "--", "echo"]);
        let overrides = cli.overrides();

        assert_eq!(overrides.execution.batch_size, Some(3));
        assert_eq!(overrides.execution.timeout_ms, None);
        assert_eq!(overrides.execution.scheduling, None);
        assert_eq!(overrides.output.keep_order, None);
    }

    #[test]
    fn test_scheduling_flag_maps_to_hint() {
        let cli = Cli::parse_from([
            "parloop",
            "--scheduling",
            "dedicated",
            "-k",
            "each",
            "a",
            "--",
            "echo",
        ]);
        let overrides = cli.overrides();

        assert_eq!(overrides.execution.scheduling, Some(SchedulingHint::Dedicated));
        assert_eq!(overrides.output.keep_order, Some(true));
    }
}
