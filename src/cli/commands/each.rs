use anyhow::Result;
use clap::Args;

use super::shell::ShellCommand;
use super::{RunContext, drive};
use crate::parallel::EnumerableSequencer;

#[derive(Args)]
pub struct EachArgs {
    /// Values to loop over
    #[arg(required = true)]
    pub values: Vec<String>,

    /// Command to run; `{}` is replaced by the value
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

pub async fn execute(args: EachArgs, ctx: &RunContext) -> Result<()> {
    let command = ShellCommand::new(args.command)?;
    ctx.output
        .verbose(&format!("Looping over {} values", args.values.len()));

    let mut sequencer = EnumerableSequencer::new(args.values);
    drive(&mut sequencer, command, ctx).await
}
