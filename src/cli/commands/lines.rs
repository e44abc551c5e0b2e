use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, BufReader};

use super::shell::ShellCommand;
use super::{RunContext, drive};
use crate::parallel::ForwardCursor;

#[derive(Args)]
pub struct LinesArgs {
    /// Read lines from this file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Command to run; `{}` is replaced by the line
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

pub async fn execute(args: LinesArgs, ctx: &RunContext) -> Result<()> {
    let command = ShellCommand::new(args.command)?;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.file {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut cursor = ForwardCursor::lines(reader);
    drive(&mut cursor, command, ctx).await
}
