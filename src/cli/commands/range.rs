use anyhow::Result;
use clap::{Args, ValueEnum};

use super::shell::ShellCommand;
use super::{RunContext, drive};
use crate::parallel::{ArithmeticSequencer, Assignment, Relation};

#[derive(Args)]
pub struct RangeArgs {
    /// First loop value
    #[arg(allow_negative_numbers = true)]
    pub start: i64,

    /// Value the loop variable is compared against
    #[arg(allow_negative_numbers = true)]
    pub limit: i64,

    /// Amount applied to the loop variable after each value
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    pub step: i64,

    /// Comparison that must hold for the loop to continue
    #[arg(short, long, value_enum, default_value_t = RelationArg::Lt)]
    pub relation: RelationArg,

    /// How the step is applied
    #[arg(short, long, value_enum, default_value_t = AssignmentArg::Add)]
    pub op: AssignmentArg,

    /// Command to run; `{}` is replaced by the value
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RelationArg {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl From<RelationArg> for Relation {
    fn from(arg: RelationArg) -> Self {
        match arg {
            RelationArg::Lt => Relation::Lt,
            RelationArg::Le => Relation::Le,
            RelationArg::Gt => Relation::Gt,
            RelationArg::Ge => Relation::Ge,
            RelationArg::Eq => Relation::Eq,
            RelationArg::Ne => Relation::Ne,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssignmentArg {
    Add,
    Sub,
    Mul,
    Div,
}

impl From<AssignmentArg> for Assignment {
    fn from(arg: AssignmentArg) -> Self {
        match arg {
            AssignmentArg::Add => Assignment::Add,
            AssignmentArg::Sub => Assignment::Sub,
            AssignmentArg::Mul => Assignment::Mul,
            AssignmentArg::Div => Assignment::Div,
        }
    }
}

pub async fn execute(args: RangeArgs, ctx: &RunContext) -> Result<()> {
    let command = ShellCommand::new(args.command)?;
    let mut sequencer = ArithmeticSequencer::new(
        args.start,
        args.relation.into(),
        args.limit,
        args.op.into(),
        args.step,
    )?;

    ctx.output.verbose(&format!(
        "Looping from {} while {:?} {} with {} {}",
        args.start,
        args.relation,
        args.limit,
        Assignment::from(args.op).symbol(),
        args.step
    ));
    drive(&mut sequencer, command, ctx).await
}
