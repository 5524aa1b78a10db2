//! CLI argument parsing for the churn pipeline.
//!
//! The CLI is intentionally thin: every subcommand reads JSON, calls into the
//! core stages, and writes JSON, so the same logic can be driven from tests
//! or another binary without re-parsing arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for the churn pipeline.
///
/// Keeping a single `RootArgs` type makes command routing obvious and avoids
/// hidden defaults in subcommand constructors.
#[derive(Parser, Debug)]
#[command(
    name = "cpilot",
    version,
    about = "Churn scoring and retention outreach pipeline",
    after_help = "Commands:\n  score     Validate and score a batch of customer records\n  pipeline  Select targets from a scored batch and run outreach\n  outreach  Handle a v1 score-and-outreach contract request\n\nExamples:\n  cpilot score --input batch.json --mode partial --out scored.json\n  cpilot score --mode fail_fast < batch.json\n  cpilot pipeline --batch scored.json --config run.json --out report.json\n  cpilot outreach --input request.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level pipeline commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Score(ScoreArgs),
    Pipeline(PipelineArgs),
    Outreach(OutreachArgs),
}

/// Score command inputs for one batch of customer records.
#[derive(Parser, Debug)]
#[command(about = "Validate and score a batch of customer records")]
pub struct ScoreArgs {
    /// JSON file holding the record list (stdin when omitted)
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Validation mode: fail_fast or partial
    #[arg(long, value_name = "MODE", default_value = "partial")]
    pub mode: String,

    /// JSON file holding candidate shortlist rules
    #[arg(long, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Write the batch envelope here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Pipeline command inputs joining a scored batch to a run configuration.
#[derive(Parser, Debug)]
#[command(about = "Select targets from a scored batch and run outreach")]
pub struct PipelineArgs {
    /// JSON file holding the scored batch envelope
    #[arg(long, value_name = "PATH")]
    pub batch: PathBuf,

    /// JSON file holding the run configuration
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Write the pipeline report here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Outreach command inputs for one contract request.
#[derive(Parser, Debug)]
#[command(about = "Handle a v1 score-and-outreach contract request")]
pub struct OutreachArgs {
    /// JSON file holding the contract request (stdin when omitted)
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Write the contract response here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}
