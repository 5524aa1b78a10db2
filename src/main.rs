use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;

mod batch;
mod cli;
mod config;
mod contract;
mod decision;
mod exec;
mod outreach;
mod payload;
mod pipeline;
mod schema;
mod scorer;
mod select;
mod validate;

use cli::{Command, OutreachArgs, PipelineArgs, RootArgs, ScoreArgs};
use config::{BatchLimits, CandidateRules, DecisionPolicy, RunConfig};
use outreach::delivery::{Delivery, DisabledDelivery, SendgridDelivery};
use outreach::format::DeterministicFormatter;
use outreach::manager::OutreachCapabilities;
use outreach::picker::{picker_from_env, Picker};
use outreach::writers::{writer_from_env, DraftWriter};
use outreach::Tone;
use pipeline::{run_pipeline, BatchInput, PipelineReport};
use schema::{BatchMode, InputRecord};
use scorer::scorer_from_env;

fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for JSON artifacts.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Score(args) => cmd_score(args),
        Command::Pipeline(args) => cmd_pipeline(args),
        Command::Outreach(args) => cmd_outreach(args),
    }
}

fn cmd_score(args: ScoreArgs) -> Result<()> {
    let mode = BatchMode::from_tag(&args.mode).ok_or_else(|| {
        anyhow!(
            "unknown mode {:?} (expected fail_fast or partial)",
            args.mode
        )
    })?;
    let records: Vec<InputRecord> = read_json_input(args.input.as_deref())?;
    let rules = match &args.rules {
        Some(path) => read_json_file(path)?,
        None => CandidateRules::default(),
    };
    let scorer = scorer_from_env()?;
    let envelope = batch::score_batch(
        &records,
        mode,
        &rules,
        &DecisionPolicy::default(),
        &BatchLimits::default(),
        scorer.as_ref(),
    );
    write_json_output(args.out.as_deref(), &envelope)
}

fn cmd_pipeline(args: PipelineArgs) -> Result<()> {
    let config: RunConfig = read_json_file(&args.config)?;
    let envelope: Value = read_json_file(&args.batch)?;
    let stack = CapabilityStack::from_env(config.dry_run)?;
    let report = match BatchInput::from_value(&envelope) {
        Ok(batch) => run_pipeline(&batch, &config, &stack.capabilities()),
        Err(error) => PipelineReport::rejected(vec![error]),
    };
    write_json_output(args.out.as_deref(), &report)
}

fn cmd_outreach(args: OutreachArgs) -> Result<()> {
    let request: Value = read_json_input(args.input.as_deref())?;
    let dry_run = peek_dry_run(&request);
    let stack = CapabilityStack::from_env(dry_run)?;
    let scorer = scorer_from_env()?;
    let response = contract::handle_request(
        &request,
        scorer.as_ref(),
        &stack.capabilities(),
        &DecisionPolicy::default(),
        &BatchLimits::default(),
    );
    write_json_output(args.out.as_deref(), &response)
}

/// Delivery wiring must be decided before the contract layer parses the
/// request, so the mode is read off the raw value. Absent means dry run.
fn peek_dry_run(request: &Value) -> bool {
    request
        .get("outreach_options")
        .and_then(|options| options.get("dry_run"))
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// Capability set resolved once per process from the environment.
struct CapabilityStack {
    serious: Box<dyn DraftWriter>,
    witty: Box<dyn DraftWriter>,
    concise: Box<dyn DraftWriter>,
    picker: Box<dyn Picker>,
    formatter: DeterministicFormatter,
    delivery: Box<dyn Delivery>,
}

impl CapabilityStack {
    fn from_env(dry_run: bool) -> Result<Self> {
        let delivery: Box<dyn Delivery> = if dry_run {
            Box::new(DisabledDelivery)
        } else {
            Box::new(SendgridDelivery::from_env()?)
        };
        Ok(CapabilityStack {
            serious: writer_from_env(Tone::Serious)?,
            witty: writer_from_env(Tone::Witty)?,
            concise: writer_from_env(Tone::Concise)?,
            picker: picker_from_env()?,
            formatter: DeterministicFormatter,
            delivery,
        })
    }

    fn capabilities(&self) -> OutreachCapabilities<'_> {
        OutreachCapabilities {
            serious_writer: self.serious.as_ref(),
            witty_writer: self.witty.as_ref(),
            concise_writer: self.concise.as_ref(),
            picker: self.picker.as_ref(),
            formatter: &self.formatter,
            delivery: self.delivery.as_ref(),
        }
    }
}

fn read_json_input<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => read_json_file(path),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("read stdin")?;
            serde_json::from_str(&buffer).context("parse stdin as JSON")
        }
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
}

fn write_json_output<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value).context("serialize output JSON")?;
    bytes.push(b'\n');
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
            }
            std::fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))
        }
        None => {
            std::io::stdout().write_all(&bytes).context("write stdout")?;
            Ok(())
        }
    }
}
