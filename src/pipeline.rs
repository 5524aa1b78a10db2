//! End-to-end orchestration from a scored batch to an outreach outcome.

use crate::config::RunConfig;
use crate::outreach::manager::{run_outreach, OutreachCapabilities};
use crate::outreach::{OutreachRequest, OutreachResult, SendMode, Target};
use crate::payload::{render_prompt, resolve_recipients, DEFAULT_PROMPT_TEMPLATE};
use crate::schema::{BatchStatus, ReportStatus, Stage, StageError, REPORT_SCHEMA_VERSION};
use crate::select::{select_targets, CandidateRow};
use serde::Serialize;
use serde_json::Value;

/// Scored rows lifted out of a batch envelope, however it was produced.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub status: BatchStatus,
    pub rows: Vec<CandidateRow>,
    pub error_count: usize,
}

impl BatchInput {
    /// Admit an untrusted batch envelope. Row-level fields are read
    /// leniently, but the envelope shape and status tag must be well formed.
    pub fn from_value(value: &Value) -> Result<Self, StageError> {
        let Some(envelope) = value.as_object() else {
            return Err(StageError::new(
                Stage::Contract,
                "batch envelope must be a JSON object",
            ));
        };
        let tag = envelope.get("status").and_then(Value::as_str);
        let Some(tag) = tag else {
            return Err(StageError::new(
                Stage::Contract,
                "batch envelope is missing a status",
            ));
        };
        let Some(status) = BatchStatus::from_tag(tag) else {
            return Err(StageError::new(
                Stage::Contract,
                format!("unrecognized batch status {tag:?}"),
            ));
        };
        let rows = match envelope.get("results") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(results)) => results
                .iter()
                .enumerate()
                .map(|(position, row)| CandidateRow::from_value(position, row))
                .collect(),
            Some(_) => {
                return Err(StageError::new(
                    Stage::Contract,
                    "batch envelope results must be a list",
                ));
            }
        };
        let error_count = match envelope.get("errors") {
            Some(Value::Array(errors)) => errors.len(),
            _ => envelope
                .get("summary")
                .and_then(|summary| summary.get("error_count"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
        };
        Ok(BatchInput {
            status,
            rows,
            error_count,
        })
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PipelineSummary {
    pub total_rows: usize,
    pub valid_predictions: usize,
    pub selected: usize,
    pub drafted: usize,
    pub sent: usize,
}

/// Full account of one pipeline run: who was selected, what was drafted,
/// and what happened on send, plus every diagnostic raised along the way.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub schema_version: u32,
    pub status: ReportStatus,
    pub selected_targets: Vec<Target>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outreach_request: Option<OutreachRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outreach_result: Option<OutreachResult>,
    pub summary: PipelineSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StageError>,
}

impl PipelineReport {
    /// Report for a run refused before any stage could start.
    pub fn rejected(errors: Vec<StageError>) -> Self {
        PipelineReport {
            schema_version: REPORT_SCHEMA_VERSION,
            status: ReportStatus::Error,
            selected_targets: Vec::new(),
            outreach_request: None,
            outreach_result: None,
            summary: PipelineSummary::default(),
            errors,
        }
    }
}

/// Run selection, prompt rendering, and outreach over an already scored
/// batch. Never panics on malformed rows; every failure is a report entry.
pub fn run_pipeline(
    batch: &BatchInput,
    config: &RunConfig,
    capabilities: &OutreachCapabilities<'_>,
) -> PipelineReport {
    let config_errors = config.validate();
    if !config_errors.is_empty() {
        return PipelineReport::rejected(config_errors);
    }

    let mut errors: Vec<StageError> = Vec::new();
    let total_rows = batch.rows.len();
    let mut eligible: Vec<CandidateRow> = batch
        .rows
        .iter()
        .filter(|row| row.is_usable())
        .cloned()
        .collect();
    let valid_predictions = eligible.len();
    if let Some(allowed) = &config.allowed_actions {
        eligible.retain(|row| row.recommended_action.is_some_and(|a| allowed.contains(&a)));
    }

    let selected_targets = select_targets(
        &eligible,
        config.threshold,
        config.max_targets,
        config.require_email,
    );
    tracing::info!(
        eligible = eligible.len(),
        selected = selected_targets.len(),
        threshold = config.threshold,
        "target selection complete"
    );

    if selected_targets.is_empty() {
        let status = derive_status(batch.error_count, &errors, 0);
        return PipelineReport {
            schema_version: REPORT_SCHEMA_VERSION,
            status,
            selected_targets,
            outreach_request: None,
            outreach_result: None,
            summary: PipelineSummary {
                total_rows,
                valid_predictions,
                selected: 0,
                drafted: 0,
                sent: 0,
            },
            errors,
        };
    }

    let selected = selected_targets.len();
    let (recipients, dropped) = resolve_recipients(&selected_targets);
    errors.extend(dropped);
    if recipients.is_empty() {
        errors.push(StageError::new(
            Stage::Payload,
            "no selected target has a deliverable email address",
        ));
        let status = derive_status(batch.error_count, &errors, selected);
        return PipelineReport {
            schema_version: REPORT_SCHEMA_VERSION,
            status,
            selected_targets,
            outreach_request: None,
            outreach_result: None,
            summary: PipelineSummary {
                total_rows,
                valid_predictions,
                selected,
                drafted: 0,
                sent: 0,
            },
            errors,
        };
    }

    let template = config
        .prompt_template
        .as_deref()
        .unwrap_or(DEFAULT_PROMPT_TEMPLATE);
    let prompt = match render_prompt(template, &config.from_name, &config.company_name, &recipients)
    {
        Ok(prompt) => prompt,
        Err(err) => {
            errors.push(StageError::new(Stage::Payload, format!("{err:#}")));
            let status = derive_status(batch.error_count, &errors, selected);
            return PipelineReport {
                schema_version: REPORT_SCHEMA_VERSION,
                status,
                selected_targets,
                outreach_request: None,
                outreach_result: None,
                summary: PipelineSummary {
                    total_rows,
                    valid_predictions,
                    selected,
                    drafted: 0,
                    sent: 0,
                },
                errors,
            };
        }
    };

    let send_mode = if config.dry_run {
        SendMode::DryRun
    } else {
        SendMode::Send
    };
    let request = match OutreachRequest::new(
        prompt,
        recipients,
        config.from_name.clone(),
        config.from_email.clone(),
        config.company_name.clone(),
        config.tone_policy.clone(),
        send_mode,
    ) {
        Ok(request) => request,
        Err(err) => {
            errors.push(StageError::new(Stage::Payload, format!("{err:#}")));
            let status = derive_status(batch.error_count, &errors, selected);
            return PipelineReport {
                schema_version: REPORT_SCHEMA_VERSION,
                status,
                selected_targets,
                outreach_request: None,
                outreach_result: None,
                summary: PipelineSummary {
                    total_rows,
                    valid_predictions,
                    selected,
                    drafted: 0,
                    sent: 0,
                },
                errors,
            };
        }
    };

    let result = run_outreach(&request, capabilities);
    let drafted = if result.drafts.is_some() { 3 } else { 0 };
    let sent = match send_mode {
        SendMode::Send => result.send.sent,
        SendMode::DryRun => 0,
    };
    errors.extend(result.errors.iter().cloned());
    let status = derive_status(batch.error_count, &errors, selected);
    tracing::info!(
        status = %status,
        selected,
        drafted,
        sent,
        "outreach pipeline complete"
    );
    PipelineReport {
        schema_version: REPORT_SCHEMA_VERSION,
        status,
        selected_targets,
        outreach_request: Some(request),
        outreach_result: Some(result),
        summary: PipelineSummary {
            total_rows,
            valid_predictions,
            selected,
            drafted,
            sent,
        },
        errors,
    }
}

// Degraded-but-useful runs stay partial; a run with diagnostics and nothing
// selected has produced no value and reports as an error.
fn derive_status(
    batch_error_count: usize,
    pipeline_errors: &[StageError],
    selected: usize,
) -> ReportStatus {
    if !pipeline_errors.is_empty() {
        if selected > 0 {
            ReportStatus::Partial
        } else {
            ReportStatus::Error
        }
    } else if batch_error_count > 0 {
        ReportStatus::Partial
    } else {
        ReportStatus::Ok
    }
}
