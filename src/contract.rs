//! Versioned request/response surface for the combined score-and-outreach
//! operation.
//!
//! The contract is deliberately strict at the edge: an unknown version, an
//! empty record list, or out-of-range options are rejected before any
//! capability runs. Everything past admission reuses the batch scorer and
//! the pipeline unchanged.

use crate::batch::score_batch;
use crate::config::{BatchLimits, CandidateRules, DecisionPolicy, RunConfig};
use crate::outreach::manager::OutreachCapabilities;
use crate::outreach::SendRecord;
use crate::pipeline::{run_pipeline, BatchInput, PipelineReport};
use crate::schema::{BatchMode, BatchStatus, InputRecord, ReportStatus, Stage, StageError};
use crate::scorer::Scorer;
use crate::select::CandidateRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONTRACT_VERSION: &str = "v1";

/// Inbound contract request.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutreachApiRequest {
    #[serde(default)]
    pub contract_version: String,
    #[serde(default)]
    pub records: Vec<InputRecord>,
    #[serde(default)]
    pub outreach_options: OutreachOptions,
    #[serde(default)]
    pub context: RequestContext,
}

/// Selection and delivery knobs carried on the request.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutreachOptions {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_emails")]
    pub max_emails: i64,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default = "default_tone")]
    pub tone: String,
}

fn default_threshold() -> f64 {
    crate::config::DEFAULT_SELECTION_THRESHOLD
}

fn default_max_emails() -> i64 {
    crate::config::DEFAULT_MAX_TARGETS
}

fn default_dry_run() -> bool {
    true
}

fn default_tone() -> String {
    crate::config::DEFAULT_TONE_POLICY.to_string()
}

impl Default for OutreachOptions {
    fn default() -> Self {
        OutreachOptions {
            threshold: default_threshold(),
            max_emails: default_max_emails(),
            dry_run: default_dry_run(),
            tone: default_tone(),
        }
    }
}

/// Sender identity carried on the request.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RequestContext {
    #[serde(default = "default_company_name")]
    pub company_name: String,
    #[serde(default = "default_request_from_name")]
    pub from_name: String,
    #[serde(default = "default_request_from_email")]
    pub from_email: String,
}

fn default_company_name() -> String {
    "Acme Corp".to_string()
}

fn default_request_from_name() -> String {
    "Retention Team".to_string()
}

fn default_request_from_email() -> String {
    crate::config::DEFAULT_FROM_EMAIL.to_string()
}

impl Default for RequestContext {
    fn default() -> Self {
        RequestContext {
            company_name: default_company_name(),
            from_name: default_request_from_name(),
            from_email: default_request_from_email(),
        }
    }
}

/// Counts echoed back with every contract response.
#[derive(Debug, Serialize)]
pub struct ContractSummary {
    pub n_records: usize,
    pub n_valid: usize,
    pub n_invalid: usize,
    pub n_selected: usize,
    pub threshold: f64,
    pub max_emails: i64,
    pub dry_run: bool,
}

/// Draft attached to each selected entry.
#[derive(Debug, Serialize, Clone)]
pub struct DraftBlock {
    pub subject: String,
    pub body_text: String,
}

/// One selected customer in the response.
#[derive(Debug, Serialize)]
pub struct SelectedEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_churn: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftBlock>,
}

/// Send outcome block; zeroed when the send stage never ran.
#[derive(Debug, Default, Serialize)]
pub struct SendBlock {
    pub attempted: bool,
    pub sent: usize,
    pub results: Vec<SendRecord>,
}

/// Outbound contract response. `errors` is always present, empty or not, so
/// callers can key on it without probing.
#[derive(Debug, Serialize)]
pub struct OutreachApiResponse {
    pub contract_version: String,
    pub status: ReportStatus,
    pub summary: ContractSummary,
    pub selected: Vec<SelectedEntry>,
    pub send: SendBlock,
    pub errors: Vec<StageError>,
    pub timestamp: DateTime<Utc>,
}

/// Score the request's records and run retention outreach over the result.
///
/// Admission failures reject the whole request with zero capability
/// invocations. Downstream failures degrade per the pipeline's rules.
pub fn handle_request(
    request: &Value,
    scorer: &dyn Scorer,
    capabilities: &OutreachCapabilities<'_>,
    policy: &DecisionPolicy,
    limits: &BatchLimits,
) -> OutreachApiResponse {
    let request: OutreachApiRequest = match serde_json::from_value(request.clone()) {
        Ok(request) => request,
        Err(err) => {
            return rejection(
                0,
                &OutreachOptions::default(),
                vec![StageError::new(
                    Stage::Contract,
                    format!("malformed request: {err}"),
                )],
            );
        }
    };

    let options = request.outreach_options.clone();
    let mut admission = Vec::new();
    if request.contract_version != CONTRACT_VERSION {
        admission.push(StageError::new(
            Stage::Contract,
            format!(
                "unsupported contract version {:?} (expected {CONTRACT_VERSION:?})",
                request.contract_version
            ),
        ));
    }
    if request.records.is_empty() {
        admission.push(StageError::new(Stage::Schema, "request contains no records"));
    } else if request.records.len() > limits.max_records {
        admission.push(StageError::new(
            Stage::Schema,
            format!(
                "batch size {} exceeds the configured maximum of {}",
                request.records.len(),
                limits.max_records
            ),
        ));
    }
    if !(0.0..=1.0).contains(&options.threshold) {
        admission.push(StageError::new(
            Stage::Contract,
            format!("threshold {} must lie in [0, 1]", options.threshold),
        ));
    }
    if options.max_emails <= 0 {
        admission.push(StageError::new(
            Stage::Contract,
            "max_emails must be positive",
        ));
    }
    if !admission.is_empty() {
        return rejection(request.records.len(), &options, admission);
    }

    let envelope = score_batch(
        &request.records,
        BatchMode::Partial,
        &CandidateRules::default(),
        policy,
        limits,
        scorer,
    );
    if envelope.status == BatchStatus::Error {
        return OutreachApiResponse {
            contract_version: CONTRACT_VERSION.to_string(),
            status: ReportStatus::Error,
            summary: ContractSummary {
                n_records: envelope.summary.total_records,
                n_valid: envelope.summary.valid_records,
                n_invalid: envelope.summary.invalid_records,
                n_selected: 0,
                threshold: options.threshold,
                max_emails: options.max_emails,
                dry_run: options.dry_run,
            },
            selected: Vec::new(),
            send: SendBlock::default(),
            errors: envelope.errors,
            timestamp: Utc::now(),
        };
    }

    let rows = candidate_rows(&envelope, &request.records);
    let batch = BatchInput {
        status: envelope.status,
        rows,
        error_count: envelope.errors.len(),
    };
    let config = RunConfig {
        company_name: request.context.company_name.clone(),
        from_name: request.context.from_name.clone(),
        from_email: request.context.from_email.clone(),
        threshold: options.threshold,
        max_targets: options.max_emails,
        require_email: true,
        dry_run: options.dry_run,
        tone_policy: options.tone.clone(),
        allowed_actions: None,
        prompt_template: None,
    };
    let report = run_pipeline(&batch, &config, capabilities);
    response_from_report(report, &options, &envelope.summary, envelope.errors)
}

/// Join scored results back to the raw records they came from, carrying the
/// contact fields the scorer does not look at.
fn candidate_rows(
    envelope: &crate::schema::BatchEnvelope,
    records: &[InputRecord],
) -> Vec<CandidateRow> {
    envelope
        .results
        .iter()
        .map(|result| {
            let record = records.get(result.index);
            let text_of = |key: &str| {
                record
                    .and_then(|r| r.get(key))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            CandidateRow {
                index: result.index,
                id: result.id.clone(),
                p_churn: result.p_churn,
                recommended_action: result.recommended_action,
                email: text_of("email"),
                name: text_of("name"),
                metadata: None,
            }
        })
        .collect()
}

fn response_from_report(
    report: PipelineReport,
    options: &OutreachOptions,
    batch_summary: &crate::schema::BatchSummary,
    batch_errors: Vec<StageError>,
) -> OutreachApiResponse {
    let draft = report.outreach_result.as_ref().and_then(|result| {
        match (&result.subject, &result.body_text) {
            (Some(subject), Some(body_text)) => Some(DraftBlock {
                subject: subject.clone(),
                body_text: body_text.clone(),
            }),
            _ => None,
        }
    });
    let selected: Vec<SelectedEntry> = report
        .selected_targets
        .iter()
        .map(|target| SelectedEntry {
            id: target.id.clone(),
            index: target.index(),
            email: target.email.clone(),
            p_churn: target.p_churn(),
            draft: draft.clone(),
        })
        .collect();
    let send = match &report.outreach_result {
        Some(result) if result.send.attempted => SendBlock {
            attempted: true,
            sent: result.send.sent,
            results: result.send.results.clone(),
        },
        _ => SendBlock::default(),
    };
    let mut errors = batch_errors;
    errors.extend(report.errors);
    OutreachApiResponse {
        contract_version: CONTRACT_VERSION.to_string(),
        status: report.status,
        summary: ContractSummary {
            n_records: batch_summary.total_records,
            n_valid: batch_summary.valid_records,
            n_invalid: batch_summary.invalid_records,
            n_selected: report.selected_targets.len(),
            threshold: options.threshold,
            max_emails: options.max_emails,
            dry_run: options.dry_run,
        },
        selected,
        send,
        errors,
        timestamp: Utc::now(),
    }
}

fn rejection(
    n_records: usize,
    options: &OutreachOptions,
    errors: Vec<StageError>,
) -> OutreachApiResponse {
    OutreachApiResponse {
        contract_version: CONTRACT_VERSION.to_string(),
        status: ReportStatus::Error,
        summary: ContractSummary {
            n_records,
            n_valid: 0,
            n_invalid: 0,
            n_selected: 0,
            threshold: options.threshold,
            max_emails: options.max_emails,
            dry_run: options.dry_run,
        },
        selected: Vec::new(),
        send: SendBlock::default(),
        errors,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outreach::delivery::RecordingDelivery;
    use crate::outreach::format::DeterministicFormatter;
    use crate::outreach::picker::FirstDraftPicker;
    use crate::outreach::writers::BuiltinWriter;
    use crate::outreach::Tone;
    use crate::schema::{CustomerFeatures, ModelInfo};
    use crate::scorer::{Scorer, ScorerOutput};
    use anyhow::Result;
    use serde_json::json;
    use std::cell::Cell;

    struct CountingScorer {
        calls: Cell<usize>,
    }

    impl Scorer for CountingScorer {
        fn describe(&self) -> ModelInfo {
            ModelInfo {
                model_name: "counting".to_string(),
                model_version: "test".to_string(),
            }
        }

        fn predict(&self, rows: &[CustomerFeatures]) -> Result<ScorerOutput> {
            self.calls.set(self.calls.get() + 1);
            Ok(ScorerOutput {
                labels: vec![1; rows.len()],
                probabilities: vec![Some(0.9); rows.len()],
                model: None,
            })
        }
    }

    struct Caps {
        serious: BuiltinWriter,
        witty: BuiltinWriter,
        concise: BuiltinWriter,
        picker: FirstDraftPicker,
        formatter: DeterministicFormatter,
        delivery: RecordingDelivery,
    }

    impl Caps {
        fn new() -> Self {
            Caps {
                serious: BuiltinWriter { tone: Tone::Serious },
                witty: BuiltinWriter { tone: Tone::Witty },
                concise: BuiltinWriter { tone: Tone::Concise },
                picker: FirstDraftPicker,
                formatter: DeterministicFormatter,
                delivery: RecordingDelivery::default(),
            }
        }

        fn capabilities(&self) -> OutreachCapabilities<'_> {
            OutreachCapabilities {
                serious_writer: &self.serious,
                witty_writer: &self.witty,
                concise_writer: &self.concise,
                picker: &self.picker,
                formatter: &self.formatter,
                delivery: &self.delivery,
            }
        }
    }

    fn record(id: &str, email: &str) -> Value {
        json!({
            "customer_id": id,
            "email": email,
            "CreditScore": 600.0,
            "Geography": "France",
            "Gender": "Female",
            "Age": 44.0,
            "Tenure": 3.0,
            "Balance": 50000.0,
            "NumOfProducts": 2.0,
            "HasCrCard": 1.0,
            "IsActiveMember": 0.0,
            "EstimatedSalary": 90000.0,
        })
    }

    fn handle(request: &Value, scorer: &CountingScorer, caps: &Caps) -> OutreachApiResponse {
        handle_request(
            request,
            scorer,
            &caps.capabilities(),
            &DecisionPolicy::default(),
            &BatchLimits::default(),
        )
    }

    #[test]
    fn version_mismatch_rejects_without_scoring() {
        let scorer = CountingScorer { calls: Cell::new(0) };
        let caps = Caps::new();
        let request = json!({
            "contract_version": "v2",
            "records": [record("c-1", "c1@example.com")],
        });
        let response = handle(&request, &scorer, &caps);
        assert_eq!(response.status, ReportStatus::Error);
        assert_eq!(scorer.calls.get(), 0);
        assert!(caps.delivery.calls.borrow().is_empty());
        assert!(response.errors.iter().any(|e| e.stage == Stage::Contract
            && e.message == "unsupported contract version \"v2\" (expected \"v1\")"));
        assert_eq!(response.summary.n_records, 1);
        assert_eq!(response.summary.n_selected, 0);
    }

    #[test]
    fn empty_record_list_rejects() {
        let scorer = CountingScorer { calls: Cell::new(0) };
        let caps = Caps::new();
        let request = json!({"contract_version": "v1", "records": []});
        let response = handle(&request, &scorer, &caps);
        assert_eq!(response.status, ReportStatus::Error);
        assert_eq!(scorer.calls.get(), 0);
        assert!(response
            .errors
            .iter()
            .any(|e| e.message == "request contains no records"));
    }

    #[test]
    fn out_of_range_options_reject() {
        let scorer = CountingScorer { calls: Cell::new(0) };
        let caps = Caps::new();
        let request = json!({
            "contract_version": "v1",
            "records": [record("c-1", "c1@example.com")],
            "outreach_options": {"threshold": 1.5, "max_emails": 0},
        });
        let response = handle(&request, &scorer, &caps);
        assert_eq!(response.status, ReportStatus::Error);
        assert_eq!(scorer.calls.get(), 0);
        assert_eq!(response.errors.len(), 2);
        assert!(response
            .errors
            .iter()
            .any(|e| e.message == "threshold 1.5 must lie in [0, 1]"));
        assert!(response
            .errors
            .iter()
            .any(|e| e.message == "max_emails must be positive"));
    }

    #[test]
    fn malformed_request_rejects_with_a_parse_error() {
        let scorer = CountingScorer { calls: Cell::new(0) };
        let caps = Caps::new();
        let request = json!({"contract_version": "v1", "recordz": []});
        let response = handle(&request, &scorer, &caps);
        assert_eq!(response.status, ReportStatus::Error);
        assert_eq!(scorer.calls.get(), 0);
        assert!(response.errors[0].message.starts_with("malformed request:"));
    }

    #[test]
    fn dry_run_scores_selects_and_drafts() {
        let scorer = CountingScorer { calls: Cell::new(0) };
        let caps = Caps::new();
        let request = json!({
            "contract_version": "v1",
            "records": [
                record("c-1", "one@example.com"),
                record("c-2", "two@example.com"),
            ],
            "outreach_options": {"threshold": 0.7, "max_emails": 5, "dry_run": true},
            "context": {"company_name": "Globex", "from_name": "Care", "from_email": "care@globex.example"},
        });
        let response = handle(&request, &scorer, &caps);
        assert_eq!(response.status, ReportStatus::Ok);
        assert_eq!(scorer.calls.get(), 1);
        assert_eq!(response.summary.n_records, 2);
        assert_eq!(response.summary.n_valid, 2);
        assert_eq!(response.summary.n_selected, 2);
        assert!(!response.send.attempted);
        assert!(caps.delivery.calls.borrow().is_empty());
        let entry = &response.selected[0];
        assert_eq!(entry.id, "c-1");
        assert_eq!(entry.email.as_deref(), Some("one@example.com"));
        let draft = entry.draft.as_ref().expect("draft attached");
        assert!(!draft.subject.is_empty());
        assert!(draft.body_text.contains("Globex"));
        assert!(response.errors.is_empty());
    }

    #[test]
    fn invalid_rows_degrade_to_partial() {
        let scorer = CountingScorer { calls: Cell::new(0) };
        let caps = Caps::new();
        let mut broken = record("c-2", "two@example.com");
        broken.as_object_mut().expect("object").remove("Age");
        let request = json!({
            "contract_version": "v1",
            "records": [record("c-1", "one@example.com"), broken],
        });
        let response = handle(&request, &scorer, &caps);
        assert_eq!(response.status, ReportStatus::Partial);
        assert_eq!(response.summary.n_valid, 1);
        assert_eq!(response.summary.n_invalid, 1);
        assert!(response
            .errors
            .iter()
            .any(|e| e.message == "Missing required field: Age"));
    }
}
