//! Prediction batch service: validate, score once, merge, summarize.

use crate::config::{BatchLimits, CandidateRules, DecisionPolicy};
use crate::decision::{estimate_lifetime_value, expected_net_gain, recommended_action};
use crate::schema::{
    BatchEnvelope, BatchMode, BatchStatus, BatchSummary, EmailCandidate, InputRecord, ModelInfo,
    PredictionResult, RecommendedAction, Stage, StageError, ValidatedRow, BATCH_SCHEMA_VERSION,
};
use crate::scorer::{Scorer, ScorerOutput};
use crate::validate::{check_batch_shape, validate_batch};
use chrono::Utc;

/// Score a batch of records end to end and assemble the envelope.
///
/// The scorer runs at most once, over exactly the valid rows; a batch with no
/// valid rows never invokes it. Failures land in the envelope rather than
/// propagating, so every call yields a well-formed artifact.
pub fn score_batch(
    records: &[InputRecord],
    mode: BatchMode,
    rules: &CandidateRules,
    policy: &DecisionPolicy,
    limits: &BatchLimits,
    scorer: &dyn Scorer,
) -> BatchEnvelope {
    if let Some(error) = check_batch_shape(records, limits) {
        return envelope(
            BatchStatus::Error,
            Vec::new(),
            Vec::new(),
            vec![error],
            records.len(),
            0,
            mode,
            scorer.describe(),
        );
    }

    let validated = validate_batch(records, mode);
    let total = records.len();
    let valid = validated.rows.len();

    if mode == BatchMode::FailFast && !validated.errors.is_empty() {
        return envelope(
            BatchStatus::Error,
            Vec::new(),
            Vec::new(),
            validated.errors,
            total,
            valid,
            mode,
            scorer.describe(),
        );
    }
    if validated.rows.is_empty() {
        return envelope(
            BatchStatus::Failed,
            Vec::new(),
            Vec::new(),
            validated.errors,
            total,
            0,
            mode,
            scorer.describe(),
        );
    }

    let features: Vec<_> = validated.rows.iter().map(|row| row.features.clone()).collect();
    let mut errors = validated.errors;
    let output = match scorer.predict(&features) {
        Ok(output) => output,
        Err(err) => {
            errors.push(StageError::new(Stage::Scorer, format!("{err:#}")));
            return envelope(
                BatchStatus::Error,
                Vec::new(),
                Vec::new(),
                errors,
                total,
                valid,
                mode,
                scorer.describe(),
            );
        }
    };

    let results = merge_results(&validated.rows, &output, policy);
    let email_candidates = shortlist(&results, rules);
    let status = if errors.is_empty() {
        BatchStatus::Success
    } else {
        BatchStatus::Partial
    };
    let metadata = output.model.unwrap_or_else(|| scorer.describe());
    tracing::info!(
        total,
        valid,
        candidates = email_candidates.len(),
        status = %status,
        "batch scored"
    );
    envelope(status, results, email_candidates, errors, total, valid, mode, metadata)
}

#[allow(clippy::too_many_arguments)]
fn envelope(
    status: BatchStatus,
    results: Vec<PredictionResult>,
    email_candidates: Vec<EmailCandidate>,
    errors: Vec<StageError>,
    total: usize,
    valid: usize,
    mode: BatchMode,
    metadata: ModelInfo,
) -> BatchEnvelope {
    let error_count = errors.len();
    BatchEnvelope {
        schema_version: BATCH_SCHEMA_VERSION,
        status,
        results,
        email_candidates,
        errors,
        summary: BatchSummary {
            total_records: total,
            valid_records: valid,
            invalid_records: total.saturating_sub(valid),
            error_count,
            mode,
        },
        metadata,
        timestamp: Utc::now(),
    }
}

/// Join scorer output with decision-engine outputs, row by row.
///
/// A row with no probability gets no action and no net gain, but keeps its
/// lifetime value.
fn merge_results(
    rows: &[ValidatedRow],
    output: &ScorerOutput,
    policy: &DecisionPolicy,
) -> Vec<PredictionResult> {
    rows.iter()
        .enumerate()
        .map(|(position, row)| {
            let p_churn = output
                .probabilities
                .get(position)
                .copied()
                .flatten()
                .filter(|p| p.is_finite());
            let clv = estimate_lifetime_value(
                row.features.balance,
                row.features.tenure,
                row.features.estimated_salary,
            );
            let (action, net_gain) = match p_churn {
                Some(p) => {
                    let action = recommended_action(p, policy);
                    let cost = policy.action_costs.for_action(action);
                    (Some(action), Some(expected_net_gain(p, clv, cost)))
                }
                None => (None, None),
            };
            PredictionResult {
                index: row.index,
                id: row.id.clone(),
                predicted_label: output.labels.get(position).copied().unwrap_or_default(),
                p_churn,
                clv,
                recommended_action: action,
                net_gain,
            }
        })
        .collect()
}

/// Apply candidate rules to scored rows, preserving row order.
fn shortlist(results: &[PredictionResult], rules: &CandidateRules) -> Vec<EmailCandidate> {
    let mut candidates = Vec::new();
    for result in results {
        let (Some(p_churn), Some(action), Some(net_gain)) =
            (result.p_churn, result.recommended_action, result.net_gain)
        else {
            continue;
        };
        if rules.exclude_no_action && action == RecommendedAction::None {
            continue;
        }
        if let Some(min_p) = rules.min_p_churn {
            if p_churn < min_p {
                continue;
            }
        }
        if net_gain < rules.min_net_gain {
            continue;
        }
        if let Some(allowed) = &rules.allowed_actions {
            if !allowed.contains(&action) {
                continue;
            }
        }
        candidates.push(EmailCandidate {
            index: result.index,
            id: result.id.clone(),
            p_churn,
            recommended_action: action,
            net_gain,
        });
    }
    if let Some(cap) = rules.max_candidates {
        candidates.truncate(cap);
    }
    candidates
}
