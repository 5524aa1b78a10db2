//! Scorer capability seam and its two backends.
//!
//! The batch service treats the classifier as a black box behind [`Scorer`].
//! `CPILOT_SCORER_COMMAND` selects an external command (JSON request on stdin,
//! JSON response on stdout); otherwise a deterministic heuristic stands in so
//! offline runs and tests get stable scores.

use crate::config::{command_from_env, SCORER_COMMAND_ENV};
use crate::exec;
use crate::schema::{CustomerFeatures, ModelInfo};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Labels and probabilities for one scored batch, in row order.
#[derive(Debug, Clone)]
pub struct ScorerOutput {
    pub labels: Vec<i64>,
    pub probabilities: Vec<Option<f64>>,
    pub model: Option<ModelInfo>,
}

/// Black-box churn classifier, invoked at most once per batch.
pub trait Scorer {
    /// Identity reported in envelope metadata when the response names none.
    fn describe(&self) -> ModelInfo;

    /// Score `rows`. Output vectors must match the input length.
    fn predict(&self, rows: &[CustomerFeatures]) -> Result<ScorerOutput>;
}

/// Select the scorer backend from the environment.
pub fn scorer_from_env() -> Result<Box<dyn Scorer>> {
    match command_from_env(SCORER_COMMAND_ENV)? {
        Some(argv) => Ok(Box::new(CommandScorer::new(argv))),
        None => Ok(Box::new(HeuristicScorer)),
    }
}

/// Fixed-coefficient logistic stand-in for a trained classifier.
///
/// Blends a few strong churn signals: age, inactivity, product count, a zero
/// balance, and credit score.
pub struct HeuristicScorer;

impl Scorer for HeuristicScorer {
    fn describe(&self) -> ModelInfo {
        ModelInfo {
            model_name: "heuristic-logistic".to_string(),
            model_version: "builtin-1".to_string(),
        }
    }

    fn predict(&self, rows: &[CustomerFeatures]) -> Result<ScorerOutput> {
        let mut labels = Vec::with_capacity(rows.len());
        let mut probabilities = Vec::with_capacity(rows.len());
        for row in rows {
            let p_churn = churn_probability(row);
            labels.push(i64::from(p_churn >= 0.5));
            probabilities.push(Some(p_churn));
        }
        Ok(ScorerOutput {
            labels,
            probabilities,
            model: None,
        })
    }
}

fn churn_probability(row: &CustomerFeatures) -> f64 {
    let mut z = -1.5;
    z += 0.045 * (row.age - 40.0);
    z -= 0.9 * row.is_active_member;
    z += 0.35 * (row.num_of_products - 1.0);
    z -= 0.002 * (row.credit_score - 650.0);
    if row.balance <= 0.0 {
        z += 0.25;
    }
    1.0 / (1.0 + (-z).exp())
}

/// Scorer that shells out to a configured command.
pub struct CommandScorer {
    argv: Vec<String>,
}

impl CommandScorer {
    pub fn new(argv: Vec<String>) -> Self {
        CommandScorer { argv }
    }
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    schema_version: u32,
    rows: &'a [CustomerFeatures],
}

#[derive(Deserialize)]
struct ScoreResponse {
    labels: Vec<Value>,
    #[serde(default)]
    probabilities: Option<Vec<Option<f64>>>,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    model_version: Option<String>,
}

impl Scorer for CommandScorer {
    fn describe(&self) -> ModelInfo {
        ModelInfo {
            model_name: "external-command".to_string(),
            model_version: "unversioned".to_string(),
        }
    }

    fn predict(&self, rows: &[CustomerFeatures]) -> Result<ScorerOutput> {
        let request = ScoreRequest {
            schema_version: 1,
            rows,
        };
        let payload = serde_json::to_string(&request).context("serialize scorer request")?;
        let stdout = exec::run_capability("scorer", &self.argv, &payload)?;
        parse_scorer_response(&stdout, rows.len())
    }
}

/// Parse a scorer response, enforcing row-count agreement.
///
/// `probabilities` may be omitted entirely; individual entries may be null.
/// Labels tolerate floats so thin wrappers around numeric stacks work as-is.
fn parse_scorer_response(raw: &str, expected: usize) -> Result<ScorerOutput> {
    let body = exec::extract_json(raw);
    let response: ScoreResponse =
        serde_json::from_str(&body).context("parse scorer response JSON")?;

    if response.labels.len() != expected {
        return Err(anyhow!(
            "scorer returned {} labels for {} rows",
            response.labels.len(),
            expected
        ));
    }
    let labels = response
        .labels
        .iter()
        .map(label_from_value)
        .collect::<Result<Vec<i64>>>()?;

    let probabilities = match response.probabilities {
        Some(probabilities) => {
            if probabilities.len() != expected {
                return Err(anyhow!(
                    "scorer returned {} probabilities for {} rows",
                    probabilities.len(),
                    expected
                ));
            }
            probabilities
                .into_iter()
                .map(|p| p.filter(|value| value.is_finite()))
                .collect()
        }
        None => vec![None; expected],
    };

    let model = match (response.model_name, response.model_version) {
        (Some(model_name), Some(model_version)) => Some(ModelInfo {
            model_name,
            model_version,
        }),
        (Some(model_name), None) => Some(ModelInfo {
            model_name,
            model_version: "unversioned".to_string(),
        }),
        _ => None,
    };

    Ok(ScorerOutput {
        labels,
        probabilities,
        model,
    })
}

fn label_from_value(value: &Value) -> Result<i64> {
    if let Some(label) = value.as_i64() {
        return Ok(label);
    }
    if let Some(label) = value.as_f64() {
        return Ok(i64::from(label != 0.0));
    }
    Err(anyhow!("scorer label is not numeric (got {value})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(age: f64, active: f64) -> CustomerFeatures {
        CustomerFeatures {
            credit_score: 650.0,
            geography: "France".to_string(),
            gender: "Female".to_string(),
            age,
            tenure: 5.0,
            balance: 10_000.0,
            num_of_products: 1.0,
            has_cr_card: 1.0,
            is_active_member: active,
            estimated_salary: 50_000.0,
        }
    }

    #[test]
    fn heuristic_orders_risk_sensibly() {
        let scorer = HeuristicScorer;
        let rows = vec![features(70.0, 0.0), features(25.0, 1.0)];
        let output = scorer.predict(&rows).expect("predict");
        assert_eq!(output.labels.len(), 2);
        let older = output.probabilities[0].expect("probability");
        let younger = output.probabilities[1].expect("probability");
        assert!(older > younger);
        assert!((0.0..=1.0).contains(&older));
        assert!((0.0..=1.0).contains(&younger));
    }

    #[test]
    fn heuristic_labels_follow_the_half_point() {
        let scorer = HeuristicScorer;
        let output = scorer
            .predict(&[features(80.0, 0.0), features(30.0, 1.0)])
            .expect("predict");
        assert_eq!(output.labels, vec![1, 0]);
    }

    #[test]
    fn parses_a_complete_response() {
        let raw = r#"{"labels": [0, 1], "probabilities": [0.25, 0.75],
                      "model_name": "rf", "model_version": "3"}"#;
        let output = parse_scorer_response(raw, 2).expect("parse");
        assert_eq!(output.labels, vec![0, 1]);
        assert_eq!(output.probabilities, vec![Some(0.25), Some(0.75)]);
        assert_eq!(
            output.model,
            Some(ModelInfo {
                model_name: "rf".to_string(),
                model_version: "3".to_string(),
            })
        );
    }

    #[test]
    fn missing_probabilities_become_nulls() {
        let output = parse_scorer_response(r#"{"labels": [1, 0, 1]}"#, 3).expect("parse");
        assert_eq!(output.probabilities, vec![None, None, None]);
        assert_eq!(output.model, None);
    }

    #[test]
    fn null_probability_entries_survive() {
        let raw = r#"{"labels": [1, 0], "probabilities": [null, 0.4]}"#;
        let output = parse_scorer_response(raw, 2).expect("parse");
        assert_eq!(output.probabilities, vec![None, Some(0.4)]);
    }

    #[test]
    fn float_labels_collapse_to_binary() {
        let output = parse_scorer_response(r#"{"labels": [1.0, 0.0]}"#, 2).expect("parse");
        assert_eq!(output.labels, vec![1, 0]);
    }

    #[test]
    fn length_mismatches_are_rejected() {
        assert!(parse_scorer_response(r#"{"labels": [1]}"#, 2).is_err());
        let raw = r#"{"labels": [1, 0], "probabilities": [0.5]}"#;
        assert!(parse_scorer_response(raw, 2).is_err());
    }

    #[test]
    fn fenced_responses_parse() {
        let raw = "```json\n{\"labels\": [1]}\n```";
        let output = parse_scorer_response(raw, 1).expect("parse");
        assert_eq!(output.labels, vec![1]);
    }

    #[test]
    fn non_numeric_label_is_rejected() {
        assert!(parse_scorer_response(r#"{"labels": ["yes"]}"#, 1).is_err());
    }
}
