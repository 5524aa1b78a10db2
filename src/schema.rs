//! Shared JSON schema types for batch scoring and outreach reporting.
//!
//! These types define the wire shapes every stage emits, so batch envelopes
//! and pipeline reports stay stable for downstream consumers.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Schema version stamped on batch envelopes.
pub const BATCH_SCHEMA_VERSION: u32 = 1;
/// Schema version stamped on pipeline reports.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Untyped input record as supplied by callers.
pub type InputRecord = Map<String, Value>;

/// Validation mode for a batch of records.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    FailFast,
    Partial,
}

impl BatchMode {
    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::FailFast => "fail_fast",
            BatchMode::Partial => "partial",
        }
    }

    /// Parse the stable string identifier.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "fail_fast" => Some(BatchMode::FailFast),
            "partial" => Some(BatchMode::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a scored batch.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
    Error,
}

impl BatchStatus {
    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Success => "success",
            BatchStatus::Partial => "partial",
            BatchStatus::Failed => "failed",
            BatchStatus::Error => "error",
        }
    }

    /// Parse the stable string identifier.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "success" => Some(BatchStatus::Success),
            "partial" => Some(BatchStatus::Partial),
            "failed" => Some(BatchStatus::Failed),
            "error" => Some(BatchStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a pipeline report.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    Partial,
    Error,
}

impl ReportStatus {
    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Ok => "ok",
            ReportStatus::Partial => "partial",
            ReportStatus::Error => "error",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retention action recommended for a scored row.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    None,
    Email,
    DiscountCall,
}

impl RecommendedAction {
    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::None => "none",
            RecommendedAction::Email => "email",
            RecommendedAction::DiscountCall => "discount_call",
        }
    }

    /// Parse the stable string identifier.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "none" => Some(RecommendedAction::None),
            "email" => Some(RecommendedAction::Email),
            "discount_call" => Some(RecommendedAction::DiscountCall),
            _ => None,
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage a structured error is attributed to.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schema,
    Validation,
    Config,
    Contract,
    Scorer,
    Selection,
    Payload,
    Writer,
    Picker,
    Formatter,
    Send,
    Internal,
}

impl Stage {
    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Schema => "schema",
            Stage::Validation => "validation",
            Stage::Config => "config",
            Stage::Contract => "contract",
            Stage::Scorer => "scorer",
            Stage::Selection => "selection",
            Stage::Payload => "payload",
            Stage::Writer => "writer",
            Stage::Picker => "picker",
            Stage::Formatter => "formatter",
            Stage::Send => "send",
            Stage::Internal => "internal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried in envelopes and reports.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl StageError {
    /// Error attributed to `stage` with no row attached.
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        StageError {
            stage,
            message: message.into(),
            index: None,
            id: None,
            field: None,
            target_id: None,
        }
    }

    /// Per-row validation error for one offending field.
    pub fn for_row(
        index: usize,
        id: Option<String>,
        field: &str,
        message: impl Into<String>,
    ) -> Self {
        StageError {
            stage: Stage::Validation,
            message: message.into(),
            index: Some(index),
            id,
            field: Some(field.to_string()),
            target_id: None,
        }
    }
}

/// Typed feature vector fed to the scorer, with the dataset's column names.
///
/// Identifiers and contact fields never appear here, so the scorer cannot see
/// them by construction.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerFeatures {
    pub credit_score: f64,
    pub geography: String,
    pub gender: String,
    pub age: f64,
    pub tenure: f64,
    pub balance: f64,
    pub num_of_products: f64,
    pub has_cr_card: f64,
    pub is_active_member: f64,
    pub estimated_salary: f64,
}

/// A record that passed validation, with passthrough fields preserved.
#[derive(Debug, Clone)]
pub struct ValidatedRow {
    pub index: usize,
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub features: CustomerFeatures,
}

/// One scored row merged with its decision-engine outputs.
///
/// `p_churn` stays an explicit null when the scorer yields no probability; the
/// action and net gain follow it, while `clv` is always present.
#[derive(Debug, Serialize, Clone)]
pub struct PredictionResult {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub predicted_label: i64,
    pub p_churn: Option<f64>,
    pub clv: f64,
    pub recommended_action: Option<RecommendedAction>,
    pub net_gain: Option<f64>,
}

/// Shortlisted row that qualifies for outreach under candidate rules.
#[derive(Debug, Serialize, Clone)]
pub struct EmailCandidate {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub p_churn: f64,
    pub recommended_action: RecommendedAction,
    pub net_gain: f64,
}

/// Counts summarizing one scored batch.
#[derive(Debug, Serialize, Clone)]
pub struct BatchSummary {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub error_count: usize,
    pub mode: BatchMode,
}

/// Identity of the scorer that produced a batch.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_version: String,
}

/// Envelope emitted for one scored batch.
#[derive(Debug, Serialize, Clone)]
pub struct BatchEnvelope {
    pub schema_version: u32,
    pub status: BatchStatus,
    pub results: Vec<PredictionResult>,
    pub email_candidates: Vec<EmailCandidate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StageError>,
    pub summary: BatchSummary,
    pub metadata: ModelInfo,
    pub timestamp: DateTime<Utc>,
}

/// Normalize an email to lowercase and validate its basic shape.
pub fn normalize_email(raw: &str) -> Option<String> {
    let candidate = raw.trim().to_lowercase();
    let pattern = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("regex for email shape");
    pattern.is_match(&candidate).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_validates_emails() {
        assert_eq!(
            normalize_email("  Jane.Doe@Example.COM "),
            Some("jane.doe@example.com".to_string())
        );
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email("two@at@signs.com"), None);
        assert_eq!(normalize_email("spaced @example.com"), None);
        assert_eq!(normalize_email("no-dot@example"), None);
    }

    #[test]
    fn status_tags_round_trip() {
        for status in [
            BatchStatus::Success,
            BatchStatus::Partial,
            BatchStatus::Failed,
            BatchStatus::Error,
        ] {
            assert_eq!(BatchStatus::from_tag(status.as_str()), Some(status));
        }
        assert_eq!(BatchStatus::from_tag("unknown"), None);
    }

    #[test]
    fn action_serializes_as_snake_case() {
        let json = serde_json::to_string(&RecommendedAction::DiscountCall).expect("serialize");
        assert_eq!(json, "\"discount_call\"");
    }
}
