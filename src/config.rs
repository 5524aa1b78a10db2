//! Policy and run configuration objects.
//!
//! Every knob is an explicit field with a serde default, so callers can supply
//! sparse JSON and tests can vary policy without process-wide state.

use crate::schema::{normalize_email, RecommendedAction, Stage, StageError};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable selecting an external scorer command.
pub const SCORER_COMMAND_ENV: &str = "CPILOT_SCORER_COMMAND";
/// Environment variable selecting an external draft-writer command.
pub const WRITER_COMMAND_ENV: &str = "CPILOT_WRITER_COMMAND";
/// Environment variable selecting an external draft-picker command.
pub const PICKER_COMMAND_ENV: &str = "CPILOT_PICKER_COMMAND";

/// Sender address used when none is configured.
pub const DEFAULT_FROM_EMAIL: &str = "no-reply@example.com";
/// Tone policy applied when none is configured.
pub const DEFAULT_TONE_POLICY: &str = "friendly-and-direct";
/// Selection threshold applied when none is configured.
pub const DEFAULT_SELECTION_THRESHOLD: f64 = 0.7;
/// Target cap applied when none is configured.
pub const DEFAULT_MAX_TARGETS: i64 = 50;

fn default_email_threshold() -> f64 {
    0.30
}

fn default_escalate_threshold() -> f64 {
    0.60
}

fn default_max_records() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_from_email() -> String {
    DEFAULT_FROM_EMAIL.to_string()
}

fn default_tone_policy() -> String {
    DEFAULT_TONE_POLICY.to_string()
}

fn default_selection_threshold() -> f64 {
    DEFAULT_SELECTION_THRESHOLD
}

fn default_max_targets() -> i64 {
    DEFAULT_MAX_TARGETS
}

/// Fixed cost table for retention actions.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ActionCosts {
    pub none: f64,
    pub email: f64,
    pub discount_call: f64,
}

impl ActionCosts {
    /// Cost of carrying out `action`.
    pub fn for_action(&self, action: RecommendedAction) -> f64 {
        match action {
            RecommendedAction::None => self.none,
            RecommendedAction::Email => self.email,
            RecommendedAction::DiscountCall => self.discount_call,
        }
    }
}

impl Default for ActionCosts {
    fn default() -> Self {
        ActionCosts {
            none: 0.0,
            email: 5.0,
            discount_call: 50.0,
        }
    }
}

/// Thresholds and costs that drive the decision engine.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DecisionPolicy {
    #[serde(default = "default_email_threshold")]
    pub email_threshold: f64,
    #[serde(default = "default_escalate_threshold")]
    pub escalate_threshold: f64,
    #[serde(default)]
    pub action_costs: ActionCosts,
}

impl DecisionPolicy {
    /// Reject threshold pairs that cannot form ordered action bands.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.email_threshold) {
            return Err(anyhow!(
                "email_threshold {} must lie in [0, 1]",
                self.email_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.escalate_threshold) {
            return Err(anyhow!(
                "escalate_threshold {} must lie in [0, 1]",
                self.escalate_threshold
            ));
        }
        if self.email_threshold > self.escalate_threshold {
            return Err(anyhow!(
                "email_threshold {} exceeds escalate_threshold {}",
                self.email_threshold,
                self.escalate_threshold
            ));
        }
        Ok(())
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy {
            email_threshold: default_email_threshold(),
            escalate_threshold: default_escalate_threshold(),
            action_costs: ActionCosts::default(),
        }
    }
}

/// Batch size ceiling applied before any row is validated.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BatchLimits {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits {
            max_records: default_max_records(),
        }
    }
}

/// Business rules for the email-candidate shortlist.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CandidateRules {
    #[serde(default = "default_true")]
    pub exclude_no_action: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p_churn: Option<f64>,
    #[serde(default)]
    pub min_net_gain: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<Vec<RecommendedAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<usize>,
}

impl Default for CandidateRules {
    fn default() -> Self {
        CandidateRules {
            exclude_no_action: true,
            min_p_churn: None,
            min_net_gain: 0.0,
            allowed_actions: None,
            max_candidates: None,
        }
    }
}

/// Run configuration for the outreach pipeline.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_selection_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_targets")]
    pub max_targets: i64,
    #[serde(default = "default_true")]
    pub require_email: bool,
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_tone_policy")]
    pub tone_policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<Vec<RecommendedAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

impl RunConfig {
    /// Collect every configuration fault instead of stopping at the first.
    pub fn validate(&self) -> Vec<StageError> {
        let mut errors = Vec::new();
        if self.company_name.trim().is_empty() {
            errors.push(StageError::new(
                Stage::Config,
                "company_name must not be empty",
            ));
        }
        if self.from_name.trim().is_empty() {
            errors.push(StageError::new(
                Stage::Config,
                "from_name must not be empty",
            ));
        }
        if normalize_email(&self.from_email).is_none() {
            errors.push(StageError::new(
                Stage::Config,
                format!("from_email {:?} is not a valid email address", self.from_email),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            errors.push(StageError::new(
                Stage::Config,
                format!("threshold {} must lie in [0, 1]", self.threshold),
            ));
        }
        if self.tone_policy.trim().is_empty() {
            errors.push(StageError::new(
                Stage::Config,
                "tone_policy must not be empty",
            ));
        }
        errors
    }
}

/// Split a capability command configured in `var` into argv form.
///
/// Unset or blank means the builtin backend; a set but unparseable value is an
/// error rather than a silent fallback.
pub fn command_from_env(var: &str) -> Result<Option<Vec<String>>> {
    let Ok(raw) = env::var(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let argv = shell_words::split(trimmed).with_context(|| format!("parse {var}"))?;
    if argv.is_empty() {
        return Err(anyhow!("{var} does not name a command"));
    }
    Ok(Some(argv))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
