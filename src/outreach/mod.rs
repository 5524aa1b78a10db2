//! Outreach domain types and the capability seams around them.
//!
//! The orchestrator in [`manager`] drives four capabilities: three tone
//! writers, a picker, a formatter, and a delivery backend. Each seam is a
//! trait so runs can mix builtin, external-command, and test backends.

pub mod delivery;
pub mod format;
pub mod manager;
pub mod picker;
pub mod text;
pub mod writers;

use crate::schema::normalize_email;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Writing tone for one draft variant.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Serious,
    Witty,
    Concise,
}

impl Tone {
    /// Tones in generation order; draft numbering follows this order.
    pub const ALL: [Tone; 3] = [Tone::Serious, Tone::Witty, Tone::Concise];

    /// Return the stable string identifier used in JSON artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Serious => "serious",
            Tone::Witty => "witty",
            Tone::Concise => "concise",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery mode for one orchestration call.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    Send,
    DryRun,
}

/// Customer selected for outreach contact.
///
/// `email`, when present, is already normalized to lowercase by the selector.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Target {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Target {
    /// Churn probability recorded by the selector.
    pub fn p_churn(&self) -> Option<f64> {
        self.metadata.get("p_churn").and_then(Value::as_f64)
    }

    /// Original batch index recorded by the selector.
    pub fn index(&self) -> Option<usize> {
        self.metadata
            .get("index")
            .and_then(Value::as_u64)
            .map(|index| index as usize)
    }
}

/// Three tone-keyed draft bodies, all non-empty plain text.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DraftSet {
    pub serious: String,
    pub witty: String,
    pub concise: String,
}

impl DraftSet {
    /// Build a set, rejecting any empty body.
    pub fn new(serious: String, witty: String, concise: String) -> Result<Self> {
        for (tone, body) in [
            (Tone::Serious, &serious),
            (Tone::Witty, &witty),
            (Tone::Concise, &concise),
        ] {
            if body.trim().is_empty() {
                return Err(anyhow!("{tone} draft is empty"));
            }
        }
        Ok(DraftSet {
            serious,
            witty,
            concise,
        })
    }

    pub fn get(&self, tone: Tone) -> &str {
        match tone {
            Tone::Serious => &self.serious,
            Tone::Witty => &self.witty,
            Tone::Concise => &self.concise,
        }
    }

    /// Bodies in generation order.
    pub fn in_order(&self) -> [(Tone, &str); 3] {
        [
            (Tone::Serious, &self.serious),
            (Tone::Witty, &self.witty),
            (Tone::Concise, &self.concise),
        ]
    }
}

/// Validated request driving one orchestration call.
///
/// Construction is the only admission point: a request that exists is safe to
/// run, so the orchestrator itself never re-checks these fields.
#[derive(Debug, Serialize, Clone)]
pub struct OutreachRequest {
    pub prompt: String,
    pub recipients: Vec<Target>,
    pub from_name: String,
    pub from_email: String,
    pub company_name: String,
    pub tone_policy: String,
    pub send_mode: SendMode,
}

impl OutreachRequest {
    pub fn new(
        prompt: String,
        recipients: Vec<Target>,
        from_name: String,
        from_email: String,
        company_name: String,
        tone_policy: String,
        send_mode: SendMode,
    ) -> Result<Self> {
        if prompt.trim().is_empty() {
            return Err(anyhow!("outreach prompt must not be empty"));
        }
        if recipients.is_empty() {
            return Err(anyhow!("outreach request has no recipients"));
        }
        if from_name.trim().is_empty() {
            return Err(anyhow!("from_name must not be empty"));
        }
        if company_name.trim().is_empty() {
            return Err(anyhow!("company_name must not be empty"));
        }
        if tone_policy.trim().is_empty() {
            return Err(anyhow!("tone_policy must not be empty"));
        }
        let from_email = normalize_email(&from_email)
            .ok_or_else(|| anyhow!("from_email {from_email:?} is not a valid email address"))?;
        Ok(OutreachRequest {
            prompt,
            recipients,
            from_name,
            from_email,
            company_name,
            tone_policy,
            send_mode,
        })
    }
}

/// Send status recorded on an orchestration result.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Skipped,
    Error,
}

/// Per-recipient outcome from the delivery capability.
#[derive(Debug, Serialize, Clone)]
pub struct SendRecord {
    pub target_id: String,
    pub email: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Send block attached to every orchestration result.
#[derive(Debug, Serialize, Clone)]
pub struct SendReport {
    pub attempted: bool,
    pub sent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SendStatus>,
    pub results: Vec<SendRecord>,
}

impl SendReport {
    /// Report for a run that never reached the send stage.
    pub fn not_attempted() -> Self {
        SendReport {
            attempted: false,
            sent: 0,
            status: None,
            results: Vec::new(),
        }
    }

    /// Report for a dry run, where sending is skipped on purpose.
    pub fn skipped() -> Self {
        SendReport {
            attempted: false,
            sent: 0,
            status: Some(SendStatus::Skipped),
            results: Vec::new(),
        }
    }
}

/// Overall status of one orchestration call.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutreachStatus {
    Sent,
    DryRun,
    Error,
}

/// Immutable outcome of one orchestration call.
///
/// Error outcomes keep whatever partial work completed before the failure, so
/// a picker fault still reports the generated drafts.
#[derive(Debug, Serialize, Clone)]
pub struct OutreachResult {
    pub status: OutreachStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drafts: Option<DraftSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_tone: Option<Tone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    pub send: SendReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<crate::schema::StageError>,
}
