//! Target selection: threshold filter, email normalization, dedupe, ranking.
//!
//! Ranking is deterministic: probability descending, then a tie key where
//! rows with an assigned id sort before rows with a synthesized one. Running
//! the selector twice over the same input yields the same list.

use crate::outreach::Target;
use crate::schema::{normalize_email, RecommendedAction};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Probability keys accepted on loose rows, in lookup order.
const PROBABILITY_KEYS: &[&str] = &["p_churn", "churn_probability", "probability"];

/// One row considered for outreach selection.
#[derive(Debug, Clone, Default)]
pub struct CandidateRow {
    pub index: usize,
    pub id: Option<String>,
    pub p_churn: Option<f64>,
    pub recommended_action: Option<RecommendedAction>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl CandidateRow {
    /// Read one loose result row, tolerating missing or oddly-typed fields.
    ///
    /// `position` stands in for the index when the row does not carry one.
    pub fn from_value(position: usize, value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return CandidateRow {
                index: position,
                ..CandidateRow::default()
            };
        };
        let metadata = object
            .get("metadata")
            .and_then(Value::as_object)
            .cloned();
        let email = text_entry(object, "email").or_else(|| {
            metadata
                .as_ref()
                .and_then(|map| text_entry(map, "email"))
        });
        CandidateRow {
            index: object
                .get("index")
                .and_then(Value::as_u64)
                .map(|index| index as usize)
                .unwrap_or(position),
            id: id_entry(object),
            p_churn: probability_entry(object),
            recommended_action: text_entry(object, "recommended_action")
                .as_deref()
                .and_then(RecommendedAction::from_tag),
            email,
            name: text_entry(object, "name"),
            metadata,
        }
    }

    /// A row participates when it has a probability or a recommended action.
    pub fn is_usable(&self) -> bool {
        self.p_churn.is_some() || self.recommended_action.is_some()
    }
}

fn probability_entry(object: &Map<String, Value>) -> Option<f64> {
    PROBABILITY_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_f64))
        .filter(|p| p.is_finite())
}

fn id_entry(object: &Map<String, Value>) -> Option<String> {
    match object.get("id") {
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(num)) => Some(num.to_string()),
        _ => None,
    }
}

fn text_entry(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Tie key for equal probabilities: assigned ids rank before synthesized ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum TieKey {
    Assigned(String),
    Synthesized(usize),
}

/// Select, rank, dedupe, and cap outreach targets from scored rows.
///
/// A non-positive `max_targets` short-circuits to an empty selection. With
/// `require_email` unset, rows without a usable address still qualify; their
/// `email` stays `None`. Duplicate normalized emails keep the higher-ranked
/// target.
pub fn select_targets(
    rows: &[CandidateRow],
    threshold: f64,
    max_targets: i64,
    require_email: bool,
) -> Vec<Target> {
    if max_targets <= 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(f64, TieKey, Target)> = Vec::new();
    for row in rows {
        let Some(p_churn) = row.p_churn.filter(|p| p.is_finite()) else {
            continue;
        };
        if p_churn < threshold {
            continue;
        }
        let email = row.email.as_deref().and_then(normalize_email);
        if require_email && email.is_none() {
            continue;
        }
        let (id, tie_key) = match row.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => (id.to_string(), TieKey::Assigned(id.to_string())),
            None => (format!("idx-{}", row.index), TieKey::Synthesized(row.index)),
        };
        let mut metadata = row.metadata.clone().unwrap_or_default();
        metadata.insert("index".to_string(), Value::from(row.index as u64));
        metadata.insert("p_churn".to_string(), Value::from(p_churn));
        ranked.push((
            p_churn,
            tie_key,
            Target {
                id,
                email,
                name: row.name.clone(),
                metadata,
            },
        ));
    }

    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for (_, _, target) in ranked {
        if let Some(email) = &target.email {
            if !seen.insert(email.clone()) {
                continue;
            }
        }
        targets.push(target);
        if targets.len() as i64 >= max_targets {
            break;
        }
    }
    targets
}

#[cfg(test)]
#[path = "select_tests.rs"]
mod tests;
