//! Batch record validation against the required-field schema.
//!
//! Two failure policies: `fail_fast` stops at the first offending row after
//! collecting that row's complete fault list, while `partial` examines every
//! row and accumulates all errors. Valid rows keep their original index so
//! scorer output can be mapped back to source order.

use crate::config::BatchLimits;
use crate::schema::{BatchMode, CustomerFeatures, InputRecord, Stage, StageError, ValidatedRow};
use serde_json::Value;

/// Required record fields, in the order errors are reported.
pub const REQUIRED_FIELDS: &[&str] = &[
    "CreditScore",
    "Geography",
    "Gender",
    "Age",
    "Tenure",
    "Balance",
    "NumOfProducts",
    "HasCrCard",
    "IsActiveMember",
    "EstimatedSalary",
];

/// Required fields that must coerce to a finite number.
pub const NUMERIC_FIELDS: &[&str] = &[
    "CreditScore",
    "Age",
    "Tenure",
    "Balance",
    "NumOfProducts",
    "HasCrCard",
    "IsActiveMember",
    "EstimatedSalary",
];

/// Identifier keys carried through but never fed to the scorer.
const ID_FIELDS: &[&str] = &["customer_id", "row_id", "id"];

/// Outcome of validating one batch.
#[derive(Debug, Default)]
pub struct ValidatedBatch {
    pub rows: Vec<ValidatedRow>,
    pub errors: Vec<StageError>,
}

/// Reject batch shapes before any row-level work happens.
pub fn check_batch_shape(records: &[InputRecord], limits: &BatchLimits) -> Option<StageError> {
    if records.is_empty() {
        return Some(StageError::new(Stage::Schema, "batch contains no records"));
    }
    if records.len() > limits.max_records {
        return Some(StageError::new(
            Stage::Schema,
            format!(
                "batch size {} exceeds the configured maximum of {}",
                records.len(),
                limits.max_records
            ),
        ));
    }
    None
}

/// Validate a batch of records under `mode`.
pub fn validate_batch(records: &[InputRecord], mode: BatchMode) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    for (index, record) in records.iter().enumerate() {
        match validate_record(index, record) {
            Ok(row) => batch.rows.push(row),
            Err(errors) => {
                batch.errors.extend(errors);
                if mode == BatchMode::FailFast {
                    break;
                }
            }
        }
    }
    batch
}

/// Check one record, reporting every offending field or building the typed row.
///
/// A field that is missing reports only the missing error, never a numeric one
/// on top of it.
fn validate_record(index: usize, record: &InputRecord) -> Result<ValidatedRow, Vec<StageError>> {
    let id = passthrough_id(record);
    let mut errors = Vec::new();
    for field in REQUIRED_FIELDS {
        match record.get(*field) {
            None | Some(Value::Null) => errors.push(StageError::for_row(
                index,
                id.clone(),
                field,
                format!("Missing required field: {field}"),
            )),
            Some(Value::String(raw)) if raw.is_empty() => errors.push(StageError::for_row(
                index,
                id.clone(),
                field,
                format!("Missing required field: {field}"),
            )),
            Some(value) => {
                if NUMERIC_FIELDS.contains(field) && coerce_number(value).is_none() {
                    errors.push(StageError::for_row(
                        index,
                        id.clone(),
                        field,
                        format!(
                            "Field '{field}' must be a number (got {})",
                            render_value(value)
                        ),
                    ));
                }
            }
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ValidatedRow {
        index,
        id,
        email: optional_text(record, "email"),
        name: optional_text(record, "name"),
        features: CustomerFeatures {
            credit_score: number_field(record, "CreditScore"),
            geography: text_field(record, "Geography"),
            gender: text_field(record, "Gender"),
            age: number_field(record, "Age"),
            tenure: number_field(record, "Tenure"),
            balance: number_field(record, "Balance"),
            num_of_products: number_field(record, "NumOfProducts"),
            has_cr_card: number_field(record, "HasCrCard"),
            is_active_member: number_field(record, "IsActiveMember"),
            estimated_salary: number_field(record, "EstimatedSalary"),
        },
    })
}

/// Coerce a JSON value to a finite number, or reject it.
///
/// Booleans count as 1/0 and numeric strings are parsed after trimming; NaN
/// and infinities are rejected in every form.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(num) => num.as_f64().filter(|n| n.is_finite()),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(raw) => raw.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(raw) => format!("{raw:?}"),
        other => other.to_string(),
    }
}

fn passthrough_id(record: &InputRecord) -> Option<String> {
    ID_FIELDS.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(num)) => Some(num.to_string()),
        _ => None,
    })
}

fn optional_text(record: &InputRecord, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn number_field(record: &InputRecord, key: &str) -> f64 {
    record.get(key).and_then(coerce_number).unwrap_or_default()
}

fn text_field(record: &InputRecord, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(raw)) => raw.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
