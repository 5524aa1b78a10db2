use super::*;
use serde_json::{json, Value};

fn record(value: Value) -> InputRecord {
    value.as_object().expect("record fixture is an object").clone()
}

fn complete_record() -> Value {
    json!({
        "customer_id": "c-100",
        "email": "c100@example.com",
        "name": "Robin",
        "CreditScore": 650,
        "Geography": "France",
        "Gender": "Female",
        "Age": 41,
        "Tenure": 5,
        "Balance": 12000.5,
        "NumOfProducts": 2,
        "HasCrCard": 1,
        "IsActiveMember": 0,
        "EstimatedSalary": 52000
    })
}

#[test]
fn accepts_a_complete_record() {
    let records = vec![record(complete_record())];
    let batch = validate_batch(&records, BatchMode::Partial);
    assert!(batch.errors.is_empty());
    assert_eq!(batch.rows.len(), 1);
    let row = &batch.rows[0];
    assert_eq!(row.index, 0);
    assert_eq!(row.id.as_deref(), Some("c-100"));
    assert_eq!(row.email.as_deref(), Some("c100@example.com"));
    assert_eq!(row.features.credit_score, 650.0);
    assert_eq!(row.features.geography, "France");
    assert_eq!(row.features.is_active_member, 0.0);
}

#[test]
fn reports_missing_fields_with_exact_message() {
    let mut broken = complete_record();
    broken.as_object_mut().expect("object").remove("Age");
    let records = vec![record(broken)];
    let batch = validate_batch(&records, BatchMode::Partial);
    assert!(batch.rows.is_empty());
    assert_eq!(batch.errors.len(), 1);
    let error = &batch.errors[0];
    assert_eq!(error.stage, Stage::Validation);
    assert_eq!(error.message, "Missing required field: Age");
    assert_eq!(error.index, Some(0));
    assert_eq!(error.field.as_deref(), Some("Age"));
    assert_eq!(error.id.as_deref(), Some("c-100"));
}

#[test]
fn null_and_empty_string_count_as_missing() {
    let mut broken = complete_record();
    broken["Balance"] = Value::Null;
    broken["Tenure"] = json!("");
    let batch = validate_batch(&[record(broken)], BatchMode::Partial);
    let messages: Vec<&str> = batch.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Missing required field: Tenure",
            "Missing required field: Balance"
        ]
    );
}

#[test]
fn non_numeric_value_reports_type_error() {
    let mut broken = complete_record();
    broken["CreditScore"] = json!("seven hundred");
    let batch = validate_batch(&[record(broken)], BatchMode::Partial);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(
        batch.errors[0].message,
        "Field 'CreditScore' must be a number (got \"seven hundred\")"
    );
}

#[test]
fn whitespace_only_string_is_a_type_error_not_missing() {
    let mut broken = complete_record();
    broken["Age"] = json!("   ");
    let batch = validate_batch(&[record(broken)], BatchMode::Partial);
    assert_eq!(batch.errors.len(), 1);
    assert!(batch.errors[0].message.starts_with("Field 'Age' must be a number"));
}

#[test]
fn numeric_strings_and_booleans_coerce() {
    let mut tweaked = complete_record();
    tweaked["Age"] = json!(" 44.5 ");
    tweaked["HasCrCard"] = json!(true);
    tweaked["IsActiveMember"] = json!(false);
    let batch = validate_batch(&[record(tweaked)], BatchMode::Partial);
    assert!(batch.errors.is_empty());
    let features = &batch.rows[0].features;
    assert_eq!(features.age, 44.5);
    assert_eq!(features.has_cr_card, 1.0);
    assert_eq!(features.is_active_member, 0.0);
}

#[test]
fn nan_and_infinity_strings_are_rejected() {
    for bad in ["nan", "inf", "-inf", "Infinity"] {
        let mut broken = complete_record();
        broken["Balance"] = json!(bad);
        let batch = validate_batch(&[record(broken)], BatchMode::Partial);
        assert_eq!(batch.errors.len(), 1, "value {bad:?} should be rejected");
        assert!(batch.errors[0].message.starts_with("Field 'Balance'"));
    }
}

#[test]
fn partial_mode_collects_errors_across_rows() {
    let mut first = complete_record();
    first["Age"] = Value::Null;
    let mut third = complete_record();
    third["Balance"] = json!("lots");
    third["customer_id"] = json!("c-102");
    let records = vec![record(first), record(complete_record()), record(third)];
    let batch = validate_batch(&records, BatchMode::Partial);
    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.rows[0].index, 1);
    assert_eq!(batch.errors.len(), 2);
    assert_eq!(batch.errors[0].index, Some(0));
    assert_eq!(batch.errors[1].index, Some(2));
    assert_eq!(batch.errors[1].id.as_deref(), Some("c-102"));
}

#[test]
fn fail_fast_stops_after_first_bad_row() {
    let mut second = complete_record();
    second.as_object_mut().expect("object").remove("Gender");
    second["EstimatedSalary"] = json!("plenty");
    let mut fourth = complete_record();
    fourth["Age"] = Value::Null;
    let records = vec![
        record(complete_record()),
        record(second),
        record(complete_record()),
        record(fourth),
    ];
    let batch = validate_batch(&records, BatchMode::FailFast);
    assert_eq!(batch.rows.len(), 1);
    let fields: Vec<&str> = batch
        .errors
        .iter()
        .map(|e| e.field.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(fields, vec!["Gender", "EstimatedSalary"]);
    assert!(batch.errors.iter().all(|e| e.index == Some(1)));
}

#[test]
fn id_falls_back_through_known_keys() {
    let mut by_row_id = complete_record();
    by_row_id.as_object_mut().expect("object").remove("customer_id");
    by_row_id["row_id"] = json!(7);
    let batch = validate_batch(&[record(by_row_id)], BatchMode::Partial);
    assert_eq!(batch.rows[0].id.as_deref(), Some("7"));

    let mut without_id = complete_record();
    without_id.as_object_mut().expect("object").remove("customer_id");
    let batch = validate_batch(&[record(without_id)], BatchMode::Partial);
    assert_eq!(batch.rows[0].id, None);
}

#[test]
fn batch_shape_checks() {
    let limits = BatchLimits::default();
    assert!(check_batch_shape(&[], &limits).is_some());

    let records = vec![record(complete_record()); 101];
    let error = check_batch_shape(&records, &limits).expect("oversize rejected");
    assert_eq!(error.stage, Stage::Schema);
    assert!(error.message.contains("exceeds"));

    let records = vec![record(complete_record()); 100];
    assert!(check_batch_shape(&records, &limits).is_none());
}
