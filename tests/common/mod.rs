//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Environment overrides are cleared on every run so tests exercise the
/// builtin capability stack unless they opt in explicitly.
const CLEARED_ENV_VARS: [&str; 5] = [
    "CPILOT_SCORER_COMMAND",
    "CPILOT_WRITER_COMMAND",
    "CPILOT_PICKER_COMMAND",
    "SENDGRID_API_KEY",
    "SENDGRID_VERIFIED_SENDER",
];

fn base_command() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_cpilot"));
    for var in CLEARED_ENV_VARS {
        command.env_remove(var);
    }
    command
}

pub fn run_cpilot(args: &[&str]) -> Output {
    base_command().args(args).output().expect("run cpilot")
}

#[allow(dead_code)]
pub fn run_cpilot_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = base_command();
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("run cpilot")
}

#[allow(dead_code)]
pub fn run_cpilot_stdin(args: &[&str], input: &str) -> Output {
    let mut child = base_command()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cpilot");
    child
        .stdin
        .as_mut()
        .expect("stdin piped")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("run cpilot")
}

/// Customer record the builtin scorer rates as a high churn risk. Older,
/// inactive, low credit score, several products, zero balance.
pub fn risky_record(id: &str, email: &str, age: f64) -> Value {
    json!({
        "customer_id": id,
        "email": email,
        "CreditScore": 480.0,
        "Geography": "Germany",
        "Gender": "Male",
        "Age": age,
        "Tenure": 1.0,
        "Balance": 0.0,
        "NumOfProducts": 3.0,
        "HasCrCard": 1.0,
        "IsActiveMember": 0.0,
        "EstimatedSalary": 40000.0,
    })
}

/// Customer record the builtin scorer rates as a low churn risk.
pub fn safe_record(id: &str, email: &str) -> Value {
    json!({
        "customer_id": id,
        "email": email,
        "CreditScore": 820.0,
        "Geography": "France",
        "Gender": "Female",
        "Age": 28.0,
        "Tenure": 8.0,
        "Balance": 60000.0,
        "NumOfProducts": 1.0,
        "HasCrCard": 1.0,
        "IsActiveMember": 1.0,
        "EstimatedSalary": 90000.0,
    })
}

pub fn write_json(path: &Path, value: &Value) {
    let content = serde_json::to_string_pretty(value).expect("serialize fixture");
    std::fs::write(path, content).expect("write fixture");
}

/// Parse stdout as JSON, failing loudly with stderr when the run failed.
pub fn parse_stdout(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "cpilot failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("parse stdout JSON")
}
