//! Subprocess plumbing for configured capability commands.
//!
//! Every external capability (scorer, writer, picker) follows the same shape:
//! JSON request on stdin, response on stdout, stderr reserved for diagnostics.
//! A non-zero exit is a capability failure and surfaces the command's stderr.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Run one capability command, feeding `payload` on stdin.
pub fn run_capability(label: &str, argv: &[String], payload: &str) -> Result<String> {
    let Some(program) = argv.first() else {
        return Err(anyhow!("{label} command is empty"));
    };
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn {label} command: {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(payload.as_bytes())
            .with_context(|| format!("write {label} request to stdin"))?;
    }
    let output = child
        .wait_with_output()
        .with_context(|| format!("wait for {label} command"))?;

    let elapsed_ms = start.elapsed().as_millis();
    tracing::info!(
        capability = label,
        elapsed_ms,
        request_bytes = payload.len(),
        response_bytes = output.stdout.len(),
        "capability invoke complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{label} command failed with {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    String::from_utf8(output.stdout).with_context(|| format!("decode {label} stdout as UTF-8"))
}

/// Strip a Markdown code fence if the response is wrapped in one.
pub fn extract_json(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}
