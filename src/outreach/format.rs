//! Subject and markup derivation for the picked draft.

use super::text::{escape_html, first_nonempty_line, sanitize_plain_text};
use anyhow::{anyhow, Result};

/// Capability that derives the send-ready subject and markup body.
pub trait Formatter {
    /// Derive a subject line from the picked body. Called exactly once per run.
    fn subject(&self, body: &str) -> Result<String>;

    /// Derive the HTML payload. Called exactly once per run.
    fn html_body(&self, subject: &str, body: &str) -> Result<String>;
}

/// Deterministic formatter: first line as subject, escaped paragraph as HTML.
pub struct DeterministicFormatter;

impl Formatter for DeterministicFormatter {
    fn subject(&self, body: &str) -> Result<String> {
        let cleaned = sanitize_plain_text(body);
        first_nonempty_line(&cleaned)
            .ok_or_else(|| anyhow!("subject derivation produced no text"))
    }

    fn html_body(&self, _subject: &str, body: &str) -> Result<String> {
        // A body that already carries markup is forwarded from its first tag.
        if let Some(position) = body.find('<') {
            return Ok(body[position..].to_string());
        }
        Ok(format!("<p>{}</p>", escape_html(body)))
    }
}
