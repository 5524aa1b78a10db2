//! Draft-writer capability seam.
//!
//! `CPILOT_WRITER_COMMAND` selects an external command writer; otherwise a
//! deterministic builtin produces one fixed body per tone so dry runs work
//! with no external services at all.

use super::Tone;
use crate::config::{command_from_env, WRITER_COMMAND_ENV};
use crate::exec;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Shared context handed to every writer and the picker.
#[derive(Debug, Serialize, Clone, Default)]
pub struct WriterContext {
    pub company_name: String,
    pub from_name: String,
    pub from_email: String,
    pub tone_policy: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

/// Capability that writes one stylistic draft.
pub trait DraftWriter {
    fn write(&self, prompt: &str, context: &WriterContext) -> Result<String>;
}

/// Select the writer backend for `tone` from the environment.
pub fn writer_from_env(tone: Tone) -> Result<Box<dyn DraftWriter>> {
    match command_from_env(WRITER_COMMAND_ENV)? {
        Some(argv) => Ok(Box::new(CommandWriter { argv, tone })),
        None => Ok(Box::new(BuiltinWriter { tone })),
    }
}

/// Deterministic writer used when no command is configured.
pub struct BuiltinWriter {
    pub tone: Tone,
}

impl DraftWriter for BuiltinWriter {
    fn write(&self, _prompt: &str, context: &WriterContext) -> Result<String> {
        let body = match self.tone {
            Tone::Serious => format!(
                "Hello,\n\nYour account with {company} matters to us, and we want to make \
                 sure you are getting full value from it. A specialist on our team is ready \
                 to walk through your options whenever it suits you.\n\nKind regards,\n{from}",
                company = context.company_name,
                from = context.from_name,
            ),
            Tone::Witty => format!(
                "Hi there,\n\nWe noticed you have been quieter than usual, and {company} is \
                 not the same without you. Give us a nudge and we will line up something \
                 worth coming back for.\n\nCheers,\n{from}",
                company = context.company_name,
                from = context.from_name,
            ),
            Tone::Concise => format!(
                "Hello,\n\nWe would love to keep you with {company}. Reply to this email and \
                 we will take care of the rest.\n\n{from}",
                company = context.company_name,
                from = context.from_name,
            ),
        };
        Ok(body)
    }
}

/// Writer that shells out to a configured command.
pub struct CommandWriter {
    pub argv: Vec<String>,
    pub tone: Tone,
}

#[derive(Serialize)]
struct WriterRequest<'a> {
    tone: Tone,
    prompt: &'a str,
    context: &'a WriterContext,
}

impl DraftWriter for CommandWriter {
    fn write(&self, prompt: &str, context: &WriterContext) -> Result<String> {
        let request = WriterRequest {
            tone: self.tone,
            prompt,
            context,
        };
        let payload = serde_json::to_string(&request).context("serialize writer request")?;
        let stdout = exec::run_capability("writer", &self.argv, &payload)?;
        draft_from_response(&stdout)
    }
}

/// Accept either plain text or a `{"text": ...}` JSON object.
fn draft_from_response(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("writer returned an empty draft"));
    }
    if let Ok(value) = serde_json::from_str::<Value>(&exec::extract_json(trimmed)) {
        if let Some(text) = value.get("text").and_then(Value::as_str) {
            let text = text.trim();
            if text.is_empty() {
                return Err(anyhow!("writer returned an empty draft"));
            }
            return Ok(text.to_string());
        }
    }
    Ok(trimmed.to_string())
}
