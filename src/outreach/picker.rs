//! Draft-picker capability and reply resolution.
//!
//! Picker replies are free-form text; [`resolve_pick`] maps them onto one of
//! the three drafts without ever failing, falling back to the first draft.

use super::writers::WriterContext;
use super::{DraftSet, Tone};
use crate::config::{command_from_env, PICKER_COMMAND_ENV};
use crate::exec;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;

/// Capability that chooses among the three drafts.
pub trait Picker {
    fn pick(&self, drafts: &DraftSet, context: &WriterContext) -> Result<String>;
}

/// Select the picker backend from the environment.
pub fn picker_from_env() -> Result<Box<dyn Picker>> {
    match command_from_env(PICKER_COMMAND_ENV)? {
        Some(argv) => Ok(Box::new(CommandPicker { argv })),
        None => Ok(Box::new(FirstDraftPicker)),
    }
}

/// Deterministic picker: always the first draft.
pub struct FirstDraftPicker;

impl Picker for FirstDraftPicker {
    fn pick(&self, drafts: &DraftSet, _context: &WriterContext) -> Result<String> {
        Ok(drafts.serious.clone())
    }
}

/// Picker that shells out to a configured command.
pub struct CommandPicker {
    pub argv: Vec<String>,
}

#[derive(Serialize)]
struct PickerRequest<'a> {
    drafts: &'a DraftSet,
    context: &'a WriterContext,
}

impl Picker for CommandPicker {
    fn pick(&self, drafts: &DraftSet, context: &WriterContext) -> Result<String> {
        let request = PickerRequest { drafts, context };
        let payload = serde_json::to_string(&request).context("serialize picker request")?;
        let reply = exec::run_capability("picker", &self.argv, &payload)?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(anyhow!("picker returned an empty reply"));
        }
        Ok(reply.to_string())
    }
}

/// Resolve a picker reply to a draft tone.
///
/// Resolution order: exact body match, an explicit `draft`/`option` number,
/// a bare 1-3, an ordinal word, then the first draft.
pub fn resolve_pick(reply: &str, drafts: &DraftSet) -> Tone {
    let trimmed = reply.trim();
    for (tone, body) in drafts.in_order() {
        if trimmed == body.trim() {
            return tone;
        }
    }
    let numbered = Regex::new(r"(?i)\b(?:draft|option)?\s*([123])\b").expect("regex for draft numbers");
    if let Some(caps) = numbered.captures(trimmed) {
        return match &caps[1] {
            "1" => Tone::Serious,
            "2" => Tone::Witty,
            _ => Tone::Concise,
        };
    }
    let lowered = trimmed.to_lowercase();
    if lowered.contains("first") {
        return Tone::Serious;
    }
    if lowered.contains("second") {
        return Tone::Witty;
    }
    if lowered.contains("third") {
        return Tone::Concise;
    }
    Tone::Serious
}
