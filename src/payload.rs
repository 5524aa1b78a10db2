//! Outreach prompt rendering and recipient resolution.

use crate::outreach::Target;
use crate::schema::{Stage, StageError};
use anyhow::{anyhow, Result};
use regex::{Captures, Regex};

/// Template applied when the run configuration names none.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Write a retention outreach email from {from_name} at \
     {company_name} for {recipient_count} recipients: {recipient_ids}.";

/// Render the outreach instruction text for `targets`.
///
/// Recognized placeholders: `{from_name}`, `{company_name}`,
/// `{recipient_count}`, and `{recipient_ids}` (comma-joined). Any other
/// placeholder is an error, as is a template that renders to nothing.
/// Identical inputs yield identical output.
pub fn render_prompt(
    template: &str,
    from_name: &str,
    company_name: &str,
    targets: &[Target],
) -> Result<String> {
    let recipient_ids = targets
        .iter()
        .map(|target| target.id.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let recipient_count = targets.len().to_string();

    let placeholder = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("regex for placeholders");
    let mut unknown: Option<String> = None;
    let rendered = placeholder.replace_all(template, |caps: &Captures<'_>| match &caps[1] {
        "from_name" => from_name.to_string(),
        "company_name" => company_name.to_string(),
        "recipient_count" => recipient_count.clone(),
        "recipient_ids" => recipient_ids.clone(),
        other => {
            if unknown.is_none() {
                unknown = Some(other.to_string());
            }
            String::new()
        }
    });
    if let Some(name) = unknown {
        return Err(anyhow!(
            "prompt template is missing required variable '{name}'"
        ));
    }
    let rendered = rendered.trim().to_string();
    if rendered.is_empty() {
        return Err(anyhow!("rendered outreach prompt is empty"));
    }
    Ok(rendered)
}

/// Split targets into deliverable recipients and per-target diagnostics.
///
/// Targets without an email are dropped here, one diagnostic each, so the
/// send stage only ever sees addressable recipients.
pub fn resolve_recipients(targets: &[Target]) -> (Vec<Target>, Vec<StageError>) {
    let mut recipients = Vec::new();
    let mut dropped = Vec::new();
    for target in targets {
        if target.email.is_some() {
            recipients.push(target.clone());
        } else {
            dropped.push(StageError {
                target_id: Some(target.id.clone()),
                ..StageError::new(Stage::Payload, "Skipping recipient without email")
            });
        }
    }
    (recipients, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn target(id: &str, email: Option<&str>) -> Target {
        Target {
            id: id.to_string(),
            email: email.map(str::to_string),
            name: None,
            metadata: Map::new(),
        }
    }

    #[test]
    fn default_template_renders_every_placeholder() {
        let targets = vec![target("c-1", Some("a@example.com")), target("c-2", None)];
        let prompt = render_prompt(DEFAULT_PROMPT_TEMPLATE, "Dana", "Acme", &targets)
            .expect("render default template");
        assert_eq!(
            prompt,
            "Write a retention outreach email from Dana at Acme for 2 recipients: c-1, c-2."
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let targets = vec![target("c-1", None)];
        let first = render_prompt(DEFAULT_PROMPT_TEMPLATE, "Dana", "Acme", &targets);
        let second = render_prompt(DEFAULT_PROMPT_TEMPLATE, "Dana", "Acme", &targets);
        assert_eq!(first.expect("render"), second.expect("render"));
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let error = render_prompt("Hello {customer_mood}", "Dana", "Acme", &[target("c", None)])
            .expect_err("unknown placeholder");
        assert_eq!(
            format!("{error}"),
            "prompt template is missing required variable 'customer_mood'"
        );
    }

    #[test]
    fn empty_render_is_an_error() {
        assert!(render_prompt("   ", "Dana", "Acme", &[target("c", None)]).is_err());
    }

    #[test]
    fn literal_text_without_placeholders_passes_through() {
        let prompt = render_prompt("Fixed instructions.", "Dana", "Acme", &[target("c", None)])
            .expect("render");
        assert_eq!(prompt, "Fixed instructions.");
    }

    #[test]
    fn recipients_without_email_become_diagnostics() {
        let targets = vec![
            target("has", Some("has@example.com")),
            target("missing", None),
        ];
        let (recipients, dropped) = resolve_recipients(&targets);
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].id, "has");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].stage, Stage::Payload);
        assert_eq!(dropped[0].message, "Skipping recipient without email");
        assert_eq!(dropped[0].target_id.as_deref(), Some("missing"));
    }
}
