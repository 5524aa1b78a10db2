//! Draft/pick/format/send orchestration as a linear state machine.
//!
//! Stages run strictly in order and each completes at most once. Any
//! capability failure ends the run with an error result that keeps whatever
//! partial work already exists; nothing is retried.

use super::delivery::Delivery;
use super::format::Formatter;
use super::picker::{resolve_pick, Picker};
use super::text::sanitize_plain_text;
use super::writers::{DraftWriter, WriterContext};
use super::{
    DraftSet, OutreachRequest, OutreachResult, OutreachStatus, SendMode, SendReport, SendStatus,
    Tone,
};
use crate::schema::{Stage, StageError};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

/// Orchestration stage in completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutreachStage {
    Generated,
    Picked,
    Formatted,
    Sent,
    Error,
}

/// Tracks linear stage progression and forbids skips and re-entry.
#[derive(Debug, Default)]
struct StageTracker {
    completed: Vec<OutreachStage>,
}

impl StageTracker {
    /// Record `next` as completed, rejecting out-of-order or repeat entry.
    fn advance(&mut self, next: OutreachStage) -> Result<()> {
        let required = match next {
            OutreachStage::Generated => None,
            OutreachStage::Picked => Some(OutreachStage::Generated),
            OutreachStage::Formatted => Some(OutreachStage::Picked),
            OutreachStage::Sent => Some(OutreachStage::Formatted),
            OutreachStage::Error => {
                self.completed.push(OutreachStage::Error);
                return Ok(());
            }
        };
        if self.completed.contains(&next) {
            return Err(anyhow!("stage {next:?} already completed"));
        }
        if self.completed.last().copied() != required {
            return Err(anyhow!("stage {next:?} cannot run yet"));
        }
        self.completed.push(next);
        Ok(())
    }
}

/// Capability set for one orchestration call.
pub struct OutreachCapabilities<'a> {
    pub serious_writer: &'a dyn DraftWriter,
    pub witty_writer: &'a dyn DraftWriter,
    pub concise_writer: &'a dyn DraftWriter,
    pub picker: &'a dyn Picker,
    pub formatter: &'a dyn Formatter,
    pub delivery: &'a dyn Delivery,
}

#[derive(Default)]
struct PartialWork {
    drafts: Option<DraftSet>,
    picked_tone: Option<Tone>,
    subject: Option<String>,
    body_text: Option<String>,
    body_html: Option<String>,
}

impl PartialWork {
    fn failed(self, tracker: &mut StageTracker, errors: Vec<StageError>) -> OutreachResult {
        let _ = tracker.advance(OutreachStage::Error);
        OutreachResult {
            status: OutreachStatus::Error,
            drafts: self.drafts,
            picked_tone: self.picked_tone,
            subject: self.subject,
            body_text: self.body_text,
            body_html: self.body_html,
            send: SendReport::not_attempted(),
            errors,
        }
    }
}

/// Run the draft/pick/format/send sequence for one validated request.
///
/// Per-recipient send failures live in `send.results`; only a run where no
/// recipient was accepted, or the delivery call itself failed, turns the
/// overall status to error.
pub fn run_outreach(request: &OutreachRequest, caps: &OutreachCapabilities<'_>) -> OutreachResult {
    let mut tracker = StageTracker::default();
    let context = WriterContext {
        company_name: request.company_name.clone(),
        from_name: request.from_name.clone(),
        from_email: request.from_email.clone(),
        tone_policy: request.tone_policy.clone(),
        extras: BTreeMap::new(),
    };
    let mut partial = PartialWork::default();

    let drafts = match generate_drafts(request, caps, &context, &mut tracker) {
        Ok(drafts) => drafts,
        Err(error) => return partial.failed(&mut tracker, vec![error]),
    };
    partial.drafts = Some(drafts.clone());

    let picked_tone = match pick_draft(&drafts, caps, &context, &mut tracker) {
        Ok(tone) => tone,
        Err(error) => return partial.failed(&mut tracker, vec![error]),
    };
    partial.picked_tone = Some(picked_tone);
    let body_text = drafts.get(picked_tone).to_string();
    partial.body_text = Some(body_text.clone());

    let (subject, body_html) = match format_message(&body_text, caps, &mut tracker) {
        Ok(formatted) => formatted,
        Err(error) => return partial.failed(&mut tracker, vec![error]),
    };
    partial.subject = Some(subject.clone());
    partial.body_html = Some(body_html.clone());

    match request.send_mode {
        SendMode::DryRun => {
            tracing::info!(
                recipients = request.recipients.len(),
                tone = %picked_tone,
                "dry run, send skipped"
            );
            OutreachResult {
                status: OutreachStatus::DryRun,
                drafts: partial.drafts,
                picked_tone: partial.picked_tone,
                subject: partial.subject,
                body_text: partial.body_text,
                body_html: partial.body_html,
                send: SendReport::skipped(),
                errors: Vec::new(),
            }
        }
        SendMode::Send => {
            if let Err(err) = tracker.advance(OutreachStage::Sent) {
                return partial.failed(&mut tracker, vec![internal_error(err)]);
            }
            match caps.delivery.send(
                &subject,
                &body_html,
                &request.recipients,
                &request.from_email,
            ) {
                Ok(outcome) => {
                    let sent = outcome.sent();
                    tracing::info!(
                        recipients = request.recipients.len(),
                        sent,
                        "outreach send attempted"
                    );
                    let delivered_any = sent > 0;
                    let mut errors = Vec::new();
                    if !delivered_any {
                        errors.push(StageError::new(
                            Stage::Send,
                            format!(
                                "delivery failed for all {} recipients",
                                request.recipients.len()
                            ),
                        ));
                    }
                    OutreachResult {
                        status: if delivered_any {
                            OutreachStatus::Sent
                        } else {
                            OutreachStatus::Error
                        },
                        drafts: partial.drafts,
                        picked_tone: partial.picked_tone,
                        subject: partial.subject,
                        body_text: partial.body_text,
                        body_html: partial.body_html,
                        send: SendReport {
                            attempted: true,
                            sent,
                            status: Some(if delivered_any {
                                SendStatus::Sent
                            } else {
                                SendStatus::Error
                            }),
                            results: outcome.records,
                        },
                        errors,
                    }
                }
                Err(err) => {
                    let mut result = partial.failed(
                        &mut tracker,
                        vec![StageError::new(Stage::Send, format!("{err:#}"))],
                    );
                    result.send = SendReport {
                        attempted: true,
                        sent: 0,
                        status: Some(SendStatus::Error),
                        results: Vec::new(),
                    };
                    result
                }
            }
        }
    }
}

/// Run all three tone writers, each exactly once, over the same prompt.
fn generate_drafts(
    request: &OutreachRequest,
    caps: &OutreachCapabilities<'_>,
    context: &WriterContext,
    tracker: &mut StageTracker,
) -> Result<DraftSet, StageError> {
    let serious = write_one(Tone::Serious, caps.serious_writer, request, context)?;
    let witty = write_one(Tone::Witty, caps.witty_writer, request, context)?;
    let concise = write_one(Tone::Concise, caps.concise_writer, request, context)?;
    tracker
        .advance(OutreachStage::Generated)
        .map_err(internal_error)?;
    DraftSet::new(serious, witty, concise)
        .map_err(|err| StageError::new(Stage::Writer, format!("{err:#}")))
}

fn write_one(
    tone: Tone,
    writer: &dyn DraftWriter,
    request: &OutreachRequest,
    context: &WriterContext,
) -> Result<String, StageError> {
    let raw = writer
        .write(&request.prompt, context)
        .map_err(|err| StageError::new(Stage::Writer, format!("{tone} writer failed: {err:#}")))?;
    let cleaned = sanitize_plain_text(&raw);
    if cleaned.is_empty() {
        return Err(StageError::new(
            Stage::Writer,
            format!("{tone} writer produced an empty draft"),
        ));
    }
    Ok(cleaned)
}

fn pick_draft(
    drafts: &DraftSet,
    caps: &OutreachCapabilities<'_>,
    context: &WriterContext,
    tracker: &mut StageTracker,
) -> Result<Tone, StageError> {
    let reply = caps
        .picker
        .pick(drafts, context)
        .map_err(|err| StageError::new(Stage::Picker, format!("picker failed: {err:#}")))?;
    tracker
        .advance(OutreachStage::Picked)
        .map_err(internal_error)?;
    Ok(resolve_pick(&reply, drafts))
}

fn format_message(
    body_text: &str,
    caps: &OutreachCapabilities<'_>,
    tracker: &mut StageTracker,
) -> Result<(String, String), StageError> {
    let subject = caps.formatter.subject(body_text).map_err(|err| {
        StageError::new(Stage::Formatter, format!("subject derivation failed: {err:#}"))
    })?;
    let body_html = caps.formatter.html_body(&subject, body_text).map_err(|err| {
        StageError::new(Stage::Formatter, format!("html derivation failed: {err:#}"))
    })?;
    tracker
        .advance(OutreachStage::Formatted)
        .map_err(internal_error)?;
    Ok((subject, body_html))
}

fn internal_error(err: anyhow::Error) -> StageError {
    StageError::new(Stage::Internal, format!("{err:#}"))
}
