//! Delivery capability and the SendGrid-backed implementation.
//!
//! The orchestrator calls [`Delivery::send`] at most once per run with the
//! full recipient list; the SendGrid backend fans that out into one HTTP post
//! per recipient. A recipient that fails is recorded and never retried.

use super::{SendRecord, Target};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

/// SendGrid v3 mail send endpoint.
const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";
/// Environment variable holding the SendGrid API key.
pub const SENDGRID_API_KEY_ENV: &str = "SENDGRID_API_KEY";
/// Environment variable naming the verified-sender fallback address.
pub const SENDGRID_SENDER_ENV: &str = "SENDGRID_VERIFIED_SENDER";

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of one delivery invocation.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub records: Vec<SendRecord>,
}

impl DeliveryOutcome {
    /// Number of recipients the provider accepted.
    pub fn sent(&self) -> usize {
        self.records.iter().filter(|record| record.ok).count()
    }
}

/// Outbound email provider, invoked at most once per orchestration call.
pub trait Delivery {
    fn send(
        &self,
        subject: &str,
        html_body: &str,
        recipients: &[Target],
        from_email: &str,
    ) -> Result<DeliveryOutcome>;
}

/// Delivery backend wired in for dry runs; any invocation is a logic error.
pub struct DisabledDelivery;

impl Delivery for DisabledDelivery {
    fn send(&self, _: &str, _: &str, _: &[Target], _: &str) -> Result<DeliveryOutcome> {
        Err(anyhow!("delivery is disabled for this run"))
    }
}

/// SendGrid-backed delivery over HTTPS.
pub struct SendgridDelivery {
    api_key: String,
    verified_sender: Option<String>,
    agent: ureq::Agent,
}

impl SendgridDelivery {
    /// Build from `SENDGRID_API_KEY` and the optional verified sender.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var(SENDGRID_API_KEY_ENV)
            .with_context(|| format!("{SENDGRID_API_KEY_ENV} is not set"))?;
        if api_key.trim().is_empty() {
            return Err(anyhow!("{SENDGRID_API_KEY_ENV} is empty"));
        }
        let verified_sender = env::var(SENDGRID_SENDER_ENV)
            .ok()
            .filter(|sender| !sender.trim().is_empty());
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(SEND_TIMEOUT))
            .http_status_as_error(false)
            .build();
        Ok(SendgridDelivery {
            api_key,
            verified_sender,
            agent: config.into(),
        })
    }

    fn sender<'a>(&'a self, from_email: &'a str) -> &'a str {
        if from_email.trim().is_empty() {
            self.verified_sender.as_deref().unwrap_or(from_email)
        } else {
            from_email
        }
    }

    fn post_one(
        &self,
        subject: &str,
        html_body: &str,
        target: &Target,
        email: &str,
        sender: &str,
    ) -> SendRecord {
        let payload = mail_payload(subject, html_body, email, sender);
        let response = self
            .agent
            .post(SENDGRID_SEND_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&payload);
        match response {
            Ok(mut response) => {
                let status_code = response.status().as_u16();
                let ok = status_code < 400;
                let detail = if ok {
                    None
                } else {
                    let body = response.body_mut().read_to_string().unwrap_or_default();
                    Some(body.chars().take(300).collect())
                };
                SendRecord {
                    target_id: target.id.clone(),
                    email: email.to_string(),
                    ok,
                    status_code: Some(status_code),
                    detail,
                }
            }
            Err(err) => SendRecord {
                target_id: target.id.clone(),
                email: email.to_string(),
                ok: false,
                status_code: None,
                detail: Some(err.to_string()),
            },
        }
    }
}

impl Delivery for SendgridDelivery {
    fn send(
        &self,
        subject: &str,
        html_body: &str,
        recipients: &[Target],
        from_email: &str,
    ) -> Result<DeliveryOutcome> {
        let sender = self.sender(from_email);
        let mut records = Vec::with_capacity(recipients.len());
        for target in recipients {
            let Some(email) = target.email.as_deref() else {
                records.push(SendRecord {
                    target_id: target.id.clone(),
                    email: String::new(),
                    ok: false,
                    status_code: None,
                    detail: Some("recipient has no email".to_string()),
                });
                continue;
            };
            records.push(self.post_one(subject, html_body, target, email, sender));
        }
        let outcome = DeliveryOutcome { records };
        tracing::info!(
            recipients = recipients.len(),
            delivered = outcome.sent(),
            "sendgrid delivery complete"
        );
        Ok(outcome)
    }
}

/// SendGrid v3 single-recipient mail body.
fn mail_payload(subject: &str, html_body: &str, email: &str, sender: &str) -> Value {
    json!({
        "personalizations": [{"to": [{"email": email}]}],
        "from": {"email": sender},
        "subject": subject,
        "content": [{"type": "text/html", "value": html_body}],
    })
}

/// Test delivery that records every call and can be told to fail.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingDelivery {
    pub calls: std::cell::RefCell<Vec<Vec<String>>>,
    pub transport_failure: bool,
    pub reject_all: bool,
}

#[cfg(test)]
impl Delivery for RecordingDelivery {
    fn send(
        &self,
        _subject: &str,
        _html_body: &str,
        recipients: &[Target],
        _from_email: &str,
    ) -> Result<DeliveryOutcome> {
        self.calls
            .borrow_mut()
            .push(recipients.iter().map(|target| target.id.clone()).collect());
        if self.transport_failure {
            return Err(anyhow!("delivery transport failure"));
        }
        let records = recipients
            .iter()
            .map(|target| SendRecord {
                target_id: target.id.clone(),
                email: target.email.clone().unwrap_or_default(),
                ok: !self.reject_all,
                status_code: Some(if self.reject_all { 401 } else { 202 }),
                detail: None,
            })
            .collect();
        Ok(DeliveryOutcome { records })
    }
}
