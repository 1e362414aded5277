//! Report delivery by email.
//!
//! This crate provides:
//! - [`DeliveryGateway`]: sends one message with one attachment to one recipient
//! - [`send_report`]: sends a report to every recipient in a list and
//!   summarizes the outcomes
//! - [`relay`]: gateway that POSTs messages to an HTTP mail relay
//! - [`outbox`]: gateway that writes messages to a local directory

pub mod outbox;
pub mod relay;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use inviteboard_shared::{InviteBoardError, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

pub use outbox::OutboxGateway;
pub use relay::HttpRelayGateway;

/// MIME type of PDF attachments.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A file attached to every message in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn pdf(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            bytes,
        }
    }
}

/// Sender, subject and body shared by every message in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// One message addressed to one recipient.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    pub to: &'a str,
    pub message: &'a Message,
    pub attachment: &'a Attachment,
}

/// JSON form of an envelope, shared by the relay request body and outbox files.
#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub attachment: WireAttachment<'a>,
}

#[derive(Debug, Serialize)]
pub struct WireAttachment<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub content_base64: String,
}

impl<'a> Envelope<'a> {
    pub fn to_wire(&self) -> WireMessage<'a> {
        WireMessage {
            from: &self.message.from,
            to: self.to,
            subject: &self.message.subject,
            body: &self.message.body,
            attachment: WireAttachment {
                filename: &self.attachment.filename,
                content_type: &self.attachment.content_type,
                content_base64: STANDARD.encode(&self.attachment.bytes),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Result of delivering one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub message: String,
}

impl DeliveryOutcome {
    pub fn sent(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Transport for a single message. Failures are reported in the outcome,
/// never as a panic or an error that would stop a batch.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn deliver(&self, envelope: &Envelope<'_>) -> DeliveryOutcome;
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for a delivery batch.
pub trait DeliveryProgress: Send + Sync {
    /// Called before each recipient is attempted (1-based `current`).
    fn sending(&self, recipient: &str, current: usize, total: usize);
    /// Called after each attempt.
    fn delivered(&self, recipient: &str, outcome: &DeliveryOutcome);
}

/// No-op delivery progress.
pub struct SilentDeliveryProgress;

impl DeliveryProgress for SilentDeliveryProgress {
    fn sending(&self, _recipient: &str, _current: usize, _total: usize) {}
    fn delivered(&self, _recipient: &str, _outcome: &DeliveryOutcome) {}
}

// ---------------------------------------------------------------------------
// Batch sending
// ---------------------------------------------------------------------------

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    pub succeeded: usize,
    pub attempted: usize,
    /// `(recipient, message)` for every failed attempt, in send order.
    pub failures: Vec<(String, String)>,
}

impl DeliverySummary {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.attempted
    }
}

/// Split a free-text recipient list on commas, semicolons and newlines.
/// Entries are trimmed and empty entries dropped; duplicates are kept.
pub fn parse_recipients(text: &str) -> Result<Vec<String>> {
    let recipients: Vec<String> = text
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if recipients.is_empty() {
        return Err(InviteBoardError::validation("no recipients given"));
    }
    Ok(recipients)
}

/// Send `message` with `attachment` to each recipient in order, one message
/// per entry. A failed recipient is recorded and the batch carries on.
#[instrument(skip_all, fields(gateway = gateway.name(), recipients = recipients.len()))]
pub async fn send_report(
    gateway: &dyn DeliveryGateway,
    recipients: &[String],
    message: &Message,
    attachment: &Attachment,
    progress: &dyn DeliveryProgress,
) -> Result<DeliverySummary> {
    if recipients.is_empty() {
        return Err(InviteBoardError::validation("no recipients given"));
    }

    let total = recipients.len();
    let mut summary = DeliverySummary::default();

    for (i, to) in recipients.iter().enumerate() {
        progress.sending(to, i + 1, total);
        let envelope = Envelope {
            to,
            message,
            attachment,
        };
        let outcome = gateway.deliver(&envelope).await;
        summary.attempted += 1;
        if outcome.success {
            summary.succeeded += 1;
        } else {
            warn!(recipient = %to, reason = %outcome.message, "delivery failed");
            summary.failures.push((to.clone(), outcome.message.clone()));
        }
        progress.delivered(to, &outcome);
    }

    info!(
        succeeded = summary.succeeded,
        attempted = summary.attempted,
        "delivery batch finished"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
