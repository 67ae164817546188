//! Outbound email.

pub mod smtp;

use crate::errors::ServiceError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub use smtp::SmtpMailer;

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
}

/// Delivers messages. Failures are reported as [`ServiceError::TransportError`]
/// and never affect records that were already persisted.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), ServiceError>;
}

/// Transport used when SMTP is switched off. Every send fails so callers
/// can retry once mail is configured.
#[derive(Debug, Clone, Default)]
pub struct DisabledMailer;

#[async_trait]
impl MailTransport for DisabledMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), ServiceError> {
        tracing::warn!(to = %email.to, subject = %email.subject, "Email not sent: SMTP disabled");
        Err(ServiceError::TransportError(
            "email delivery is disabled (smtp.enabled = false)".to_string(),
        ))
    }
}

/// Keeps every message in memory instead of sending it. Useful for local runs
/// and tests; can be told to fail to simulate an unreachable relay.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Makes subsequent sends fail with `reason` (or succeed again with `None`).
    pub fn fail_with(&self, reason: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = reason.map(str::to_string);
        }
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), ServiceError> {
        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(reason) = failure {
            return Err(ServiceError::TransportError(reason));
        }
        self.sent
            .lock()
            .map_err(|_| ServiceError::InternalError("mail recorder poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}
