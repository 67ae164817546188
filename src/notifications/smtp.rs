use super::{MailTransport, OutgoingEmail};
use crate::{config::SmtpConfig, errors::ServiceError};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info, warn};

const SLOW_SEND: Duration = Duration::from_secs(5);

/// SMTP relay client.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self, ServiceError> {
        let builder = if cfg.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host).map_err(|e| {
                ServiceError::InternalError(format!("Failed to create SMTP transport: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
        };

        let mut builder = builder
            .port(cfg.port)
            .timeout(Some(Duration::from_secs(cfg.timeout_secs)));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from_address: Address = cfg.from_email.parse().map_err(|e| {
            ServiceError::InternalError(format!("Invalid from address {}: {}", cfg.from_email, e))
        })?;

        info!(host = %cfg.host, port = cfg.port, "SMTP transport configured");

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(Some(cfg.from_name.clone()), from_address),
        })
    }

    pub(crate) fn build_message(&self, email: &OutgoingEmail) -> Result<Message, ServiceError> {
        let to: Mailbox = email.to.parse().map_err(|e| {
            ServiceError::ValidationError(format!("Invalid recipient address {}: {}", email.to, e))
        })?;

        let html = SinglePart::html(email.html_body.clone());
        let body = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    ServiceError::InternalError(format!(
                        "Invalid attachment content type {}: {}",
                        attachment.content_type, e
                    ))
                })?;
                MultiPart::mixed().singlepart(html).singlepart(
                    Attachment::new(attachment.file_name.clone())
                        .body(attachment.content.clone(), content_type),
                )
            }
            None => MultiPart::mixed().singlepart(html),
        };

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .multipart(body)
            .map_err(|e| ServiceError::InternalError(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), ServiceError> {
        debug!(to = %email.to, subject = %email.subject, "Sending email");
        let message = self.build_message(email)?;

        crate::tracing::timed("smtp_send", SLOW_SEND, self.transport.send(message))
            .await
            .map_err(|e| {
                warn!(to = %email.to, error = %e, "SMTP delivery failed");
                ServiceError::TransportError(format!("Failed to send email to {}: {}", email.to, e))
            })?;

        info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}
