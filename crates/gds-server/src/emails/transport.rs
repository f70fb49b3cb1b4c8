//! Outbound mail transport abstraction
//!
//! The directory composes and deduplicates its own mail; delivery is an
//! external collaborator behind the [`EmailTransport`] trait. Deployments
//! plug in their provider; development falls back to [`LogTransport`] and
//! tests capture sends with [`MockTransport`].

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("could not deliver email to {recipient}: {message}")]
    Delivery { recipient: String, message: String },
}

/// A binary attachment on an outbound message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// One outbound email, fully composed.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// Mail delivery provider.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Development transport that records sends on the service log instead of
/// delivering them.
#[derive(Default)]
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            attachment = message.attachment.as_ref().map(|a| a.filename.as_str()),
            "outbound email (log transport)"
        );
        Ok(())
    }
}

/// Test transport capturing every message in an outbox.
#[derive(Default)]
pub struct MockTransport {
    outbox: Mutex<Vec<EmailMessage>>,
    fail: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail, for exercising the courier's
    /// log-and-continue path.
    pub fn fail_sends(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Snapshot of every message sent so far.
    pub fn outbox(&self) -> Vec<EmailMessage> {
        self.outbox.lock().unwrap().clone()
    }

    /// Messages sent with the given subject line.
    pub fn sent_with_subject(&self, subject: &str) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailTransport for MockTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if *self.fail.lock().unwrap() {
            return Err(EmailError::Delivery {
                recipient: message.to.clone(),
                message: "mock transport configured to fail".into(),
            });
        }
        self.outbox.lock().unwrap().push(message.clone());
        Ok(())
    }
}
