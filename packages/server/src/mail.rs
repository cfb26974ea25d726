use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

/// A message handed to the delivery backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Raw token carried by the message, kept separate so delivery
    /// backends never have to parse it back out of the body.
    pub token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Outbound mail delivery. Real SMTP/API delivery lives outside this service.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError>;
}

/// Logs recipient and subject only.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Outbound email queued");
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token of the most recent message to `to` whose subject contains
    /// `subject_part`.
    pub fn last_token_for(&self, to: &str, subject_part: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to == to && m.subject.contains(subject_part))
            .and_then(|m| m.token)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError("mailbox poisoned".into()))?
            .push(email);
        Ok(())
    }
}
