use crate::model::Recipient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
}

/// Delivers completion summaries.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage, recipient: &Recipient) -> eyre::Result<()>;
}

/// Mailer used when no SMTP server is configured; it only logs what would have been sent.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage, recipient: &Recipient) -> eyre::Result<()> {
        tracing::warn!(
            recipient = %recipient.0,
            subject = %message.subject,
            "no smtp server configured, not sending email"
        );
        Ok(())
    }
}
