use async_trait::async_trait;
use eyre::WrapErr;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use packrat_core::{
    config::Smtp,
    mail::{LogMailer, MailMessage, Mailer},
    model::Recipient,
};
use std::sync::Arc;

/// Sends completion summaries through an SMTP relay.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &Smtp) -> eyre::Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .wrap_err_with(|| format!("invalid sender address '{}'", config.from))?;
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .wrap_err_with(|| format!("invalid smtp host '{}'", config.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port);
        if let Some(username) = &config.username {
            let password = match &config.password {
                Some(secret) => secret
                    .resolve()
                    .wrap_err_with(|| format!("failed to get smtp password from {}", secret.label()))?
                    .0,
                None => String::new(),
            };
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }
        Ok(SmtpMailer {
            from,
            transport: builder.build(),
        })
    }

    fn message(&self, message: &MailMessage, recipient: &Recipient) -> eyre::Result<Message> {
        let to = recipient
            .0
            .parse::<Mailbox>()
            .wrap_err_with(|| format!("invalid recipient address '{}'", recipient.0))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .wrap_err("failed to build email")
    }
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage, recipient: &Recipient) -> eyre::Result<()> {
        let email = self.message(message, recipient)?;
        self.transport
            .send(email)
            .await
            .wrap_err_with(|| format!("failed to send email to {}", recipient.0))?;
        Ok(())
    }
}

/// The SMTP mailer if the configuration has a server, otherwise one that only logs.
pub fn from_settings(smtp: Option<&Smtp>) -> eyre::Result<Arc<dyn Mailer>> {
    match smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(smtp)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}
