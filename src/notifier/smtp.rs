use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;

use super::{Email, Notifier, NotifyError};

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    // non-secrets
    #[serde(rename = "smtp_host")]
    pub host: String,
    #[serde(rename = "smtp_port")]
    pub port: Option<u16>,
    #[serde(rename = "smtp_username")]
    pub username: String,
    pub mail_from: String,
    // secrets
    #[serde(rename = "smtp_password")]
    pub password: String,
}

/// Delivers email through an SMTP relay over TLS.
pub struct SmtpNotifier {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from = config
            .mail_from
            .parse::<Mailbox>()
            .map_err(|e| NotifyError(format!("invalid `mail_from`: {e}")))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| NotifyError(format!("invalid SMTP relay: {e}")))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        Ok(Self {
            from,
            transport: builder.build(),
        })
    }
}

#[rocket::async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotifyError(format!("invalid recipient: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| NotifyError(format!("failed to build message: {e}")))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError(format!("SMTP delivery failed: {e}")))?;
        Ok(())
    }
}
