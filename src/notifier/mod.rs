//! Outbound email.

use log::{error, info};
use thiserror::Error;

use crate::{error::Error, logging::mask_email};

mod outbox;
mod smtp;
pub mod templates;

pub use outbox::Outbox;
pub use smtp::{SmtpConfig, SmtpNotifier};

/// A single HTML email to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct NotifyError(pub String);

impl From<NotifyError> for Error {
    fn from(err: NotifyError) -> Self {
        Error::Mail(err.0)
    }
}

/// Something that can deliver emails. Delivery is attempted once.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), NotifyError>;
}

/// Send an email whose failure must not affect the caller, logging the outcome.
pub async fn send_best_effort(notifier: &dyn Notifier, email: Email) {
    let to = mask_email(&email.to);
    let subject = email.subject.clone();
    match notifier.send(email).await {
        Ok(()) => info!("Sent '{subject}' to {to}"),
        Err(e) => error!("Failed to send '{subject}' to {to}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[rocket::async_trait]
    impl Notifier for Broken {
        async fn send(&self, _email: Email) -> Result<(), NotifyError> {
            Err(NotifyError("relay refused".to_string()))
        }
    }

    #[rocket::async_test]
    async fn best_effort_swallows_failures() {
        let email = Email {
            to: "jdoe@unb.ca".to_string(),
            subject: "Receipt".to_string(),
            html: String::new(),
        };
        send_best_effort(&Broken, email).await;
    }

    #[test]
    fn delivery_failures_are_mail_errors() {
        let err: Error = NotifyError("relay refused".to_string()).into();
        assert!(matches!(err, Error::Mail(_)));
    }
}
