use log::info;
use parking_lot::Mutex;

use crate::logging::mask_email;

use super::{Email, Notifier, NotifyError};

/// A notifier that keeps every email in memory instead of delivering it.
///
/// Used for development, where it logs a masked summary of each email,
/// and by tests, which read the emails back.
#[derive(Debug, Default)]
pub struct Outbox(Mutex<Vec<Email>>);

impl Outbox {
    /// Every email sent so far, oldest first.
    pub fn emails(&self) -> Vec<Email> {
        self.0.lock().clone()
    }

    /// Every email sent to `to`, oldest first.
    pub fn emails_to(&self, to: &str) -> Vec<Email> {
        self.0
            .lock()
            .iter()
            .filter(|email| email.to == to)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

#[rocket::async_trait]
impl Notifier for Outbox {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        info!(
            "Outbox: '{}' to {}",
            email.subject,
            mask_email(&email.to)
        );
        self.0.lock().push(email);
        Ok(())
    }
}
