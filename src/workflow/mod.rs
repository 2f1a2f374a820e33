//! One-time-code verification and the submissions it unlocks.
//!
//! A code moves through `requested -> verified -> consumed` per
//! `(email, event, purpose)`. Requesting again replaces the pending code.
//! Verifying issues a [`Session`] scoped to the flow, which the matching
//! submission consumes.

use chrono::Utc;
use log::{info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    logging::mask_email,
    model::{
        api::{
            otp::{Code, ShortCode},
            session::{Flow, Session},
            validation,
        },
        db::OtpRecord,
        mongodb::Id,
        store::{Store, TokenStore},
    },
    notifier::{templates, Notifier},
};

pub mod nomination;
pub mod voting;
pub mod withdrawal;

/// The collaborators every workflow step needs.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub store: &'a dyn Store,
    pub notifier: &'a dyn Notifier,
    pub config: &'a Config,
}

/// Who a code is for.
#[derive(Debug, Clone)]
pub struct Subject<'a> {
    /// Lowercase.
    pub email: &'a str,
    pub event_id: Id,
    pub event_name: &'a str,
}

/// Request metadata recorded alongside submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Validate a requester's address against the institutional domain.
fn requester_email(config: &Config, value: &str) -> Result<String> {
    validation::institutional_email(value, config.email_domain())
        .map_err(|message| Error::invalid("email", message))
}

/// Report a unique-key violation with the same message as the pre-check.
fn duplicate(message: &'static str) -> impl FnOnce(Error) -> Error {
    move |err| match err {
        Error::Conflict(_) => Error::Conflict(message.to_string()),
        other => other,
    }
}

/// Issue a fresh code for `subject`, replacing any pending one, and email it.
///
/// Returns the short code that identifies the pending code. The code itself
/// is only ever sent by email.
pub async fn request_code<F: Flow>(
    services: &Services<'_>,
    subject: &Subject<'_>,
    client: &ClientInfo,
) -> Result<ShortCode> {
    let config = services.config;
    let record = OtpRecord {
        id: Id::new(),
        email: subject.email.to_string(),
        event_id: subject.event_id,
        purpose: F::PURPOSE,
        otp: Code::random(),
        short_code: ShortCode::random(),
        expires_at: Utc::now() + config.otp_ttl(),
        is_used: false,
        used_at: None,
        attempts: 0,
        max_attempts: config.otp_max_attempts(),
        ip_address: client.ip_address.clone(),
    };
    services.store.upsert_otp(&record).await?;

    let email = templates::otp(
        subject.email,
        F::PURPOSE,
        subject.event_name,
        record.otp,
        config.otp_ttl().num_minutes(),
    );
    services.notifier.send(email).await?;

    info!(
        "Issued {} code for {} on event {}",
        F::PURPOSE,
        mask_email(subject.email),
        subject.event_id
    );
    Ok(record.short_code)
}

/// Check `otp` against the pending code identified by `short_code`.
///
/// When `expected_email` is given, the code must have been sent to that
/// address. On success the code is spent and a session is issued.
pub async fn verify_code<F: Flow>(
    services: &Services<'_>,
    short_code: &ShortCode,
    otp: &str,
    expected_email: Option<&str>,
) -> Result<Session<F>> {
    let code = otp
        .trim()
        .parse::<Code>()
        .map_err(|err| Error::invalid("otp", err.to_string()))?;

    let invalid = || Error::Unauthorized("Invalid or expired verification code".to_string());
    let now = Utc::now();
    let record = services
        .store
        .unused_otp_by_short_code(F::PURPOSE, short_code)
        .await?
        .filter(|record| !record.is_expired(now))
        .ok_or_else(invalid)?;

    if record.is_locked() {
        warn!(
            "Locked {} code used for {}",
            F::PURPOSE,
            mask_email(&record.email)
        );
        return Err(Error::TooManyAttempts(
            "Too many incorrect attempts, please request a new code".to_string(),
        ));
    }

    if let Some(expected) = expected_email {
        if expected != record.email {
            return Err(Error::Unauthorized(
                "Email does not match the verification code".to_string(),
            ));
        }
    }

    if record.otp != code {
        let attempts = services
            .store
            .increment_otp_attempts(record.id, &record.short_code)
            .await?
            .ok_or_else(invalid)?;
        let remaining = record.max_attempts.saturating_sub(attempts);
        info!(
            "Wrong {} code for {}, {remaining} attempts remaining",
            F::PURPOSE,
            mask_email(&record.email)
        );
        return Err(Error::Unauthorized(format!(
            "Incorrect verification code, {remaining} attempt(s) remaining"
        )));
    }

    // Fails if the record changed since it was read.
    if !services
        .store
        .mark_otp_used(record.id, &record.short_code, now)
        .await?
    {
        return Err(invalid());
    }

    info!(
        "Verified {} code for {}",
        F::PURPOSE,
        mask_email(&record.email)
    );
    Ok(Session::new(record.email, record.event_id, services.config))
}
