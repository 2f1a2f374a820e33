//! Storage interfaces used by the workflows and endpoints.
//!
//! Every mutation is a single-row operation under a unique key, so the
//! uniqueness and atomicity guarantees documented on each method hold under
//! concurrent requests for both implementations.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::{
    error::Result,
    model::{
        api::{auth::AdminCredentials, otp::ShortCode},
        common::Purpose,
        db::{
            Admin, Candidate, Nomination, NominationEvent, OtpRecord, Vote, VotingEvent,
            Withdrawal,
        },
        mongodb::Id,
    },
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Events and the records that belong to them.
#[rocket::async_trait]
pub trait EventStore: Send + Sync {
    /// Fails with `Conflict` if the slug is taken.
    async fn insert_nomination_event(&self, event: &NominationEvent) -> Result<()>;
    /// Replace an existing event. Fails with `Conflict` if the new slug is
    /// taken and `NotFound` if there is no such event.
    async fn replace_nomination_event(&self, event: &NominationEvent) -> Result<()>;
    async fn nomination_event(&self, id: Id) -> Result<Option<NominationEvent>>;
    async fn nomination_event_by_slug(&self, slug: &str) -> Result<Option<NominationEvent>>;
    async fn nomination_events(&self) -> Result<Vec<NominationEvent>>;

    /// Fails with `Conflict` if the slug is taken.
    async fn insert_voting_event(&self, event: &VotingEvent) -> Result<()>;
    async fn replace_voting_event(&self, event: &VotingEvent) -> Result<()>;
    async fn voting_event(&self, id: Id) -> Result<Option<VotingEvent>>;
    async fn voting_event_by_slug(&self, slug: &str) -> Result<Option<VotingEvent>>;
    async fn voting_events(&self) -> Result<Vec<VotingEvent>>;

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()>;
    async fn candidates(&self, event_id: Id) -> Result<Vec<Candidate>>;

    /// Fails with `Conflict` if `(event_id, email)` already has a nomination.
    async fn insert_nomination(&self, nomination: &Nomination) -> Result<()>;
    async fn nomination_by_email(&self, event_id: Id, email: &str) -> Result<Option<Nomination>>;
    async fn nomination_by_withdrawal_token(&self, token: &str) -> Result<Option<Nomination>>;
    async fn nominations(&self, event_id: Id) -> Result<Vec<Nomination>>;
    /// Apply a withdrawal, but only to a nomination that has never been
    /// withdrawn from. Returns whether it was applied.
    async fn apply_withdrawal(&self, id: Id, withdrawal: &Withdrawal) -> Result<bool>;

    /// Fails with `Conflict` if `(event_id, voter_email)` already voted.
    async fn insert_vote(&self, vote: &Vote) -> Result<()>;
    async fn vote_by_email(&self, event_id: Id, email: &str) -> Result<Option<Vote>>;
    async fn votes(&self, event_id: Id) -> Result<Vec<Vote>>;
}

/// One-time code records.
#[rocket::async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert the record, replacing any record with the same
    /// `(email, event_id, purpose)`.
    async fn upsert_otp(&self, record: &OtpRecord) -> Result<()>;
    /// The unused record for `purpose` with this short code, if any.
    async fn unused_otp_by_short_code(
        &self,
        purpose: Purpose,
        short_code: &ShortCode,
    ) -> Result<Option<OtpRecord>>;
    /// Atomically add one to the record's attempts, returning the new count.
    ///
    /// Returns `None` if the record no longer carries `short_code`, because a
    /// newer code replaced it.
    async fn increment_otp_attempts(&self, id: Id, short_code: &ShortCode)
        -> Result<Option<u32>>;
    /// Mark the record used, but only if it still carries `short_code` and is
    /// unused and not locked. Returns whether it was marked.
    async fn mark_otp_used(&self, id: Id, short_code: &ShortCode, at: DateTime<Utc>)
        -> Result<bool>;
}

/// Admin accounts.
#[rocket::async_trait]
pub trait AdminStore: Send + Sync {
    /// Fails with `Conflict` if the username is taken.
    async fn insert_admin(&self, admin: &Admin) -> Result<()>;
    async fn admin_by_id(&self, id: Id) -> Result<Option<Admin>>;
    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>>;
    async fn admins(&self) -> Result<Vec<Admin>>;
    /// Record a failed login. Once `threshold` consecutive failures are
    /// reached the account is locked until `lock_until` and the count starts
    /// again. Returns whether this failure locked the account.
    async fn record_login_failure(
        &self,
        id: Id,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<bool>;
    /// Clear any failures and lock after a successful login.
    async fn reset_login_failures(&self, id: Id) -> Result<()>;
}

/// Everything the application stores.
pub trait Store: EventStore + TokenStore + AdminStore {}

impl<T> Store for T where T: EventStore + TokenStore + AdminStore {}

/// Create an admin from `bootstrap` if there are no admins yet.
pub async fn ensure_admin_exists(
    store: &dyn Store,
    bootstrap: Option<AdminCredentials>,
) -> Result<()> {
    if !store.admins().await?.is_empty() {
        return Ok(());
    }
    match bootstrap {
        Some(credentials) => {
            let admin = credentials.into_admin()?;
            store.insert_admin(&admin).await?;
            info!("Created bootstrap admin '{}'", admin.username);
        }
        None => warn!(
            "No admins exist and no bootstrap credentials are configured, \
             set `admin_username` and `admin_password`"
        ),
    }
    Ok(())
}
