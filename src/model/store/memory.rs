use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    model::{
        api::otp::ShortCode,
        common::Purpose,
        db::{
            Admin, Candidate, Nomination, NominationEvent, OtpRecord, Vote, VotingEvent,
            Withdrawal,
        },
        mongodb::Id,
    },
};

use super::{AdminStore, EventStore, TokenStore};

#[derive(Debug, Default)]
struct Tables {
    admins: Vec<Admin>,
    nomination_events: Vec<NominationEvent>,
    voting_events: Vec<VotingEvent>,
    candidates: Vec<Candidate>,
    nominations: Vec<Nomination>,
    votes: Vec<Vote>,
    otp_records: Vec<OtpRecord>,
}

/// A store that keeps everything in process memory.
///
/// Each operation holds a single lock for its whole duration, which gives
/// the same uniqueness and atomicity guarantees as the database indexes.
#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<Tables>);

fn conflict(what: &str) -> Error {
    Error::Conflict(format!("{what} already exists"))
}

#[rocket::async_trait]
impl EventStore for MemoryStore {
    async fn insert_nomination_event(&self, event: &NominationEvent) -> Result<()> {
        let mut tables = self.0.lock();
        if tables.nomination_events.iter().any(|e| e.slug == event.slug) {
            return Err(conflict("An event with this slug"));
        }
        tables.nomination_events.push(event.clone());
        Ok(())
    }

    async fn replace_nomination_event(&self, event: &NominationEvent) -> Result<()> {
        let mut tables = self.0.lock();
        if tables
            .nomination_events
            .iter()
            .any(|e| e.slug == event.slug && e.id != event.id)
        {
            return Err(conflict("An event with this slug"));
        }
        let existing = tables
            .nomination_events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| Error::not_found("Nomination event"))?;
        *existing = event.clone();
        Ok(())
    }

    async fn nomination_event(&self, id: Id) -> Result<Option<NominationEvent>> {
        let tables = self.0.lock();
        Ok(tables.nomination_events.iter().find(|e| e.id == id).cloned())
    }

    async fn nomination_event_by_slug(&self, slug: &str) -> Result<Option<NominationEvent>> {
        let tables = self.0.lock();
        Ok(tables
            .nomination_events
            .iter()
            .find(|e| e.slug == slug)
            .cloned())
    }

    async fn nomination_events(&self) -> Result<Vec<NominationEvent>> {
        Ok(self.0.lock().nomination_events.clone())
    }

    async fn insert_voting_event(&self, event: &VotingEvent) -> Result<()> {
        let mut tables = self.0.lock();
        if tables.voting_events.iter().any(|e| e.slug == event.slug) {
            return Err(conflict("An event with this slug"));
        }
        tables.voting_events.push(event.clone());
        Ok(())
    }

    async fn replace_voting_event(&self, event: &VotingEvent) -> Result<()> {
        let mut tables = self.0.lock();
        if tables
            .voting_events
            .iter()
            .any(|e| e.slug == event.slug && e.id != event.id)
        {
            return Err(conflict("An event with this slug"));
        }
        let existing = tables
            .voting_events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| Error::not_found("Voting event"))?;
        *existing = event.clone();
        Ok(())
    }

    async fn voting_event(&self, id: Id) -> Result<Option<VotingEvent>> {
        let tables = self.0.lock();
        Ok(tables.voting_events.iter().find(|e| e.id == id).cloned())
    }

    async fn voting_event_by_slug(&self, slug: &str) -> Result<Option<VotingEvent>> {
        let tables = self.0.lock();
        Ok(tables.voting_events.iter().find(|e| e.slug == slug).cloned())
    }

    async fn voting_events(&self) -> Result<Vec<VotingEvent>> {
        Ok(self.0.lock().voting_events.clone())
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.0.lock().candidates.push(candidate.clone());
        Ok(())
    }

    async fn candidates(&self, event_id: Id) -> Result<Vec<Candidate>> {
        let tables = self.0.lock();
        Ok(tables
            .candidates
            .iter()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn insert_nomination(&self, nomination: &Nomination) -> Result<()> {
        let mut tables = self.0.lock();
        if tables.nominations.iter().any(|n| {
            (n.event_id == nomination.event_id && n.email == nomination.email)
                || n.withdrawal_token == nomination.withdrawal_token
        }) {
            return Err(conflict("A nomination for this email"));
        }
        tables.nominations.push(nomination.clone());
        Ok(())
    }

    async fn nomination_by_email(&self, event_id: Id, email: &str) -> Result<Option<Nomination>> {
        let tables = self.0.lock();
        Ok(tables
            .nominations
            .iter()
            .find(|n| n.event_id == event_id && n.email == email)
            .cloned())
    }

    async fn nomination_by_withdrawal_token(&self, token: &str) -> Result<Option<Nomination>> {
        let tables = self.0.lock();
        Ok(tables
            .nominations
            .iter()
            .find(|n| n.withdrawal_token == token)
            .cloned())
    }

    async fn nominations(&self, event_id: Id) -> Result<Vec<Nomination>> {
        let tables = self.0.lock();
        Ok(tables
            .nominations
            .iter()
            .filter(|n| n.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn apply_withdrawal(&self, id: Id, withdrawal: &Withdrawal) -> Result<bool> {
        let mut tables = self.0.lock();
        match tables
            .nominations
            .iter_mut()
            .find(|n| n.id == id && !n.has_withdrawn())
        {
            Some(nomination) => {
                withdrawal.apply(nomination);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<()> {
        let mut tables = self.0.lock();
        if tables
            .votes
            .iter()
            .any(|v| v.event_id == vote.event_id && v.voter_email == vote.voter_email)
        {
            return Err(conflict("A vote for this email"));
        }
        tables.votes.push(vote.clone());
        Ok(())
    }

    async fn vote_by_email(&self, event_id: Id, email: &str) -> Result<Option<Vote>> {
        let tables = self.0.lock();
        Ok(tables
            .votes
            .iter()
            .find(|v| v.event_id == event_id && v.voter_email == email)
            .cloned())
    }

    async fn votes(&self, event_id: Id) -> Result<Vec<Vote>> {
        let tables = self.0.lock();
        Ok(tables
            .votes
            .iter()
            .filter(|v| v.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[rocket::async_trait]
impl TokenStore for MemoryStore {
    async fn upsert_otp(&self, record: &OtpRecord) -> Result<()> {
        let mut tables = self.0.lock();
        let existing = tables.otp_records.iter_mut().find(|r| {
            r.email == record.email && r.event_id == record.event_id && r.purpose == record.purpose
        });
        match existing {
            // Keep the original ID, as the database upsert does.
            Some(existing) => {
                *existing = OtpRecord {
                    id: existing.id,
                    ..record.clone()
                }
            }
            None => tables.otp_records.push(record.clone()),
        }
        Ok(())
    }

    async fn unused_otp_by_short_code(
        &self,
        purpose: Purpose,
        short_code: &ShortCode,
    ) -> Result<Option<OtpRecord>> {
        let tables = self.0.lock();
        Ok(tables
            .otp_records
            .iter()
            .find(|r| r.purpose == purpose && &r.short_code == short_code && !r.is_used)
            .cloned())
    }

    async fn increment_otp_attempts(
        &self,
        id: Id,
        short_code: &ShortCode,
    ) -> Result<Option<u32>> {
        let mut tables = self.0.lock();
        Ok(tables
            .otp_records
            .iter_mut()
            .find(|r| r.id == id && &r.short_code == short_code)
            .map(|record| {
                record.attempts += 1;
                record.attempts
            }))
    }

    async fn mark_otp_used(
        &self,
        id: Id,
        short_code: &ShortCode,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.0.lock();
        match tables.otp_records.iter_mut().find(|r| {
            r.id == id && &r.short_code == short_code && !r.is_used && !r.is_locked()
        }) {
            Some(record) => {
                record.is_used = true;
                record.used_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[rocket::async_trait]
impl AdminStore for MemoryStore {
    async fn insert_admin(&self, admin: &Admin) -> Result<()> {
        let mut tables = self.0.lock();
        if tables.admins.iter().any(|a| a.username == admin.username) {
            return Err(conflict("An admin with this username"));
        }
        tables.admins.push(admin.clone());
        Ok(())
    }

    async fn admin_by_id(&self, id: Id) -> Result<Option<Admin>> {
        let tables = self.0.lock();
        Ok(tables.admins.iter().find(|a| a.id == id).cloned())
    }

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        let tables = self.0.lock();
        Ok(tables
            .admins
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        Ok(self.0.lock().admins.clone())
    }

    async fn record_login_failure(
        &self,
        id: Id,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.0.lock();
        let admin = tables
            .admins
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found("Admin"))?;
        admin.failed_logins += 1;
        if admin.failed_logins >= threshold {
            admin.failed_logins = 0;
            admin.locked_until = Some(lock_until);
            return Ok(true);
        }
        Ok(false)
    }

    async fn reset_login_failures(&self, id: Id) -> Result<()> {
        let mut tables = self.0.lock();
        if let Some(admin) = tables.admins.iter_mut().find(|a| a.id == id) {
            admin.failed_logins = 0;
            admin.locked_until = None;
        }
        Ok(())
    }
}

/// Direct table access for tests.
#[cfg(test)]
impl MemoryStore {
    pub fn otp_records(&self) -> Vec<OtpRecord> {
        self.0.lock().otp_records.clone()
    }

    pub fn all_nominations(&self) -> Vec<Nomination> {
        self.0.lock().nominations.clone()
    }

    pub fn all_votes(&self) -> Vec<Vote> {
        self.0.lock().votes.clone()
    }

    /// Move a record's expiry into the past.
    pub fn expire_otp(&self, short_code: &ShortCode) {
        let mut tables = self.0.lock();
        for record in tables
            .otp_records
            .iter_mut()
            .filter(|r| &r.short_code == short_code)
        {
            record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::api::otp::Code;

    fn record(email: &str, event_id: Id) -> OtpRecord {
        OtpRecord {
            id: Id::new(),
            email: email.to_string(),
            event_id,
            purpose: Purpose::Voting,
            otp: Code::random(),
            short_code: ShortCode::random(),
            expires_at: Utc::now() + Duration::minutes(30),
            is_used: false,
            used_at: None,
            attempts: 0,
            max_attempts: 5,
            ip_address: None,
        }
    }

    #[rocket::async_test]
    async fn upsert_replaces_by_key() {
        let store = MemoryStore::default();
        let event_id = Id::new();
        let first = record("jdoe@unb.ca", event_id);
        store.upsert_otp(&first).await.unwrap();
        store
            .increment_otp_attempts(first.id, &first.short_code)
            .await
            .unwrap();

        let second = record("jdoe@unb.ca", event_id);
        store.upsert_otp(&second).await.unwrap();

        let records = store.otp_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, first.id);
        assert_eq!(records[0].short_code, second.short_code);
        assert_eq!(records[0].attempts, 0);
    }

    #[rocket::async_test]
    async fn short_code_lookup_is_scoped_to_purpose() {
        let store = MemoryStore::default();
        let record = record("jdoe@unb.ca", Id::new());
        store.upsert_otp(&record).await.unwrap();

        assert!(store
            .unused_otp_by_short_code(Purpose::Voting, &record.short_code)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .unused_otp_by_short_code(Purpose::Nomination, &record.short_code)
            .await
            .unwrap()
            .is_none());
    }

    #[rocket::async_test]
    async fn mark_used_is_conditional() {
        let store = MemoryStore::default();
        let record = record("jdoe@unb.ca", Id::new());
        store.upsert_otp(&record).await.unwrap();

        let (id, short_code) = (record.id, &record.short_code);
        assert!(store.mark_otp_used(id, short_code, Utc::now()).await.unwrap());
        assert!(!store.mark_otp_used(id, short_code, Utc::now()).await.unwrap());
        assert!(store
            .unused_otp_by_short_code(Purpose::Voting, &record.short_code)
            .await
            .unwrap()
            .is_none());
    }

    #[rocket::async_test]
    async fn replaced_code_cannot_be_used_or_counted() {
        let store = MemoryStore::default();
        let event_id = Id::new();
        let old = record("jdoe@unb.ca", event_id);
        store.upsert_otp(&old).await.unwrap();
        let looked_up = store
            .unused_otp_by_short_code(Purpose::Voting, &old.short_code)
            .await
            .unwrap()
            .unwrap();

        // A re-request lands before the first verify finishes.
        let fresh = record("jdoe@unb.ca", event_id);
        store.upsert_otp(&fresh).await.unwrap();

        let attempts = store
            .increment_otp_attempts(looked_up.id, &looked_up.short_code)
            .await
            .unwrap();
        assert_eq!(attempts, None);
        assert!(!store
            .mark_otp_used(looked_up.id, &looked_up.short_code, Utc::now())
            .await
            .unwrap());

        let current = store
            .unused_otp_by_short_code(Purpose::Voting, &fresh.short_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.attempts, 0);
        assert!(store
            .mark_otp_used(current.id, &fresh.short_code, Utc::now())
            .await
            .unwrap());
    }

    #[rocket::async_test]
    async fn duplicate_votes_conflict() {
        let store = MemoryStore::default();
        let event_id = Id::new();
        let vote = Vote::example(event_id, "jdoe@unb.ca", Default::default());
        store.insert_vote(&vote).await.unwrap();

        let again = Vote::example(event_id, "jdoe@unb.ca", Default::default());
        assert!(matches!(
            store.insert_vote(&again).await,
            Err(Error::Conflict(_))
        ));
        assert_eq!(store.all_votes().len(), 1);
    }

    #[rocket::async_test]
    async fn withdrawal_applies_once() {
        let store = MemoryStore::default();
        let nomination = Nomination::example(Id::new());
        store.insert_nomination(&nomination).await.unwrap();

        let withdrawal = Withdrawal::new(&nomination.positions, Default::default(), Utc::now());
        assert!(store.apply_withdrawal(nomination.id, &withdrawal).await.unwrap());
        assert!(!store.apply_withdrawal(nomination.id, &withdrawal).await.unwrap());
    }

    #[rocket::async_test]
    async fn lockout_after_threshold() {
        let store = MemoryStore::default();
        let admin = Admin::example();
        store.insert_admin(&admin).await.unwrap();
        let until = Utc::now() + Duration::minutes(15);

        for _ in 0..2 {
            assert!(!store.record_login_failure(admin.id, 3, until).await.unwrap());
        }
        assert!(store.record_login_failure(admin.id, 3, until).await.unwrap());

        let locked = store.admin_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(locked.failed_logins, 0);
        assert_eq!(locked.locked_until, Some(until));

        store.reset_login_failures(admin.id).await.unwrap();
        let unlocked = store.admin_by_id(admin.id).await.unwrap().unwrap();
        assert!(!unlocked.is_locked(Utc::now()));
    }
}
