use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, to_bson, to_document, Document},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, UpdateOptions},
    Database,
};
use rocket::futures::TryStreamExt;
use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    model::{
        api::otp::ShortCode,
        common::Purpose,
        db::{
            Admin, Candidate, Nomination, NominationEvent, OtpRecord, Vote, VotingEvent,
            Withdrawal,
        },
        mongodb::{is_duplicate_key_error, Coll, Id, MongoCollection},
    },
};

use super::{AdminStore, EventStore, TokenStore};

/// A store backed by a MongoDB database.
///
/// Uniqueness relies on the indexes created by
/// [`ensure_indexes_exist`](crate::model::mongodb::ensure_indexes_exist).
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// All documents matching `filter`, oldest first.
    async fn find_all<T>(&self, filter: Option<Document>) -> Result<Vec<T>>
    where
        T: MongoCollection + DeserializeOwned + Unpin + Send + Sync,
    {
        let oldest_first = FindOptions::builder().sort(doc! {"_id": 1}).build();
        Ok(self
            .coll::<T>()
            .find(filter, oldest_first)
            .await?
            .try_collect()
            .await?)
    }
}

/// Translate a duplicate key error into a conflict about `what`.
fn on_duplicate(what: &str) -> impl FnOnce(DbError) -> Error + '_ {
    move |err| {
        if is_duplicate_key_error(&err) {
            Error::Conflict(format!("{what} already exists"))
        } else {
            err.into()
        }
    }
}

#[rocket::async_trait]
impl EventStore for MongoStore {
    async fn insert_nomination_event(&self, event: &NominationEvent) -> Result<()> {
        self.coll::<NominationEvent>()
            .insert_one(event, None)
            .await
            .map_err(on_duplicate("An event with this slug"))?;
        Ok(())
    }

    async fn replace_nomination_event(&self, event: &NominationEvent) -> Result<()> {
        let result = self
            .coll::<NominationEvent>()
            .replace_one(event.id.as_doc(), event, None)
            .await
            .map_err(on_duplicate("An event with this slug"))?;
        if result.matched_count == 0 {
            return Err(Error::not_found("Nomination event"));
        }
        Ok(())
    }

    async fn nomination_event(&self, id: Id) -> Result<Option<NominationEvent>> {
        Ok(self
            .coll::<NominationEvent>()
            .find_one(id.as_doc(), None)
            .await?)
    }

    async fn nomination_event_by_slug(&self, slug: &str) -> Result<Option<NominationEvent>> {
        Ok(self
            .coll::<NominationEvent>()
            .find_one(doc! {"slug": slug}, None)
            .await?)
    }

    async fn nomination_events(&self) -> Result<Vec<NominationEvent>> {
        self.find_all(None).await
    }

    async fn insert_voting_event(&self, event: &VotingEvent) -> Result<()> {
        self.coll::<VotingEvent>()
            .insert_one(event, None)
            .await
            .map_err(on_duplicate("An event with this slug"))?;
        Ok(())
    }

    async fn replace_voting_event(&self, event: &VotingEvent) -> Result<()> {
        let result = self
            .coll::<VotingEvent>()
            .replace_one(event.id.as_doc(), event, None)
            .await
            .map_err(on_duplicate("An event with this slug"))?;
        if result.matched_count == 0 {
            return Err(Error::not_found("Voting event"));
        }
        Ok(())
    }

    async fn voting_event(&self, id: Id) -> Result<Option<VotingEvent>> {
        Ok(self.coll::<VotingEvent>().find_one(id.as_doc(), None).await?)
    }

    async fn voting_event_by_slug(&self, slug: &str) -> Result<Option<VotingEvent>> {
        Ok(self
            .coll::<VotingEvent>()
            .find_one(doc! {"slug": slug}, None)
            .await?)
    }

    async fn voting_events(&self) -> Result<Vec<VotingEvent>> {
        self.find_all(None).await
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.coll::<Candidate>().insert_one(candidate, None).await?;
        Ok(())
    }

    async fn candidates(&self, event_id: Id) -> Result<Vec<Candidate>> {
        self.find_all(Some(doc! {"eventId": event_id})).await
    }

    async fn insert_nomination(&self, nomination: &Nomination) -> Result<()> {
        self.coll::<Nomination>()
            .insert_one(nomination, None)
            .await
            .map_err(on_duplicate("A nomination for this email"))?;
        Ok(())
    }

    async fn nomination_by_email(&self, event_id: Id, email: &str) -> Result<Option<Nomination>> {
        Ok(self
            .coll::<Nomination>()
            .find_one(doc! {"eventId": event_id, "email": email}, None)
            .await?)
    }

    async fn nomination_by_withdrawal_token(&self, token: &str) -> Result<Option<Nomination>> {
        Ok(self
            .coll::<Nomination>()
            .find_one(doc! {"withdrawalToken": token}, None)
            .await?)
    }

    async fn nominations(&self, event_id: Id) -> Result<Vec<Nomination>> {
        self.find_all(Some(doc! {"eventId": event_id})).await
    }

    async fn apply_withdrawal(&self, id: Id, withdrawal: &Withdrawal) -> Result<bool> {
        let never_withdrawn = doc! {
            "_id": id,
            "isWithdrawn": false,
            "withdrawnPositions": { "$size": 0 },
        };
        let mut set = doc! {
            "withdrawnPositions": to_bson(&withdrawal.withdrawn)?,
            "withdrawnAt": to_bson(&withdrawal.at)?,
        };
        if withdrawal.is_complete() {
            set.insert("isWithdrawn", true);
        } else {
            set.insert("positions", to_bson(&withdrawal.kept)?);
        }

        let result = self
            .coll::<Nomination>()
            .update_one(never_withdrawn, doc! {"$set": set}, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<()> {
        self.coll::<Vote>()
            .insert_one(vote, None)
            .await
            .map_err(on_duplicate("A vote for this email"))?;
        Ok(())
    }

    async fn vote_by_email(&self, event_id: Id, email: &str) -> Result<Option<Vote>> {
        Ok(self
            .coll::<Vote>()
            .find_one(doc! {"eventId": event_id, "voterEmail": email}, None)
            .await?)
    }

    async fn votes(&self, event_id: Id) -> Result<Vec<Vote>> {
        self.find_all(Some(doc! {"eventId": event_id})).await
    }
}

#[rocket::async_trait]
impl TokenStore for MongoStore {
    async fn upsert_otp(&self, record: &OtpRecord) -> Result<()> {
        let mut fields = to_document(record)?;
        let id = fields.remove("_id");
        let key = doc! {
            "email": record.email.as_str(),
            "eventId": record.event_id,
            "purpose": record.purpose,
        };
        let upsert = UpdateOptions::builder().upsert(true).build();
        self.coll::<OtpRecord>()
            .update_one(
                key,
                doc! {"$set": fields, "$setOnInsert": {"_id": id}},
                upsert,
            )
            .await?;
        Ok(())
    }

    async fn unused_otp_by_short_code(
        &self,
        purpose: Purpose,
        short_code: &ShortCode,
    ) -> Result<Option<OtpRecord>> {
        let filter = doc! {
            "shortCode": short_code.as_str(),
            "purpose": purpose,
            "isUsed": false,
        };
        Ok(self.coll::<OtpRecord>().find_one(filter, None).await?)
    }

    async fn increment_otp_attempts(
        &self,
        id: Id,
        short_code: &ShortCode,
    ) -> Result<Option<u32>> {
        let after = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let current = doc! {
            "_id": id,
            "shortCode": short_code.as_str(),
        };
        let record = self
            .coll::<OtpRecord>()
            .find_one_and_update(current, doc! {"$inc": {"attempts": 1}}, after)
            .await?;
        Ok(record.map(|record| record.attempts))
    }

    async fn mark_otp_used(
        &self,
        id: Id,
        short_code: &ShortCode,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let unused_and_unlocked = doc! {
            "_id": id,
            "shortCode": short_code.as_str(),
            "isUsed": false,
            "$expr": { "$lt": ["$attempts", "$maxAttempts"] },
        };
        let update = doc! {
            "$set": { "isUsed": true, "usedAt": to_bson(&at)? },
        };
        let result = self
            .coll::<OtpRecord>()
            .update_one(unused_and_unlocked, update, None)
            .await?;
        Ok(result.modified_count == 1)
    }
}

#[rocket::async_trait]
impl AdminStore for MongoStore {
    async fn insert_admin(&self, admin: &Admin) -> Result<()> {
        self.coll::<Admin>()
            .insert_one(admin, None)
            .await
            .map_err(on_duplicate("An admin with this username"))?;
        Ok(())
    }

    async fn admin_by_id(&self, id: Id) -> Result<Option<Admin>> {
        Ok(self.coll::<Admin>().find_one(id.as_doc(), None).await?)
    }

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        Ok(self
            .coll::<Admin>()
            .find_one(doc! {"username": username}, None)
            .await?)
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        self.find_all(None).await
    }

    async fn record_login_failure(
        &self,
        id: Id,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<bool> {
        let after = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let admin = self
            .coll::<Admin>()
            .find_one_and_update(id.as_doc(), doc! {"$inc": {"failedLogins": 1}}, after)
            .await?
            .ok_or_else(|| Error::not_found("Admin"))?;
        if admin.failed_logins < threshold {
            return Ok(false);
        }

        let lock = doc! {
            "$set": { "failedLogins": 0, "lockedUntil": to_bson(&lock_until)? },
        };
        self.coll::<Admin>()
            .update_one(id.as_doc(), lock, None)
            .await?;
        Ok(true)
    }

    async fn reset_login_failures(&self, id: Id) -> Result<()> {
        let reset = doc! {
            "$set": { "failedLogins": 0, "lockedUntil": null },
        };
        self.coll::<Admin>()
            .update_one(id.as_doc(), reset, None)
            .await?;
        Ok(())
    }
}
