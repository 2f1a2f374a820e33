use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    admin::Admin,
    event::{NominationEvent, VotingEvent},
    nomination::Nomination,
    otp_record::OtpRecord,
    vote::{Candidate, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Admin {
    const NAME: &'static str = "admins";
}

impl MongoCollection for NominationEvent {
    const NAME: &'static str = "nomination_events";
}

impl MongoCollection for VotingEvent {
    const NAME: &'static str = "voting_events";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for Nomination {
    const NAME: &'static str = "nominations";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for OtpRecord {
    const NAME: &'static str = "otp_records";
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes are what make duplicate submissions impossible under
/// concurrent requests, so startup fails if they cannot be created.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let unique_index = |keys| {
        IndexModel::builder()
            .keys(keys)
            .options(unique.clone())
            .build()
    };

    // Admin collection.
    Coll::<Admin>::from_db(db)
        .create_index(unique_index(doc! {"username": 1}), None)
        .await?;

    // Nomination event collection.
    Coll::<NominationEvent>::from_db(db)
        .create_index(unique_index(doc! {"slug": 1}), None)
        .await?;

    // Voting event collection.
    Coll::<VotingEvent>::from_db(db)
        .create_index(unique_index(doc! {"slug": 1}), None)
        .await?;

    // OTP collection: one live code per key, short codes unique.
    let otp_records = Coll::<OtpRecord>::from_db(db);
    otp_records
        .create_index(
            unique_index(doc! {"email": 1, "eventId": 1, "purpose": 1}),
            None,
        )
        .await?;
    otp_records
        .create_index(unique_index(doc! {"shortCode": 1}), None)
        .await?;

    // Nomination collection.
    let nominations = Coll::<Nomination>::from_db(db);
    nominations
        .create_index(unique_index(doc! {"eventId": 1, "email": 1}), None)
        .await?;
    nominations
        .create_index(unique_index(doc! {"withdrawalToken": 1}), None)
        .await?;

    // Vote collection.
    Coll::<Vote>::from_db(db)
        .create_index(unique_index(doc! {"eventId": 1, "voterEmail": 1}), None)
        .await?;

    // Candidate collection.
    Coll::<Candidate>::from_db(db)
        .create_index(IndexModel::builder().keys(doc! {"eventId": 1}).build(), None)
        .await?;

    Ok(())
}
