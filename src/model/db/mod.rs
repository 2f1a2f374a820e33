//! Types as they are stored in the database.

pub mod admin;
pub mod event;
pub mod nomination;
pub mod otp_record;
pub mod vote;

pub use admin::Admin;
pub use event::{NominationEvent, VotingEvent};
pub use nomination::{Nomination, Withdrawal};
pub use otp_record::OtpRecord;
pub use vote::{Candidate, Vote};
