use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::otp::{Code, ShortCode},
    common::Purpose,
    mongodb::Id,
};

/// A pending one-time code for one (email, event, purpose).
///
/// There is at most one record per key: requesting a new code replaces the
/// previous one, resetting its attempts and used flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    pub email: String,
    pub event_id: Id,
    pub purpose: Purpose,
    pub otp: Code,
    pub short_code: ShortCode,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub ip_address: Option<String>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_locked(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}
