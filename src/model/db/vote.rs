use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{Position, Year},
    mongodb::Id,
};

/// A candidate standing in a voting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub event_id: Id,
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub faculty: String,
    pub year: Year,
    pub positions: BTreeSet<Position>,
}

impl Candidate {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn runs_for(&self, position: Position) -> bool {
        self.positions.contains(&position)
    }
}

/// A cast ballot. Votes are never modified once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub event_id: Id,
    /// Lowercase; unique together with `event_id`.
    pub voter_email: String,
    pub voter_first_name: String,
    pub voter_last_name: String,
    pub voter_student_id: String,
    pub voter_faculty: String,
    pub voter_year: Year,
    pub ballot: BTreeMap<Position, Id>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
