use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{Position, Year},
    mongodb::Id,
};

/// A student's nomination for one or more positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nomination {
    #[serde(rename = "_id")]
    pub id: Id,
    pub event_id: Id,
    /// Lowercase; unique together with `event_id`.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub faculty: String,
    pub year: Year,
    pub positions: BTreeSet<Position>,
    pub is_withdrawn: bool,
    pub withdrawn_positions: BTreeSet<Position>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    /// Long-lived secret that authorises a later withdrawal request.
    pub withdrawal_token: String,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Nomination {
    /// Whether any withdrawal, complete or partial, has already happened.
    pub fn has_withdrawn(&self) -> bool {
        self.is_withdrawn || !self.withdrawn_positions.is_empty()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The outcome of a withdrawal, applied to a nomination in one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// Positions the nominee is still running for.
    pub kept: BTreeSet<Position>,
    /// Positions given up, recorded for audit.
    pub withdrawn: BTreeSet<Position>,
    pub at: DateTime<Utc>,
}

impl Withdrawal {
    /// Split `original` into the `kept` positions and the rest.
    pub fn new(original: &BTreeSet<Position>, kept: BTreeSet<Position>, at: DateTime<Utc>) -> Self {
        let withdrawn = original.difference(&kept).copied().collect();
        Self { kept, withdrawn, at }
    }

    /// A complete withdrawal keeps no positions.
    pub fn is_complete(&self) -> bool {
        self.kept.is_empty()
    }

    /// Apply to a nomination. A complete withdrawal keeps the original
    /// positions on record; a partial one replaces them with those kept.
    pub fn apply(&self, nomination: &mut Nomination) {
        if self.is_complete() {
            nomination.is_withdrawn = true;
        } else {
            nomination.positions = self.kept.clone();
        }
        nomination.withdrawn_positions = self.withdrawn.clone();
        nomination.withdrawn_at = Some(self.at);
    }
}
