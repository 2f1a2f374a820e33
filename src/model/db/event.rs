use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{TimeWindow, WindowGate},
    mongodb::Id,
};

/// An event during which students may nominate themselves, and later
/// withdraw their nominations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationEvent {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub nomination_window: TimeWindow,
    pub withdrawal_window: TimeWindow,
    /// Lowercase email addresses allowed to nominate.
    pub eligible_emails: BTreeSet<String>,
    /// Master switch for window enforcement.
    pub enable_time_check: bool,
    pub enable_nomination_time: bool,
    pub enable_withdrawal_time: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NominationEvent {
    pub fn nomination_gate(&self) -> WindowGate {
        WindowGate {
            action: "nomination",
            window: self.nomination_window,
            enforced: self.enable_time_check && self.enable_nomination_time,
        }
    }

    pub fn withdrawal_gate(&self) -> WindowGate {
        WindowGate {
            action: "withdrawal",
            window: self.withdrawal_window,
            enforced: self.enable_time_check && self.enable_withdrawal_time,
        }
    }

    /// `email` must already be normalised to lowercase.
    pub fn is_eligible(&self, email: &str) -> bool {
        self.eligible_emails.contains(email)
    }
}

/// An event during which eligible students vote for candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingEvent {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub voting_window: TimeWindow,
    /// Lowercase email addresses allowed to vote.
    pub eligible_emails: BTreeSet<String>,
    pub enable_time_check: bool,
    pub enable_voting_time: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VotingEvent {
    pub fn voting_gate(&self) -> WindowGate {
        WindowGate {
            action: "voting",
            window: self.voting_window,
            enforced: self.enable_time_check && self.enable_voting_time,
        }
    }

    /// `email` must already be normalised to lowercase.
    pub fn is_eligible(&self, email: &str) -> bool {
        self.eligible_emails.contains(email)
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use chrono::Duration;

    use super::*;

    /// `now - 1 day ..= now + 1 day`.
    pub fn open_window() -> TimeWindow {
        let now = Utc::now();
        TimeWindow::new(now - Duration::days(1), now + Duration::days(1))
    }

    /// A window that closed yesterday.
    pub fn closed_window() -> TimeWindow {
        let now = Utc::now();
        TimeWindow::new(now - Duration::days(3), now - Duration::days(1))
    }

    pub fn eligible() -> BTreeSet<String> {
        ["jdoe@unb.ca", "asmith@unb.ca", "bwong@unb.ca"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    impl NominationEvent {
        pub fn example() -> Self {
            let now = Utc::now();
            Self {
                id: Id::new(),
                name: "Student Union General Election 2026".to_string(),
                slug: "su-general-2026".to_string(),
                description: Some("Nominations for the student union executive.".to_string()),
                rules: None,
                nomination_window: open_window(),
                withdrawal_window: open_window(),
                eligible_emails: eligible(),
                enable_time_check: true,
                enable_nomination_time: true,
                enable_withdrawal_time: true,
                is_active: true,
                created_at: now,
                updated_at: now,
            }
        }
    }

    impl VotingEvent {
        pub fn example() -> Self {
            let now = Utc::now();
            Self {
                id: Id::new(),
                name: "Student Union Vote 2026".to_string(),
                slug: "su-vote-2026".to_string(),
                description: None,
                voting_window: open_window(),
                eligible_emails: eligible(),
                enable_time_check: true,
                enable_voting_time: true,
                is_active: true,
                created_at: now,
                updated_at: now,
            }
        }
    }
}
