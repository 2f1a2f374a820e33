use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Issue, Result};

/// A period during which some action is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Check that the window is well-formed, reporting problems against
    /// the field names the client used.
    pub fn check(&self, start_field: &str, end_field: &str) -> Option<Issue> {
        (self.start >= self.end)
            .then(|| Issue::new(end_field, format!("must be after {start_field}")))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// A time window together with whether it is currently being enforced.
///
/// Admins can switch off enforcement, in which case the action is allowed
/// at any time.
#[derive(Debug, Clone, Copy)]
pub struct WindowGate {
    pub action: &'static str,
    pub window: TimeWindow,
    pub enforced: bool,
}

impl WindowGate {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        !self.enforced || self.window.contains(now)
    }

    /// Fail with an eligibility error if the window is enforced and closed.
    pub fn require_open(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_open(now) {
            Ok(())
        } else if now < self.window.start {
            Err(Error::Eligibility(format!(
                "The {} period has not started yet",
                self.action
            )))
        } else {
            Err(Error::Eligibility(format!(
                "The {} period has ended",
                self.action
            )))
        }
    }
}
