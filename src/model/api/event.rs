//! Event bodies sent by admins, and event descriptions sent to everyone.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Issue, Result},
    model::{
        api::{
            nomination::StudentDetails,
            validation::{self, Issues},
        },
        common::{Position, TimeWindow, Year},
        db::{Candidate, NominationEvent, VotingEvent},
        mongodb::Id,
    },
};

const NAME_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 5000;

fn default_true() -> bool {
    true
}

/// Fields shared by both kinds of event body.
fn check_common(
    issues: &mut Issues,
    name: &str,
    slug: &str,
    description: Option<&str>,
) -> (Option<String>, Option<String>, Option<String>) {
    let name = issues.check("name", validation::required_text(name, NAME_MAX));
    let slug = issues.check("slug", validation::slug(slug));
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| issues.check("description", validation::required_text(d, DESCRIPTION_MAX)));
    (name, slug, description)
}

/// A window given as two optional instants, both required and ordered.
fn check_window(
    issues: &mut Issues,
    (start_field, start): (&str, Option<DateTime<Utc>>),
    (end_field, end): (&str, Option<DateTime<Utc>>),
) -> Option<TimeWindow> {
    if start.is_none() {
        issues.push(Issue::new(start_field, "is required"));
    }
    if end.is_none() {
        issues.push(Issue::new(end_field, "is required"));
    }
    let window = TimeWindow::new(start?, end?);
    match window.check(start_field, end_field) {
        Some(issue) => {
            issues.push(issue);
            None
        }
        None => Some(window),
    }
}

/// Normalise each eligible email, reporting bad ones by index.
fn check_eligible(issues: &mut Issues, emails: &[String]) -> BTreeSet<String> {
    emails
        .iter()
        .enumerate()
        .filter_map(|(i, email)| issues.check(format!("eligibleEmails[{i}]"), validation::email(email)))
        .collect()
}

/// A nomination event as created or updated by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationEventSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Option<String>,
    #[serde(default)]
    pub nomination_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nomination_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub withdrawal_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub withdrawal_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub eligible_emails: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_time_check: bool,
    #[serde(default = "default_true")]
    pub enable_nomination_time: bool,
    #[serde(default = "default_true")]
    pub enable_withdrawal_time: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NominationEventSpec {
    /// Validate the body into an event with the given identity. Updates pass
    /// the existing ID and creation time.
    pub fn into_event(
        self,
        id: Id,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<NominationEvent> {
        let mut issues = Issues::new();
        let (name, slug, description) =
            check_common(&mut issues, &self.name, &self.slug, self.description.as_deref());
        let rules = self
            .rules
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .and_then(|r| issues.check("rules", validation::required_text(r, DESCRIPTION_MAX)));
        let nomination_window = check_window(
            &mut issues,
            ("nominationStart", self.nomination_start),
            ("nominationEnd", self.nomination_end),
        );
        let withdrawal_window = check_window(
            &mut issues,
            ("withdrawalStart", self.withdrawal_start),
            ("withdrawalEnd", self.withdrawal_end),
        );
        let eligible_emails = check_eligible(&mut issues, &self.eligible_emails);

        let event = (|| {
            Some(NominationEvent {
                id,
                name: name?,
                slug: slug?,
                description,
                rules,
                nomination_window: nomination_window?,
                withdrawal_window: withdrawal_window?,
                eligible_emails,
                enable_time_check: self.enable_time_check,
                enable_nomination_time: self.enable_nomination_time,
                enable_withdrawal_time: self.enable_withdrawal_time,
                is_active: self.is_active,
                created_at,
                updated_at: now,
            })
        })();
        issues.finish_with(event)
    }
}

/// A voting event as created or updated by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingEventSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub voting_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voting_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub eligible_emails: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_time_check: bool,
    #[serde(default = "default_true")]
    pub enable_voting_time: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl VotingEventSpec {
    pub fn into_event(
        self,
        id: Id,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<VotingEvent> {
        let mut issues = Issues::new();
        let (name, slug, description) =
            check_common(&mut issues, &self.name, &self.slug, self.description.as_deref());
        let voting_window = check_window(
            &mut issues,
            ("votingStart", self.voting_start),
            ("votingEnd", self.voting_end),
        );
        let eligible_emails = check_eligible(&mut issues, &self.eligible_emails);

        let event = (|| {
            Some(VotingEvent {
                id,
                name: name?,
                slug: slug?,
                description,
                voting_window: voting_window?,
                eligible_emails,
                enable_time_check: self.enable_time_check,
                enable_voting_time: self.enable_voting_time,
                is_active: self.is_active,
                created_at,
                updated_at: now,
            })
        })();
        issues.finish_with(event)
    }
}

/// A candidate as added by an admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidateSpec {
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub faculty: String,
    pub year: String,
    pub positions: Vec<String>,
}

impl CandidateSpec {
    pub fn into_candidate(self, event_id: Id) -> Result<Candidate> {
        let mut issues = Issues::new();
        let student = StudentDetails::check(
            &mut issues,
            ["firstName", "lastName", "studentId", "faculty", "year"],
            [
                self.first_name.as_str(),
                self.last_name.as_str(),
                self.student_id.as_str(),
                self.faculty.as_str(),
                self.year.as_str(),
            ],
        );
        let positions = issues.check("positions", validation::positions(&self.positions, true));
        let candidate = student.zip(positions).map(|(student, positions)| Candidate {
            id: Id::new(),
            event_id,
            first_name: student.first_name,
            last_name: student.last_name,
            student_id: student.student_id,
            faculty: student.faculty,
            year: student.year,
            positions,
        });
        issues.finish_with(candidate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: Id,
    pub first_name: String,
    pub last_name: String,
    pub faculty: String,
    pub year: Year,
    pub positions: BTreeSet<Position>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            faculty: candidate.faculty,
            year: candidate.year,
            positions: candidate.positions,
        }
    }
}

/// A nomination event as described to clients. Admins additionally see the
/// eligibility list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationEventDescription {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub nomination_window: TimeWindow,
    pub withdrawal_window: TimeWindow,
    pub enable_time_check: bool,
    pub enable_nomination_time: bool,
    pub enable_withdrawal_time: bool,
    pub is_active: bool,
    pub nomination_open: bool,
    pub withdrawal_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligible_emails: Option<BTreeSet<String>>,
}

impl NominationEventDescription {
    pub fn public(event: NominationEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: event.id,
            nomination_open: event.is_active && event.nomination_gate().is_open(now),
            withdrawal_open: event.is_active && event.withdrawal_gate().is_open(now),
            name: event.name,
            slug: event.slug,
            description: event.description,
            rules: event.rules,
            nomination_window: event.nomination_window,
            withdrawal_window: event.withdrawal_window,
            enable_time_check: event.enable_time_check,
            enable_nomination_time: event.enable_nomination_time,
            enable_withdrawal_time: event.enable_withdrawal_time,
            is_active: event.is_active,
            eligible_emails: None,
        }
    }

    pub fn admin(event: NominationEvent, now: DateTime<Utc>) -> Self {
        let eligible = event.eligible_emails.clone();
        Self {
            eligible_emails: Some(eligible),
            ..Self::public(event, now)
        }
    }
}

/// A voting event as described to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingEventDescription {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub voting_window: TimeWindow,
    pub enable_time_check: bool,
    pub enable_voting_time: bool,
    pub is_active: bool,
    pub voting_open: bool,
    pub candidates: Vec<CandidateDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligible_emails: Option<BTreeSet<String>>,
}

impl VotingEventDescription {
    pub fn public(event: VotingEvent, candidates: Vec<Candidate>, now: DateTime<Utc>) -> Self {
        Self {
            id: event.id,
            voting_open: event.is_active && event.voting_gate().is_open(now),
            name: event.name,
            slug: event.slug,
            description: event.description,
            voting_window: event.voting_window,
            enable_time_check: event.enable_time_check,
            enable_voting_time: event.enable_voting_time,
            is_active: event.is_active,
            candidates: candidates.into_iter().map(Into::into).collect(),
            eligible_emails: None,
        }
    }

    pub fn admin(event: VotingEvent, candidates: Vec<Candidate>, now: DateTime<Utc>) -> Self {
        let eligible = event.eligible_emails.clone();
        Self {
            eligible_emails: Some(eligible),
            ..Self::public(event, candidates, now)
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::error::Error;

    fn fields(err: Error) -> Vec<String> {
        match err {
            Error::Validation { issues, .. } => issues.into_iter().map(|i| i.field).collect(),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn eligible_emails_are_lowercased() {
        let now = Utc::now();
        let event = NominationEventSpec::example()
            .into_event(Id::new(), now, now)
            .unwrap();
        assert!(event.is_eligible("jdoe@unb.ca"));
        assert!(!event.is_eligible("JDoe@unb.ca"));
    }

    #[test]
    fn inverted_windows_are_rejected() {
        let now = Utc::now();
        let spec = NominationEventSpec {
            withdrawal_end: Some(now - Duration::days(5)),
            ..NominationEventSpec::example()
        };
        let err = spec.into_event(Id::new(), now, now).unwrap_err();
        assert_eq!(fields(err), ["withdrawalEnd"]);
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let spec: VotingEventSpec = rocket::serde::json::from_str("{}").unwrap();
        let now = Utc::now();
        let err = spec.into_event(Id::new(), now, now).unwrap_err();
        assert_eq!(fields(err), ["name", "slug", "votingStart", "votingEnd"]);
    }

    #[test]
    fn bad_slug_is_rejected() {
        let now = Utc::now();
        let spec = VotingEventSpec {
            slug: "Has Spaces".to_string(),
            ..VotingEventSpec::example()
        };
        assert_eq!(
            fields(spec.into_event(Id::new(), now, now).unwrap_err()),
            ["slug"]
        );
    }

    #[test]
    fn public_description_hides_eligibility() {
        let now = Utc::now();
        let event = VotingEventSpec::example()
            .into_event(Id::new(), now, now)
            .unwrap();
        let public = VotingEventDescription::public(event.clone(), vec![], now);
        assert!(public.eligible_emails.is_none());
        assert!(public.voting_open);
        let admin = VotingEventDescription::admin(event, vec![], now);
        assert_eq!(admin.eligible_emails.map(|e| e.len()), Some(2));
    }

    #[test]
    fn candidates_are_validated() {
        let event_id = Id::new();
        let candidate = CandidateSpec::example().into_candidate(event_id).unwrap();
        assert_eq!(candidate.event_id, event_id);

        let spec = CandidateSpec {
            positions: vec![],
            ..CandidateSpec::example()
        };
        assert_eq!(fields(spec.into_candidate(event_id).unwrap_err()), ["positions"]);
    }
}
