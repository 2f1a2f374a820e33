use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Issue, Result},
    model::{
        api::{
            nomination::{location, StudentDetails},
            validation::Issues,
        },
        common::Position,
        db::{Candidate, Vote},
        mongodb::Id,
    },
};

/// The ballot form as submitted: the voter's details, and a candidate ID
/// for each position voted on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BallotForm {
    pub voter_first_name: String,
    pub voter_last_name: String,
    pub voter_student_id: String,
    pub voter_faculty: String,
    pub voter_year: String,
    pub ballot: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A ballot form that passed validation. Candidate IDs are not yet checked
/// against the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotDetails {
    pub voter: StudentDetails,
    pub choices: BTreeMap<Position, String>,
    pub location: Option<String>,
}

impl BallotForm {
    pub fn validate(&self) -> Result<BallotDetails> {
        let mut issues = Issues::new();
        let voter = StudentDetails::check(
            &mut issues,
            [
                "voterFirstName",
                "voterLastName",
                "voterStudentId",
                "voterFaculty",
                "voterYear",
            ],
            [
                self.voter_first_name.as_str(),
                self.voter_last_name.as_str(),
                self.voter_student_id.as_str(),
                self.voter_faculty.as_str(),
                self.voter_year.as_str(),
            ],
        );

        if self.ballot.is_empty() {
            issues.push(Issue::new("ballot", "select at least one candidate"));
        }
        let mut choices = BTreeMap::new();
        for (position, candidate) in &self.ballot {
            if let Some(position) = issues.check(
                format!("ballot.{position}"),
                position.parse::<Position>().map_err(|e| e.to_string()),
            ) {
                choices.insert(position, candidate.trim().to_string());
            }
        }
        let location = location(&mut issues, self.location.as_deref());

        issues.finish_with(voter.map(|voter| BallotDetails {
            voter,
            choices,
            location,
        }))
    }
}

impl BallotDetails {
    /// Resolve every choice to a candidate of the event who runs for that
    /// position, failing with "Invalid candidate selection" otherwise.
    pub fn resolve<'c>(
        &self,
        candidates: &'c [Candidate],
    ) -> Result<BTreeMap<Position, &'c Candidate>> {
        let by_id: HashMap<Id, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();
        let mut resolved = BTreeMap::new();
        let mut issues = Vec::new();
        for (&position, raw_id) in &self.choices {
            let candidate = raw_id
                .parse::<Id>()
                .ok()
                .and_then(|id| by_id.get(&id).copied())
                .filter(|candidate| candidate.runs_for(position));
            match candidate {
                Some(candidate) => {
                    resolved.insert(position, candidate);
                }
                None => issues.push(Issue::new(
                    format!("ballot.{position}"),
                    "is not a candidate for this position",
                )),
            }
        }
        if !issues.is_empty() {
            return Err(Error::Validation {
                message: "Invalid candidate selection".to_string(),
                issues,
            });
        }
        Ok(resolved)
    }
}

/// One line of a vote receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub position: Position,
    pub candidate_id: Id,
    pub candidate_name: String,
}

/// Returned to the voter once their vote is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub id: Id,
    pub event_id: Id,
    pub choices: Vec<Choice>,
    pub created_at: DateTime<Utc>,
}

impl VoteReceipt {
    pub fn new(vote: &Vote, resolved: &BTreeMap<Position, &Candidate>) -> Self {
        let choices = resolved
            .iter()
            .map(|(&position, candidate)| Choice {
                position,
                candidate_id: candidate.id,
                candidate_name: candidate.full_name(),
            })
            .collect();
        Self {
            id: vote.id,
            event_id: vote.event_id,
            choices,
            created_at: vote.created_at,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_positions_are_field_errors() {
        let mut form = BallotForm::example(&[]);
        form.ballot.insert("Treasurer".to_string(), Id::new().to_string());
        match form.validate() {
            Err(Error::Validation { message, issues }) => {
                assert_eq!(message, "Validation failed");
                assert_eq!(issues[0].field, "ballot.Treasurer");
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn empty_ballot_is_rejected() {
        assert!(BallotForm::example(&[]).validate().is_err());
    }

    #[test]
    fn choices_resolve_against_event_candidates() {
        let event_id = Id::new();
        let alice = Candidate::example(event_id, "Alice", &[Position::President]);
        let bob = Candidate::example(event_id, "Bob", &[Position::VicePresidentFinance]);
        let candidates = vec![alice.clone(), bob.clone()];

        let details = BallotForm::example(&[
            (Position::President, alice.id),
            (Position::VicePresidentFinance, bob.id),
        ])
        .validate()
        .unwrap();
        let resolved = details.resolve(&candidates).unwrap();
        assert_eq!(resolved[&Position::President].id, alice.id);
        assert_eq!(resolved[&Position::VicePresidentFinance].id, bob.id);
    }

    #[test]
    fn foreign_or_misplaced_candidates_are_invalid() {
        let event_id = Id::new();
        let alice = Candidate::example(event_id, "Alice", &[Position::President]);
        let stranger = Candidate::example(Id::new(), "Eve", &[Position::President]);
        let candidates = vec![alice.clone()];

        for ballot in [
            vec![(Position::President, stranger.id)],
            vec![(Position::VicePresidentFinance, alice.id)],
        ] {
            let details = BallotForm::example(&ballot).validate().unwrap();
            match details.resolve(&candidates) {
                Err(Error::Validation { message, .. }) => {
                    assert_eq!(message, "Invalid candidate selection")
                }
                other => panic!("expected invalid selection, got {other:?}"),
            }
        }

        let mut garbage = BallotForm::example(&[]);
        garbage
            .ballot
            .insert("President".to_string(), "not-an-id".to_string());
        let details = garbage.validate().unwrap();
        assert!(details.resolve(&candidates).is_err());
    }
}
