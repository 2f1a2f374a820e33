use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    common::Position,
    db::{Candidate, Vote, VotingEvent},
    mongodb::Id,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally {
    pub candidate_id: Id,
    pub name: String,
    pub votes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResults {
    pub position: Position,
    /// Most votes first, ties broken by name.
    pub candidates: Vec<CandidateTally>,
}

/// Vote counts for every position of a voting event, computed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResults {
    pub event_id: Id,
    pub event_name: String,
    pub total_votes: usize,
    pub eligible_voters: usize,
    /// `total_votes / eligible_voters`, or zero when nobody is eligible.
    pub turnout: f64,
    pub positions: Vec<PositionResults>,
}

impl EventResults {
    pub fn tally(event: &VotingEvent, candidates: &[Candidate], votes: &[Vote]) -> Self {
        let mut counts: HashMap<(Position, Id), usize> = HashMap::new();
        for vote in votes {
            for (&position, &candidate_id) in &vote.ballot {
                *counts.entry((position, candidate_id)).or_default() += 1;
            }
        }

        let positions = Position::ALL
            .into_iter()
            .map(|position| {
                let mut tallies: Vec<_> = candidates
                    .iter()
                    .filter(|candidate| candidate.runs_for(position))
                    .map(|candidate| CandidateTally {
                        candidate_id: candidate.id,
                        name: candidate.full_name(),
                        votes: counts.get(&(position, candidate.id)).copied().unwrap_or(0),
                    })
                    .collect();
                tallies.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.name.cmp(&b.name)));
                PositionResults {
                    position,
                    candidates: tallies,
                }
            })
            .collect();

        let total_votes = votes.len();
        let eligible_voters = event.eligible_emails.len();
        let turnout = if eligible_voters == 0 {
            0.0
        } else {
            total_votes as f64 / eligible_voters as f64
        };

        Self {
            event_id: event.id,
            event_name: event.name.clone(),
            total_votes,
            eligible_voters,
            turnout,
            positions,
        }
    }
}
