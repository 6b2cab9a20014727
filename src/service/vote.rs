//! Voting ledger
//!
//! One vote per (candidate, client) inside a rolling 24 hour window, only
//! while voting is open.

use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::data::{Database, NewVote, VOTE_ALREADY_RECORDED, Vote, VoteOutcome};
use crate::error::AppError;
use crate::validation::{check_lengths, clean};

/// Dedup window per (candidate, client)
pub const VOTE_WINDOW_HOURS: i64 = 24;

/// Optional voter details attached to a vote
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterInfo {
    pub voter_name: Option<String>,
    pub voter_contact: Option<String>,
}

/// Vote service
pub struct VoteService {
    db: Arc<Database>,
}

impl VoteService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn count(outcome: &str) {
        crate::metrics::VOTES_TOTAL
            .with_label_values(&[outcome])
            .inc();
    }

    /// Cast a vote for `candidate_id` from `client_id`.
    ///
    /// # Errors
    /// - `GateClosed` unless voting is enabled and the competition is open
    /// - `NotFound` when the candidate does not exist
    /// - `Conflict` when this client already voted for the candidate in the window
    pub async fn cast_vote(
        &self,
        candidate_id: i64,
        voter: VoterInfo,
        client_id: &str,
    ) -> Result<Vote, AppError> {
        let settings = self.db.get_settings().await?;
        if !settings.voting_open() {
            Self::count("gate_closed");
            return Err(AppError::GateClosed("Voting is closed".to_string()));
        }

        let voter_name = clean(voter.voter_name);
        let voter_contact = clean(voter.voter_contact);
        check_lengths([
            ("voterName", voter_name.as_deref()),
            ("voterContact", voter_contact.as_deref()),
        ])?;

        let vote = NewVote {
            candidate_id,
            voter_name,
            voter_contact,
            ip: client_id.to_string(),
            created_at: Utc::now(),
        };

        match self
            .db
            .insert_vote_if_absent(&vote, Duration::hours(VOTE_WINDOW_HOURS))
            .await?
        {
            VoteOutcome::Recorded(vote) => {
                Self::count("recorded");
                tracing::info!(candidate_id, vote_id = vote.id, "Vote recorded");
                Ok(vote)
            }
            VoteOutcome::CandidateMissing => {
                Self::count("not_found");
                Err(AppError::not_found("Candidate not found"))
            }
            VoteOutcome::Duplicate => {
                Self::count("duplicate");
                tracing::debug!(candidate_id, client_id, "Duplicate vote rejected");
                Err(AppError::conflict(VOTE_ALREADY_RECORDED))
            }
        }
    }
}
