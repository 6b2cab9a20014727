//! Ranking and aggregation
//!
//! Read-only views recomputed from the ledgers on every call. The database
//! supplies raw per-candidate tallies; ordering, rounding and statistics are
//! pure functions here.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::data::{CandidateTally, Database};
use crate::error::AppError;

/// Size of the qualified set
pub const QUALIFIED_COUNT: usize = 10;

/// One row of the public results board
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub id: i64,
    pub full_name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub photo_url: Option<String>,
    pub total_votes: i64,
    /// 0 when the candidate has no scores
    pub average_score: f64,
    pub passages: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionStats {
    pub total_candidates: usize,
    pub total_votes: i64,
    pub countries: usize,
    pub cities: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicResults {
    pub candidates: Vec<ResultEntry>,
    pub stats: CompetitionStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummaryEntry {
    pub id: i64,
    pub full_name: String,
    pub total_votes: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRankingEntry {
    pub id: i64,
    pub full_name: String,
    /// `None` when the candidate has no scores
    pub average_score: Option<f64>,
    pub passages: i64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn by_votes_then_name(a: &CandidateTally, b: &CandidateTally) -> Ordering {
    b.total_votes
        .cmp(&a.total_votes)
        .then_with(|| a.full_name.cmp(&b.full_name))
}

/// Average descending with unscored last, then passages descending, then name
fn by_score(a: &ScoreRankingEntry, b: &ScoreRankingEntry) -> Ordering {
    let average = match (a.average_score, b.average_score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    average
        .then_with(|| b.passages.cmp(&a.passages))
        .then_with(|| a.full_name.cmp(&b.full_name))
}

/// Count distinct non-empty values, ignoring case and surrounding spaces
fn distinct_count<'a>(values: impl Iterator<Item = Option<&'a str>>) -> usize {
    values
        .flatten()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

pub fn compute_stats(tallies: &[CandidateTally]) -> CompetitionStats {
    CompetitionStats {
        total_candidates: tallies.len(),
        total_votes: tallies.iter().map(|t| t.total_votes).sum(),
        countries: distinct_count(tallies.iter().map(|t| t.country.as_deref())),
        cities: distinct_count(tallies.iter().map(|t| t.city.as_deref())),
    }
}

pub fn public_results(mut tallies: Vec<CandidateTally>) -> PublicResults {
    let stats = compute_stats(&tallies);
    tallies.sort_by(by_votes_then_name);

    let candidates = tallies
        .into_iter()
        .map(|t| ResultEntry {
            id: t.id,
            full_name: t.full_name,
            city: t.city,
            country: t.country,
            photo_url: t.photo_url,
            total_votes: t.total_votes,
            average_score: t.average_score.map(round2).unwrap_or(0.0),
            passages: t.passages,
        })
        .collect();

    PublicResults { candidates, stats }
}

/// Top candidates by votes; ties keep registration (id) order
pub fn qualified_ids(tallies: &[CandidateTally], count: usize) -> Vec<i64> {
    let mut ranked: Vec<&CandidateTally> = tallies.iter().collect();
    ranked.sort_by(|a, b| b.total_votes.cmp(&a.total_votes).then(a.id.cmp(&b.id)));
    ranked.into_iter().take(count).map(|t| t.id).collect()
}

pub fn votes_summary(mut tallies: Vec<CandidateTally>) -> Vec<VoteSummaryEntry> {
    tallies.sort_by(by_votes_then_name);
    tallies
        .into_iter()
        .map(|t| VoteSummaryEntry {
            id: t.id,
            full_name: t.full_name,
            total_votes: t.total_votes,
        })
        .collect()
}

pub fn score_ranking(tallies: Vec<CandidateTally>) -> Vec<ScoreRankingEntry> {
    let mut entries: Vec<ScoreRankingEntry> = tallies
        .into_iter()
        .map(|t| ScoreRankingEntry {
            id: t.id,
            full_name: t.full_name,
            average_score: t.average_score.map(round2),
            passages: t.passages,
        })
        .collect();
    entries.sort_by(by_score);
    entries
}

/// Ranking service
pub struct RankingService {
    db: Arc<Database>,
}

impl RankingService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn public_results(&self) -> Result<PublicResults, AppError> {
        let results = public_results(self.db.candidate_tallies().await?);
        crate::metrics::CANDIDATES_TOTAL.set(results.stats.total_candidates as i64);
        Ok(results)
    }

    pub async fn qualified_ids(&self) -> Result<Vec<i64>, AppError> {
        Ok(qualified_ids(
            &self.db.candidate_tallies().await?,
            QUALIFIED_COUNT,
        ))
    }

    pub async fn votes_summary(&self) -> Result<Vec<VoteSummaryEntry>, AppError> {
        Ok(votes_summary(self.db.candidate_tallies().await?))
    }

    pub async fn score_ranking(&self) -> Result<Vec<ScoreRankingEntry>, AppError> {
        Ok(score_ranking(self.db.candidate_tallies().await?))
    }
}
