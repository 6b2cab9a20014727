//! Scoring ledger
//!
//! Judges append one score row per passage. Rows are never overwritten;
//! averaging happens in the ranking service.

use serde::{Deserialize, Deserializer};
use serde_json::json;
use std::sync::Arc;

use super::audit::AuditAction;
use crate::data::{Database, NewScore, Score};
use crate::error::AppError;
use crate::validation::{check_lengths, clean};

/// Score submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInput {
    pub candidate_id: Option<i64>,
    pub judge_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub theme_chosen_score: f64,
    #[serde(default, deserialize_with = "lenient_score")]
    pub theme_imposed_score: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Sub-score as a number or numeric string; `null` and blank read as 0
fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| D::Error::custom("score must be a number")),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(0.0),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom("score must be a number")),
        Some(_) => Err(D::Error::custom("score must be a number")),
    }
}

/// Score service
pub struct ScoreService {
    db: Arc<Database>,
}

impl ScoreService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a score.
    ///
    /// # Errors
    /// - `Validation` without candidate or judge, for oversized text or
    ///   non-finite sub-scores
    /// - `NotFound` when the candidate does not exist
    pub async fn record_score(&self, input: ScoreInput, ip: &str) -> Result<Score, AppError> {
        let judge_name = clean(input.judge_name);
        let (Some(candidate_id), Some(judge_name)) = (input.candidate_id, judge_name) else {
            return Err(AppError::validation("Candidate and judge name are required"));
        };
        let notes = input.notes.unwrap_or_default().trim().to_string();

        check_lengths([
            ("judgeName", Some(judge_name.as_str())),
            ("notes", Some(notes.as_str())),
        ])?;

        for value in [input.theme_chosen_score, input.theme_imposed_score] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation("Scores must be non-negative numbers"));
            }
        }

        let audit = AuditAction::ScoreCreate.entry(
            json!({ "candidateId": candidate_id, "judgeName": judge_name }),
            ip,
        );
        let score = self
            .db
            .insert_score(
                &NewScore {
                    candidate_id,
                    judge_name,
                    theme_chosen_score: input.theme_chosen_score,
                    theme_imposed_score: input.theme_imposed_score,
                    notes,
                },
                Some(&audit),
            )
            .await?
            .ok_or_else(|| AppError::not_found("Candidate not found"))?;

        crate::metrics::SCORES_TOTAL.inc();
        tracing::info!(candidate_id, judge = %score.judge_name, "Score recorded");
        Ok(score)
    }
}
