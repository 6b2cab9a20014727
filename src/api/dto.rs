//! Request and response DTOs
//!
//! Wire names are camelCase. Request bodies go through [`ApiJson`] so that
//! malformed JSON surfaces as a `validation` error body like every other
//! rejection.

use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::data::{AuditEntry, Candidate, CompetitionSettings, ContactMessage};
use crate::error::AppError;
use crate::service::{CandidateFields, ScoreRankingEntry, VoteSummaryEntry, VoterInfo};

/// JSON body extractor rejecting with [`AppError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor rejecting with [`AppError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Accept an integer, a numeric string, an empty string or null
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("id must be an integer")),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom("id must be an integer")),
        Some(_) => Err(D::Error::custom("id must be an integer")),
    }
}

/// Accept `true`/`false`, `1`/`0` or their string forms
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(number)) => number.as_i64() == Some(1),
        Some(Value::String(text)) => matches!(text.trim(), "1" | "true"),
        _ => false,
    })
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub candidate_id: Option<i64>,
    #[serde(flatten)]
    pub voter: VoterInfo,
}

/// Admin create (no `candidateId`) or update (with `candidateId`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCandidateRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub candidate_id: Option<i64>,
    #[serde(flatten)]
    pub fields: CandidateFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub archived: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaEventRequest {
    pub name: String,
    pub event: String,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub candidate_id: i64,
    pub candidate_code: Option<String>,
    /// Absent when no organizer number is configured
    pub whatsapp_redirect: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSavedResponse {
    pub message: String,
    pub candidate_id: i64,
    pub candidate: Candidate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedResponse {
    pub qualified_ids: Vec<i64>,
}

/// Everything the admin console shows on load
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub candidates: Vec<Candidate>,
    pub votes: Vec<VoteSummaryEntry>,
    pub ranking: Vec<ScoreRankingEntry>,
    pub settings: CompetitionSettings,
    pub contacts: Vec<ContactMessage>,
    pub audit: Vec<AuditEntry>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}
