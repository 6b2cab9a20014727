//! Public competition endpoints
//!
//! Registration, voting and contact are rate limited per client IP before
//! the service sees the request.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use super::dto::{
    ApiJson, MessageResponse, QualifiedResponse, RegisterResponse, VoteRequest,
};
use crate::AppState;
use crate::auth::ClientIp;
use crate::data::{Candidate, PublicCandidate, PublicSettings};
use crate::error::AppError;
use crate::service::{CandidateFields, ContactInput, GuardedAction, PublicResults};

/// Create public router
///
/// Routes:
/// - GET /api/public-candidates
/// - GET /api/public-settings
/// - GET /api/public-results
/// - GET /api/public-results/qualified
/// - POST /api/register
/// - POST /api/votes
/// - POST /api/contact
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/public-candidates", get(list_candidates))
        .route("/api/public-settings", get(settings))
        .route("/api/public-results", get(results))
        .route("/api/public-results/qualified", get(qualified))
        .route("/api/register", post(register))
        .route("/api/votes", post(cast_vote))
        .route("/api/contact", post(submit_contact))
}

/// Confirmation link the new candidate can send to the organizer.
///
/// `None` when the organizer number has no digits.
pub(crate) fn whatsapp_redirect(admin_whatsapp: &str, candidate: &Candidate) -> Option<String> {
    let digits: String = admin_whatsapp
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return None;
    }

    let text = format!(
        "Assalamou alaykoum, je confirme mon inscription. Mon code candidat est {} (ID {}).",
        candidate.candidate_code.as_deref().unwrap_or_default(),
        candidate.id
    );
    Some(format!(
        "https://wa.me/{}?text={}",
        digits,
        urlencoding::encode(&text)
    ))
}

/// GET /api/public-candidates
async fn list_candidates(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicCandidate>>, AppError> {
    Ok(Json(state.candidates.list_public().await?))
}

/// GET /api/public-settings
async fn settings(State(state): State<AppState>) -> Result<Json<PublicSettings>, AppError> {
    Ok(Json(state.settings.get_public().await?))
}

/// GET /api/public-results
async fn results(State(state): State<AppState>) -> Result<Json<PublicResults>, AppError> {
    Ok(Json(state.ranking.public_results().await?))
}

/// GET /api/public-results/qualified
async fn qualified(State(state): State<AppState>) -> Result<Json<QualifiedResponse>, AppError> {
    Ok(Json(QualifiedResponse {
        qualified_ids: state.ranking.qualified_ids().await?,
    }))
}

/// POST /api/register
async fn register(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(fields): ApiJson<CandidateFields>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    state.guard.check(ip.as_str(), GuardedAction::Register).await?;

    let candidate = state.candidates.register(fields).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration recorded".to_string(),
            candidate_id: candidate.id,
            whatsapp_redirect: whatsapp_redirect(&state.config.admin.whatsapp, &candidate),
            candidate_code: candidate.candidate_code,
        }),
    ))
}

/// POST /api/votes
async fn cast_vote(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(request): ApiJson<VoteRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state.guard.check(ip.as_str(), GuardedAction::Vote).await?;

    let candidate_id = request
        .candidate_id
        .ok_or_else(|| AppError::validation("candidateId is required"))?;
    state
        .votes
        .cast_vote(candidate_id, request.voter, ip.as_str())
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new("Vote recorded"))))
}

/// POST /api/contact
async fn submit_contact(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(input): ApiJson<ContactInput>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state.guard.check(ip.as_str(), GuardedAction::Contact).await?;

    state.contacts.submit(input, ip.as_str()).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Message sent")),
    ))
}
