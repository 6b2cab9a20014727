//! Admin API endpoints
//!
//! Candidate management, judging, settings, inbox and audit.
//! All routes require HTTP Basic admin credentials, and every mutation
//! commits together with an audit entry tagged with the caller's IP.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use super::dto::{
    AdminCandidateRequest, ApiJson, ApiPath, ArchiveRequest, CandidateSavedResponse,
    ChangePasswordRequest, DashboardResponse, MessageResponse,
};
use crate::AppState;
use crate::auth::{AdminUser, ClientIp};
use crate::data::{AuditEntry, Candidate, CompetitionSettings, ContactMessage, Score};
use crate::error::AppError;
use crate::service::{
    ScoreInput, ScoreRankingEntry, SettingsUpdate, UpsertOutcome, VoteSummaryEntry,
};

/// Create admin router
///
/// Routes:
/// - GET /api/admin/dashboard
/// - GET /api/candidates
/// - POST /api/admin/candidates
/// - DELETE /api/admin/candidates/:id
/// - POST /api/scores
/// - GET /api/votes/summary
/// - GET /api/scores/ranking
/// - GET|PUT /api/tournament-settings
/// - GET /api/contact-messages
/// - PUT|DELETE /api/contact-messages/:id
/// - GET /api/admin-audit
/// - POST /api/admin/change-password
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/dashboard", get(dashboard))
        // Candidates
        .route("/api/candidates", get(list_candidates))
        .route("/api/admin/candidates", post(save_candidate))
        .route("/api/admin/candidates/:id", delete(delete_candidate))
        // Judging
        .route("/api/scores", post(record_score))
        .route("/api/votes/summary", get(votes_summary))
        .route("/api/scores/ranking", get(score_ranking))
        // Settings
        .route(
            "/api/tournament-settings",
            get(get_settings).put(update_settings),
        )
        // Inbox
        .route("/api/contact-messages", get(list_contacts))
        .route(
            "/api/contact-messages/:id",
            put(archive_contact).delete(delete_contact),
        )
        // Audit and account
        .route("/api/admin-audit", get(list_audit))
        .route("/api/admin/change-password", post(change_password))
}

// =============================================================================
// Dashboard
// =============================================================================

/// GET /api/admin/dashboard
async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let (candidates, votes, ranking, settings, contacts, audit) = tokio::try_join!(
        state.candidates.list(),
        state.ranking.votes_summary(),
        state.ranking.score_ranking(),
        state.settings.get(),
        state.contacts.list(),
        state.audit.list(),
    )?;

    Ok(Json(DashboardResponse {
        candidates,
        votes,
        ranking,
        settings,
        contacts,
        audit,
    }))
}

// =============================================================================
// Candidates
// =============================================================================

/// GET /api/candidates
async fn list_candidates(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Candidate>>, AppError> {
    Ok(Json(state.candidates.list().await?))
}

/// POST /api/admin/candidates
///
/// Creates without `candidateId`, otherwise applies a partial update.
async fn save_candidate(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiJson(request): ApiJson<AdminCandidateRequest>,
) -> Result<(StatusCode, Json<CandidateSavedResponse>), AppError> {
    match state
        .candidates
        .admin_upsert(request.candidate_id, request.fields, ip.as_str())
        .await?
    {
        UpsertOutcome::Created(candidate) => Ok((
            StatusCode::CREATED,
            Json(CandidateSavedResponse {
                message: "Candidate created".to_string(),
                candidate_id: candidate.id,
                candidate,
            }),
        )),
        UpsertOutcome::Updated { candidate, .. } => Ok((
            StatusCode::OK,
            Json(CandidateSavedResponse {
                message: "Candidate updated".to_string(),
                candidate_id: candidate.id,
                candidate,
            }),
        )),
    }
}

/// DELETE /api/admin/candidates/:id
async fn delete_candidate(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.candidates.delete(id, ip.as_str()).await?;
    Ok(Json(MessageResponse::new("Candidate deleted")))
}

// =============================================================================
// Judging
// =============================================================================

/// POST /api/scores
async fn record_score(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiJson(input): ApiJson<ScoreInput>,
) -> Result<(StatusCode, Json<Score>), AppError> {
    let score = state.scores.record_score(input, ip.as_str()).await?;
    Ok((StatusCode::CREATED, Json(score)))
}

/// GET /api/votes/summary
async fn votes_summary(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<VoteSummaryEntry>>, AppError> {
    Ok(Json(state.ranking.votes_summary().await?))
}

/// GET /api/scores/ranking
async fn score_ranking(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ScoreRankingEntry>>, AppError> {
    Ok(Json(state.ranking.score_ranking().await?))
}

// =============================================================================
// Settings
// =============================================================================

/// GET /api/tournament-settings
async fn get_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<CompetitionSettings>, AppError> {
    Ok(Json(state.settings.get().await?))
}

/// PUT /api/tournament-settings
///
/// Full replacement; absent fields take their defaults.
async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiJson(update): ApiJson<SettingsUpdate>,
) -> Result<Json<CompetitionSettings>, AppError> {
    let settings = state.settings.update(update, ip.as_str()).await?;
    Ok(Json(settings))
}

// =============================================================================
// Inbox
// =============================================================================

/// GET /api/contact-messages
async fn list_contacts(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ContactMessage>>, AppError> {
    Ok(Json(state.contacts.list().await?))
}

/// PUT /api/contact-messages/:id
async fn archive_contact(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<ArchiveRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .contacts
        .set_archived(id, request.archived, ip.as_str())
        .await?;
    Ok(Json(MessageResponse::new("Message updated")))
}

/// DELETE /api/contact-messages/:id
async fn delete_contact(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.contacts.delete(id, ip.as_str()).await?;
    Ok(Json(MessageResponse::new("Message deleted")))
}

// =============================================================================
// Audit and account
// =============================================================================

/// GET /api/admin-audit
async fn list_audit(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    Ok(Json(state.audit.list().await?))
}

/// POST /api/admin/change-password
async fn change_password(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .credentials
        .change_password(
            &request.current_password,
            &request.new_password,
            ip.as_str(),
        )
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}
