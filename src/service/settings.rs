//! Competition state store
//!
//! The singleton settings row: phase gates plus tournament shape numbers.
//! Updates replace the whole record; absent fields fall back to defaults.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::audit::AuditAction;
use crate::data::{CompetitionSettings, Database, PublicSettings};
use crate::error::AppError;

/// Full settings replacement as submitted by the admin console
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub max_candidates: Option<i64>,
    pub direct_qualified: Option<i64>,
    pub playoff_participants: Option<i64>,
    pub playoff_winners: Option<i64>,
    pub groups_count: Option<i64>,
    pub candidates_per_group: Option<i64>,
    pub finalists_from_winners: Option<i64>,
    pub finalists_from_best_second: Option<i64>,
    pub total_finalists: Option<i64>,
    pub voting_enabled: Option<i64>,
    pub registration_locked: Option<i64>,
    pub competition_closed: Option<i64>,
    pub announcement_text: Option<String>,
    /// JSON text, or an inline JSON value that is serialized as-is
    pub schedule_json: Option<Value>,
}

fn gate(name: &str, value: Option<i64>) -> Result<i64, AppError> {
    match value.unwrap_or(0) {
        flag @ (0 | 1) => Ok(flag),
        _ => Err(AppError::validation(format!("{} must be 0 or 1", name))),
    }
}

fn shape(name: &str, value: Option<i64>, default: i64) -> Result<i64, AppError> {
    let value = value.unwrap_or(default);
    if value < 0 {
        return Err(AppError::validation(format!("{} must not be negative", name)));
    }
    Ok(value)
}

fn schedule(value: Option<Value>) -> Result<String, AppError> {
    match value {
        None | Some(Value::Null) => Ok("[]".to_string()),
        Some(Value::String(text)) => {
            serde_json::from_str::<Value>(&text)
                .map_err(|_| AppError::validation("scheduleJson must be valid JSON"))?;
            Ok(text)
        }
        Some(inline) => Ok(inline.to_string()),
    }
}

impl SettingsUpdate {
    /// Resolve defaults and validate every field
    pub fn into_settings(self) -> Result<CompetitionSettings, AppError> {
        let defaults = CompetitionSettings::default();

        Ok(CompetitionSettings {
            max_candidates: shape("maxCandidates", self.max_candidates, defaults.max_candidates)?,
            direct_qualified: shape(
                "directQualified",
                self.direct_qualified,
                defaults.direct_qualified,
            )?,
            playoff_participants: shape(
                "playoffParticipants",
                self.playoff_participants,
                defaults.playoff_participants,
            )?,
            playoff_winners: shape(
                "playoffWinners",
                self.playoff_winners,
                defaults.playoff_winners,
            )?,
            groups_count: shape("groupsCount", self.groups_count, defaults.groups_count)?,
            candidates_per_group: shape(
                "candidatesPerGroup",
                self.candidates_per_group,
                defaults.candidates_per_group,
            )?,
            finalists_from_winners: shape(
                "finalistsFromWinners",
                self.finalists_from_winners,
                defaults.finalists_from_winners,
            )?,
            finalists_from_best_second: shape(
                "finalistsFromBestSecond",
                self.finalists_from_best_second,
                defaults.finalists_from_best_second,
            )?,
            total_finalists: shape(
                "totalFinalists",
                self.total_finalists,
                defaults.total_finalists,
            )?,
            voting_enabled: gate("votingEnabled", self.voting_enabled)?,
            registration_locked: gate("registrationLocked", self.registration_locked)?,
            competition_closed: gate("competitionClosed", self.competition_closed)?,
            announcement_text: self.announcement_text.unwrap_or_default(),
            schedule_json: schedule(self.schedule_json)?,
            updated_at: None,
        })
    }
}

/// Settings service
pub struct SettingsService {
    db: Arc<Database>,
}

impl SettingsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn get(&self) -> Result<CompetitionSettings, AppError> {
        self.db.get_settings().await
    }

    pub async fn get_public(&self) -> Result<PublicSettings, AppError> {
        Ok(PublicSettings::from(&self.db.get_settings().await?))
    }

    /// Replace the record and stamp `updated_at`; the audit entry carries
    /// the validated settings
    pub async fn update(
        &self,
        update: SettingsUpdate,
        ip: &str,
    ) -> Result<CompetitionSettings, AppError> {
        let settings = update.into_settings()?;
        let payload = serde_json::to_value(&settings).map_err(|e| AppError::Internal(e.into()))?;
        let audit = AuditAction::SettingsUpdate.entry(payload, ip);
        let stored = self.db.replace_settings(&settings, Some(&audit)).await?;
        tracing::info!(
            voting_enabled = stored.voting_enabled,
            registration_locked = stored.registration_locked,
            competition_closed = stored.competition_closed,
            "Competition settings updated"
        );
        Ok(stored)
    }
}
