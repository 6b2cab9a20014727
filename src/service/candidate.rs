//! Candidate registry
//!
//! Public registration, admin create/update/delete and the read views over
//! candidates. Uniqueness is enforced inside the database transaction; this
//! layer validates and normalizes input first.

use serde::{Deserialize, Deserializer};
use serde_json::json;
use std::sync::Arc;

use super::audit::AuditAction;
use crate::data::{
    Candidate, CandidatePatch, CandidateStatus, Database, NewAuditEntry, NewCandidate,
    PublicCandidate, QuranLevel,
};
use crate::error::AppError;
use crate::validation::{
    check_lengths, clean, parse_quran_level, parse_status, require_whatsapp, validate_email,
    validate_phone,
};

const MAX_AGE: i64 = 150;

/// Raw candidate fields as submitted by a form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFields {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_age")]
    pub age: Option<i64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub photo_url: Option<String>,
    pub quran_level: Option<String>,
    pub motivation: Option<String>,
    pub status: Option<String>,
}

/// Accept a number, a numeric string, an empty string or null
fn deserialize_age<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("age must be an integer")),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom("age must be an integer")),
        Some(_) => Err(D::Error::custom("age must be an integer")),
    }
}

impl CandidateFields {
    /// Trim every text field and drop empty ones
    fn cleaned(self) -> Self {
        Self {
            full_name: clean(self.full_name),
            age: self.age,
            city: clean(self.city),
            country: clean(self.country),
            email: clean(self.email),
            phone: clean(self.phone),
            whatsapp: clean(self.whatsapp),
            photo_url: clean(self.photo_url),
            quran_level: clean(self.quran_level),
            motivation: clean(self.motivation),
            status: clean(self.status),
        }
    }

    fn check_lengths(&self) -> Result<(), AppError> {
        check_lengths([
            ("fullName", self.full_name.as_deref()),
            ("city", self.city.as_deref()),
            ("country", self.country.as_deref()),
            ("email", self.email.as_deref()),
            ("phone", self.phone.as_deref()),
            ("whatsapp", self.whatsapp.as_deref()),
            ("quranLevel", self.quran_level.as_deref()),
            ("motivation", self.motivation.as_deref()),
            ("status", self.status.as_deref()),
        ])
    }

    /// Validate the optional format-checked fields
    fn check_formats(&self) -> Result<(), AppError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        if let Some(age) = self.age {
            if !(0..=MAX_AGE).contains(&age) {
                return Err(AppError::validation("Invalid age"));
            }
        }
        Ok(())
    }

    /// Build a complete new row; name and WhatsApp are required
    fn into_new_candidate(self, status: CandidateStatus) -> Result<NewCandidate, AppError> {
        let fields = self.cleaned();
        let (Some(full_name), Some(raw_whatsapp)) = (fields.full_name.clone(), fields.whatsapp.clone())
        else {
            return Err(AppError::validation("Full name and WhatsApp are required"));
        };

        fields.check_lengths()?;
        let whatsapp = require_whatsapp(&raw_whatsapp)?;
        fields.check_formats()?;
        let quran_level = match &fields.quran_level {
            Some(level) => parse_quran_level(level)?,
            None => QuranLevel::Unspecified,
        };

        Ok(NewCandidate {
            full_name,
            age: fields.age,
            city: fields.city,
            country: fields.country,
            email: fields.email,
            phone: fields.phone,
            whatsapp,
            photo_url: fields.photo_url,
            quran_level,
            motivation: fields.motivation,
            status,
        })
    }

    /// Build a whitelisted patch from the non-empty fields
    fn into_patch(self) -> Result<CandidatePatch, AppError> {
        let fields = self.cleaned();
        fields.check_lengths()?;
        fields.check_formats()?;

        let whatsapp = fields.whatsapp.as_deref().map(require_whatsapp).transpose()?;
        let quran_level = fields
            .quran_level
            .as_deref()
            .map(parse_quran_level)
            .transpose()?;
        let status = fields.status.as_deref().map(parse_status).transpose()?;

        Ok(CandidatePatch {
            full_name: fields.full_name,
            age: fields.age,
            city: fields.city,
            country: fields.country,
            email: fields.email,
            phone: fields.phone,
            whatsapp,
            photo_url: fields.photo_url,
            quran_level,
            motivation: fields.motivation,
            status,
        })
    }
}

/// Result of an admin create-or-update
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Created(Candidate),
    Updated {
        candidate: Candidate,
        fields: Vec<&'static str>,
    },
}

/// Candidate service
pub struct CandidateService {
    db: Arc<Database>,
    code_prefix: String,
}

impl CandidateService {
    pub fn new(db: Arc<Database>, code_prefix: impl Into<String>) -> Self {
        Self {
            db,
            code_prefix: code_prefix.into(),
        }
    }

    /// Human-readable code for a candidate id (prefix + 3-digit padded id)
    pub fn candidate_code(prefix: &str, id: i64) -> String {
        format!("{}-{:03}", prefix, id)
    }

    async fn insert(
        &self,
        candidate: NewCandidate,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Candidate, AppError> {
        let prefix = self.code_prefix.clone();
        self.db
            .insert_candidate(&candidate, move |id| Self::candidate_code(&prefix, id), audit)
            .await
    }

    /// Public registration.
    ///
    /// # Errors
    /// - `GateClosed` when registration is locked or the competition closed
    /// - `Validation` for missing, oversized or malformed fields
    /// - `Conflict` when the identity is already registered
    pub async fn register(&self, fields: CandidateFields) -> Result<Candidate, AppError> {
        let settings = self.db.get_settings().await?;
        if !settings.registration_open() {
            crate::metrics::REGISTRATIONS_TOTAL
                .with_label_values(&["gate_closed"])
                .inc();
            return Err(AppError::GateClosed("Registrations are closed".to_string()));
        }

        let new_candidate = fields.into_new_candidate(CandidateStatus::Pending)?;
        let result = self.insert(new_candidate, None).await;

        let outcome = match &result {
            Ok(_) => "registered",
            Err(AppError::Conflict(_)) => "conflict",
            Err(_) => "error",
        };
        crate::metrics::REGISTRATIONS_TOTAL
            .with_label_values(&[outcome])
            .inc();

        let candidate = result?;
        tracing::info!(
            candidate_id = candidate.id,
            candidate_code = candidate.candidate_code.as_deref().unwrap_or_default(),
            "Candidate registered"
        );
        Ok(candidate)
    }

    /// Admin create (no id) or partial update (with id), audited under `ip`.
    ///
    /// Creation ignores the phase gates and accepts an explicit status.
    pub async fn admin_upsert(
        &self,
        id: Option<i64>,
        fields: CandidateFields,
        ip: &str,
    ) -> Result<UpsertOutcome, AppError> {
        match id {
            Some(id) => {
                let patch = fields.into_patch()?;
                if patch.is_empty() {
                    return Err(AppError::validation("No changes provided"));
                }
                let audit = AuditAction::CandidateUpdate
                    .entry(json!({ "id": id, "fields": patch.field_names() }), ip);
                let candidate = self.db.update_candidate(id, &patch, Some(&audit)).await?;
                tracing::info!(candidate_id = id, fields = ?patch.field_names(), "Candidate updated");
                Ok(UpsertOutcome::Updated {
                    candidate,
                    fields: patch.field_names(),
                })
            }
            None => {
                let status = match clean(fields.status.clone()) {
                    Some(status) => parse_status(&status)?,
                    None => CandidateStatus::Pending,
                };
                let new_candidate = fields.into_new_candidate(status)?;
                let audit = AuditAction::CandidateCreate.entry(json!({}), ip);
                let candidate = self.insert(new_candidate, Some(&audit)).await?;
                tracing::info!(candidate_id = candidate.id, "Candidate created by admin");
                Ok(UpsertOutcome::Created(candidate))
            }
        }
    }

    /// Delete a candidate together with its votes and scores
    pub async fn delete(&self, id: i64, ip: &str) -> Result<(), AppError> {
        let audit = AuditAction::CandidateDelete.entry(json!({ "id": id }), ip);
        if !self.db.delete_candidate(id, Some(&audit)).await? {
            return Err(AppError::not_found("Candidate not found"));
        }
        tracing::info!(candidate_id = id, "Candidate deleted");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Candidate, AppError> {
        self.db
            .get_candidate(id)
            .await?
            .ok_or_else(|| AppError::not_found("Candidate not found"))
    }

    /// Full rows, newest first
    pub async fn list(&self) -> Result<Vec<Candidate>, AppError> {
        self.db.list_candidates().await
    }

    /// Public projection with vote totals, oldest first
    pub async fn list_public(&self) -> Result<Vec<PublicCandidate>, AppError> {
        self.db.list_public_candidates().await
    }
}
