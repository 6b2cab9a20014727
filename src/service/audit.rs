//! Audit trail
//!
//! Append-only record of privileged mutations. Database mutations store their
//! entry inside their own transaction through [`AuditAction::entry`]; the
//! service records changes that live outside the database.

use serde_json::Value;
use std::sync::Arc;

use crate::data::{AuditEntry, Database, NewAuditEntry};
use crate::error::AppError;

/// Newest-first listing cap
pub const AUDIT_LIST_LIMIT: i64 = 500;

/// Privileged mutations that leave an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    CandidateCreate,
    CandidateUpdate,
    CandidateDelete,
    ScoreCreate,
    SettingsUpdate,
    ContactArchive,
    ContactDelete,
    MediaUpdate,
    AdminChangePassword,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CandidateCreate => "candidate_create",
            Self::CandidateUpdate => "candidate_update",
            Self::CandidateDelete => "candidate_delete",
            Self::ScoreCreate => "score_create",
            Self::SettingsUpdate => "settings_update",
            Self::ContactArchive => "contact_archive",
            Self::ContactDelete => "contact_delete",
            Self::MediaUpdate => "media_update",
            Self::AdminChangePassword => "admin_change_password",
        }
    }

    /// Entry for this action performed from `ip`
    pub fn entry(self, payload: Value, ip: &str) -> NewAuditEntry {
        NewAuditEntry::new(self.as_str(), payload, ip)
    }
}

/// Audit service
pub struct AuditService {
    db: Arc<Database>,
}

impl AuditService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        payload: Value,
        ip: &str,
    ) -> Result<(), AppError> {
        self.db.insert_audit(&action.entry(payload, ip)).await?;
        tracing::debug!(action = action.as_str(), ip, "Audit entry recorded");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<AuditEntry>, AppError> {
        self.db.list_audit(AUDIT_LIST_LIMIT).await
    }
}
