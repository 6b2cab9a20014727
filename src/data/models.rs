//! Data models
//!
//! Rust structs representing database rows and the partial-update types
//! used to mutate them. Column names are snake_case in SQLite and camelCase
//! on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Candidate
// =============================================================================

/// Lifecycle status of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Pending,
    Approved,
    Eliminated,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Eliminated => "eliminated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "eliminated" => Some(Self::Eliminated),
            _ => None,
        }
    }
}

/// Self-declared Quran recitation level
///
/// The empty level is the default for registrations that skip the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuranLevel {
    #[default]
    Unspecified,
    Beginner,
    Intermediate,
    Advanced,
}

impl QuranLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Beginner => "Débutant",
            Self::Intermediate => "Intermédiaire",
            Self::Advanced => "Avancé",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" => Some(Self::Unspecified),
            "Débutant" => Some(Self::Beginner),
            "Intermédiaire" => Some(Self::Intermediate),
            "Avancé" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// A registered candidate
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: i64,
    /// Derived from `id`, absent only inside the registration transaction
    pub candidate_code: Option<String>,
    pub full_name: String,
    pub age: Option<i64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Normalized WhatsApp handle, always `+` followed by digits
    pub whatsapp: String,
    pub photo_url: Option<String>,
    pub quran_level: String,
    pub motivation: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Validated fields for a new candidate row
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub full_name: String,
    pub age: Option<i64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: String,
    pub photo_url: Option<String>,
    pub quran_level: QuranLevel,
    pub motivation: Option<String>,
    pub status: CandidateStatus,
}

/// Whitelisted, already-validated partial update of a candidate
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct CandidatePatch {
    pub full_name: Option<String>,
    pub age: Option<i64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub photo_url: Option<String>,
    pub quran_level: Option<QuranLevel>,
    pub motivation: Option<String>,
    pub status: Option<CandidateStatus>,
}

impl CandidatePatch {
    /// Names of the fields this patch touches, in wire form
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.full_name.is_some() {
            names.push("fullName");
        }
        if self.age.is_some() {
            names.push("age");
        }
        if self.city.is_some() {
            names.push("city");
        }
        if self.country.is_some() {
            names.push("country");
        }
        if self.email.is_some() {
            names.push("email");
        }
        if self.phone.is_some() {
            names.push("phone");
        }
        if self.whatsapp.is_some() {
            names.push("whatsapp");
        }
        if self.photo_url.is_some() {
            names.push("photoUrl");
        }
        if self.quran_level.is_some() {
            names.push("quranLevel");
        }
        if self.motivation.is_some() {
            names.push("motivation");
        }
        if self.status.is_some() {
            names.push("status");
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

/// Public projection of a candidate with its vote total
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicCandidate {
    pub id: i64,
    pub candidate_code: Option<String>,
    pub full_name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub photo_url: Option<String>,
    pub quran_level: String,
    pub motivation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub total_votes: i64,
}

// =============================================================================
// Votes and scores
// =============================================================================

/// A single public endorsement
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: i64,
    pub candidate_id: i64,
    pub voter_name: Option<String>,
    pub voter_contact: Option<String>,
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

/// Vote to be recorded
#[derive(Debug, Clone)]
pub struct NewVote {
    pub candidate_id: i64,
    pub voter_name: Option<String>,
    pub voter_contact: Option<String>,
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

/// A judge's evaluation of one passage
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: i64,
    pub candidate_id: i64,
    pub judge_name: String,
    pub theme_chosen_score: f64,
    pub theme_imposed_score: f64,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Score to be appended
#[derive(Debug, Clone)]
pub struct NewScore {
    pub candidate_id: i64,
    pub judge_name: String,
    pub theme_chosen_score: f64,
    pub theme_imposed_score: f64,
    pub notes: String,
}

/// Raw per-candidate aggregates read from the ledgers
///
/// Ordering and rounding happen in the ranking service.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateTally {
    pub id: i64,
    pub full_name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub photo_url: Option<String>,
    pub total_votes: i64,
    /// Mean of (chosen + imposed); `None` when the candidate has no scores
    pub average_score: Option<f64>,
    pub passages: i64,
}

// =============================================================================
// Competition settings (singleton)
// =============================================================================

/// The single tournament settings row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionSettings {
    pub max_candidates: i64,
    pub direct_qualified: i64,
    pub playoff_participants: i64,
    pub playoff_winners: i64,
    pub groups_count: i64,
    pub candidates_per_group: i64,
    pub finalists_from_winners: i64,
    pub finalists_from_best_second: i64,
    pub total_finalists: i64,
    pub voting_enabled: i64,
    pub registration_locked: i64,
    pub competition_closed: i64,
    pub announcement_text: String,
    /// Opaque JSON text, stored and returned verbatim
    pub schedule_json: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for CompetitionSettings {
    fn default() -> Self {
        Self {
            max_candidates: 64,
            direct_qualified: 16,
            playoff_participants: 32,
            playoff_winners: 16,
            groups_count: 8,
            candidates_per_group: 4,
            finalists_from_winners: 8,
            finalists_from_best_second: 2,
            total_finalists: 10,
            voting_enabled: 0,
            registration_locked: 0,
            competition_closed: 0,
            announcement_text: String::new(),
            schedule_json: "[]".to_string(),
            updated_at: None,
        }
    }
}

impl CompetitionSettings {
    pub fn voting_open(&self) -> bool {
        self.voting_enabled == 1 && self.competition_closed != 1
    }

    pub fn registration_open(&self) -> bool {
        self.registration_locked != 1 && self.competition_closed != 1
    }
}

/// Public-safe subset of the settings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    pub voting_enabled: i64,
    pub registration_locked: i64,
    pub competition_closed: i64,
    pub announcement_text: String,
    pub schedule_json: String,
}

impl From<&CompetitionSettings> for PublicSettings {
    fn from(settings: &CompetitionSettings) -> Self {
        Self {
            voting_enabled: settings.voting_enabled,
            registration_locked: settings.registration_locked,
            competition_closed: settings.competition_closed,
            announcement_text: settings.announcement_text.clone(),
            schedule_json: settings.schedule_json.clone(),
        }
    }
}

// =============================================================================
// Contact messages and audit
// =============================================================================

/// Inbound contact-form entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub ip: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// Contact message to be stored
#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub full_name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub ip: String,
}

/// Append-only record of a privileged mutation
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    /// JSON snapshot
    pub payload: String,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit entry to be stored in the same transaction as the mutation it
/// describes
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: &'static str,
    pub payload: serde_json::Value,
    pub ip: String,
}

impl NewAuditEntry {
    pub fn new(action: &'static str, payload: serde_json::Value, ip: &str) -> Self {
        Self {
            action,
            payload,
            ip: ip.to_string(),
        }
    }

    /// Copy with `id` set on an object payload, for rows whose id is only
    /// known after the insert
    pub fn with_id(&self, id: i64) -> Self {
        let mut entry = self.clone();
        if let serde_json::Value::Object(map) = &mut entry.payload {
            map.insert("id".to_string(), id.into());
        }
        entry
    }
}
