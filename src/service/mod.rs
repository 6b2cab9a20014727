//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate validation, gating and database operations.

mod abuse;
mod audit;
mod candidate;
mod contact;
mod ranking;
mod score;
mod settings;
mod vote;

pub use abuse::{AbuseGuard, GuardedAction, InMemoryRateLimitStore, RateLimitStore};
pub use audit::{AUDIT_LIST_LIMIT, AuditAction, AuditService};
pub use candidate::{CandidateFields, CandidateService, UpsertOutcome};
pub use contact::{
    CONTACT_LIST_LIMIT, ContactInput, ContactNotifier, ContactService, LogNotifier,
};
pub use ranking::{
    CompetitionStats, PublicResults, QUALIFIED_COUNT, RankingService, ResultEntry,
    ScoreRankingEntry, VoteSummaryEntry,
};
pub use score::{ScoreInput, ScoreService};
pub use settings::{SettingsService, SettingsUpdate};
pub use vote::{VOTE_WINDOW_HOURS, VoteService, VoterInfo};
