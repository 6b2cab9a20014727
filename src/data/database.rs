//! SQLite database operations
//!
//! All database access goes through this module.
//! Check-then-insert sequences run under `BEGIN IMMEDIATE` so the existence
//! check and the write are atomic; unique indexes and the vote trigger in the
//! schema are the backstop when a racing writer slips past the check.
//! Admin mutations take an optional audit entry that commits or rolls back
//! together with the change.

use chrono::{DateTime, Duration, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;

use super::models::*;
use crate::error::AppError;

/// Message raised by the `votes_rolling_window_unique` trigger
const DUPLICATE_VOTE_TRIGGER_MESSAGE: &str = "duplicate vote within window";

pub const ALREADY_REGISTERED: &str = "Candidate already registered";
pub const WHATSAPP_ALREADY_USED: &str = "WhatsApp number already used";
pub const VOTE_ALREADY_RECORDED: &str = "Vote already recorded for this candidate";

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_duplicate_vote_abort(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.message().contains(DUPLICATE_VOTE_TRIGGER_MESSAGE))
}

/// Outcome of a guarded vote insert
#[derive(Debug)]
pub enum VoteOutcome {
    Recorded(Vote),
    CandidateMissing,
    Duplicate,
}

/// `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// Dropped without `commit` or `rollback`, on an early return or when the
/// caller's future is cancelled, the connection is detached from the pool
/// and closed, and SQLite rolls the open transaction back.
struct ImmediateTx {
    conn: Option<PoolConnection<Sqlite>>,
}

impl ImmediateTx {
    async fn begin(pool: &Pool<Sqlite>) -> Result<Self, AppError> {
        let mut tx = Self {
            conn: Some(pool.acquire().await?),
        };
        sqlx::query("BEGIN IMMEDIATE").execute(tx.conn()?).await?;
        Ok(tx)
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection, AppError> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("transaction already finished")))
    }

    async fn commit(mut self) -> Result<(), AppError> {
        sqlx::query("COMMIT").execute(self.conn()?).await?;
        // Back to the pool
        self.conn.take();
        Ok(())
    }

    async fn rollback(mut self) {
        let Some(conn) = self.conn.as_deref_mut() else {
            return;
        };
        match sqlx::query("ROLLBACK").execute(conn).await {
            Ok(_) => {
                self.conn.take();
            }
            Err(error) => tracing::warn!(%error, "Rollback failed, discarding connection"),
        }
    }
}

impl Drop for ImmediateTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("Transaction abandoned, closing its connection");
            drop(conn.detach());
        }
    }
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically and makes sure the settings
    /// singleton row exists.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        sqlx::query("INSERT OR IGNORE INTO tournament_settings (id) VALUES (1)")
            .execute(&pool)
            .await?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Round-trip a trivial query to check the database is reachable
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Candidates
    // =========================================================================

    async fn find_identity_conflict(
        conn: &mut SqliteConnection,
        full_name: &str,
        whatsapp: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<&'static str>, AppError> {
        let exclude_id = exclude_id.unwrap_or(-1);

        let same_person = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM candidates WHERE lower(full_name) = lower(?) AND whatsapp = ? AND id != ? LIMIT 1",
        )
        .bind(full_name)
        .bind(whatsapp)
        .bind(exclude_id)
        .fetch_optional(&mut *conn)
        .await?;
        if same_person.is_some() {
            return Ok(Some(ALREADY_REGISTERED));
        }

        let same_whatsapp = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM candidates WHERE whatsapp = ? AND id != ? LIMIT 1",
        )
        .bind(whatsapp)
        .bind(exclude_id)
        .fetch_optional(&mut *conn)
        .await?;
        if same_whatsapp.is_some() {
            return Ok(Some(WHATSAPP_ALREADY_USED));
        }

        Ok(None)
    }

    /// Insert a candidate and assign its code in one transaction.
    ///
    /// The code is a function of the id, so the row is inserted first and the
    /// code written by a second statement once the id is known. When `audit`
    /// is given it is stored in the same transaction with the new id added
    /// to its payload.
    ///
    /// # Errors
    /// `Conflict` when the (name, WhatsApp) pair or the WhatsApp handle is
    /// already taken.
    pub async fn insert_candidate(
        &self,
        candidate: &NewCandidate,
        derive_code: impl Fn(i64) -> String,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Candidate, AppError> {
        let mut tx = ImmediateTx::begin(&self.pool).await?;

        let result = Self::insert_candidate_in(tx.conn()?, candidate, derive_code, audit).await;
        match result {
            Ok(candidate) => {
                tx.commit().await?;
                Ok(candidate)
            }
            Err(error) => {
                tx.rollback().await;
                Err(error)
            }
        }
    }

    async fn insert_candidate_in(
        conn: &mut SqliteConnection,
        candidate: &NewCandidate,
        derive_code: impl Fn(i64) -> String,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Candidate, AppError> {
        if let Some(reason) =
            Self::find_identity_conflict(conn, &candidate.full_name, &candidate.whatsapp, None)
                .await?
        {
            return Err(AppError::conflict(reason));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO candidates
                (full_name, age, city, country, email, phone, whatsapp,
                 photo_url, quran_level, motivation, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&candidate.full_name)
        .bind(candidate.age)
        .bind(&candidate.city)
        .bind(&candidate.country)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(&candidate.whatsapp)
        .bind(&candidate.photo_url)
        .bind(candidate.quran_level.as_str())
        .bind(&candidate.motivation)
        .bind(candidate.status.as_str())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                AppError::conflict(WHATSAPP_ALREADY_USED)
            } else {
                error.into()
            }
        })?;

        let id = inserted.last_insert_rowid();
        sqlx::query("UPDATE candidates SET candidate_code = ? WHERE id = ?")
            .bind(derive_code(id))
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if let Some(entry) = audit {
            Self::write_audit(conn, &entry.with_id(id)).await?;
        }

        let row = sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Apply a whitelisted partial update.
    ///
    /// Identity uniqueness is re-checked against every other row using the
    /// effective (patched or current) name and WhatsApp.
    pub async fn update_candidate(
        &self,
        id: i64,
        patch: &CandidatePatch,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Candidate, AppError> {
        let mut tx = ImmediateTx::begin(&self.pool).await?;

        let result = Self::update_candidate_in(tx.conn()?, id, patch, audit).await;
        match result {
            Ok(candidate) => {
                tx.commit().await?;
                Ok(candidate)
            }
            Err(error) => {
                tx.rollback().await;
                Err(error)
            }
        }
    }

    async fn update_candidate_in(
        conn: &mut SqliteConnection,
        id: i64,
        patch: &CandidatePatch,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Candidate, AppError> {
        let current = sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("Candidate not found"))?;

        if patch.full_name.is_some() || patch.whatsapp.is_some() {
            let full_name = patch.full_name.as_deref().unwrap_or(&current.full_name);
            let whatsapp = patch.whatsapp.as_deref().unwrap_or(&current.whatsapp);
            if let Some(reason) =
                Self::find_identity_conflict(conn, full_name, whatsapp, Some(id)).await?
            {
                return Err(AppError::conflict(reason));
            }
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE candidates SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(value) = &patch.full_name {
                set.push("full_name = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = patch.age {
                set.push("age = ").push_bind_unseparated(value);
            }
            if let Some(value) = &patch.city {
                set.push("city = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.country {
                set.push("country = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.email {
                set.push("email = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.phone {
                set.push("phone = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.whatsapp {
                set.push("whatsapp = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = &patch.photo_url {
                set.push("photo_url = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = patch.quran_level {
                set.push("quran_level = ").push_bind_unseparated(value.as_str());
            }
            if let Some(value) = &patch.motivation {
                set.push("motivation = ").push_bind_unseparated(value.clone());
            }
            if let Some(value) = patch.status {
                set.push("status = ").push_bind_unseparated(value.as_str());
            }
        }
        builder.push(" WHERE id = ").push_bind(id);

        builder.build().execute(&mut *conn).await.map_err(|error| {
            if is_unique_violation(&error) {
                AppError::conflict(WHATSAPP_ALREADY_USED)
            } else {
                error.into()
            }
        })?;

        if let Some(entry) = audit {
            Self::write_audit(conn, entry).await?;
        }

        let row = sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Get candidate by id
    pub async fn get_candidate(&self, id: i64) -> Result<Option<Candidate>, AppError> {
        let candidate = sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(candidate)
    }

    /// All candidates, newest first
    pub async fn list_candidates(&self) -> Result<Vec<Candidate>, AppError> {
        let candidates =
            sqlx::query_as::<_, Candidate>("SELECT * FROM candidates ORDER BY id DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(candidates)
    }

    /// Public projection with vote totals, in registration order
    pub async fn list_public_candidates(&self) -> Result<Vec<PublicCandidate>, AppError> {
        let candidates = sqlx::query_as::<_, PublicCandidate>(
            r#"
            SELECT c.id, c.candidate_code, c.full_name, c.city, c.country, c.photo_url,
                   c.quran_level, c.motivation, c.created_at,
                   COALESCE(v.total_votes, 0) AS total_votes
            FROM candidates c
            LEFT JOIN (
                SELECT candidate_id, COUNT(*) AS total_votes
                FROM votes
                GROUP BY candidate_id
            ) v ON v.candidate_id = c.id
            ORDER BY c.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    /// Delete a candidate; votes and scores cascade.
    ///
    /// `audit` is stored with the delete only when a row was removed.
    ///
    /// # Returns
    /// Whether a row was removed
    pub async fn delete_candidate(
        &self,
        id: i64,
        audit: Option<&NewAuditEntry>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM candidates WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = result.rows_affected() > 0;

        if let (true, Some(entry)) = (removed, audit) {
            Self::write_audit(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Record a vote unless the same client voted for the candidate within
    /// the preceding `window`.
    pub async fn insert_vote_if_absent(
        &self,
        vote: &NewVote,
        window: Duration,
    ) -> Result<VoteOutcome, AppError> {
        let mut tx = ImmediateTx::begin(&self.pool).await?;

        let result = Self::insert_vote_in(tx.conn()?, vote, window).await;
        match result {
            Ok(VoteOutcome::Recorded(vote)) => {
                tx.commit().await?;
                Ok(VoteOutcome::Recorded(vote))
            }
            Ok(outcome) => {
                tx.rollback().await;
                Ok(outcome)
            }
            Err(error) => {
                tx.rollback().await;
                Err(error)
            }
        }
    }

    async fn insert_vote_in(
        conn: &mut SqliteConnection,
        vote: &NewVote,
        window: Duration,
    ) -> Result<VoteOutcome, AppError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM candidates WHERE id = ?")
            .bind(vote.candidate_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Ok(VoteOutcome::CandidateMissing);
        }

        let since = vote.created_at - window;
        let recent = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM votes
            WHERE candidate_id = ? AND ip = ? AND julianday(created_at) > julianday(?)
            LIMIT 1
            "#,
        )
        .bind(vote.candidate_id)
        .bind(&vote.ip)
        .bind(since)
        .fetch_optional(&mut *conn)
        .await?;
        if recent.is_some() {
            return Ok(VoteOutcome::Duplicate);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO votes (candidate_id, voter_name, voter_contact, ip, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(vote.candidate_id)
        .bind(&vote.voter_name)
        .bind(&vote.voter_contact)
        .bind(&vote.ip)
        .bind(vote.created_at)
        .execute(&mut *conn)
        .await;

        let inserted = match inserted {
            Ok(inserted) => inserted,
            Err(error) if is_duplicate_vote_abort(&error) => {
                return Ok(VoteOutcome::Duplicate);
            }
            Err(error) => return Err(error.into()),
        };

        let row = sqlx::query_as::<_, Vote>("SELECT * FROM votes WHERE id = ?")
            .bind(inserted.last_insert_rowid())
            .fetch_one(&mut *conn)
            .await?;
        Ok(VoteOutcome::Recorded(row))
    }

    /// Raw insert that bypasses the application-level window check.
    ///
    /// Only the schema trigger stands between this and a duplicate row.
    #[cfg(test)]
    pub(crate) async fn insert_vote_unchecked(&self, vote: &NewVote) -> Result<i64, AppError> {
        let result = sqlx::query(
            "INSERT INTO votes (candidate_id, voter_name, voter_contact, ip, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(vote.candidate_id)
        .bind(&vote.voter_name)
        .bind(&vote.voter_contact)
        .bind(&vote.ip)
        .bind(vote.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_duplicate_vote_abort(&error) {
                AppError::conflict(VOTE_ALREADY_RECORDED)
            } else {
                error.into()
            }
        })?;

        Ok(result.last_insert_rowid())
    }

    #[cfg(test)]
    pub(crate) async fn count_votes_for(&self, candidate_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE candidate_id = ?")
                .bind(candidate_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Move a vote back in time so window expiry can be exercised.
    #[cfg(test)]
    pub(crate) async fn set_vote_created_at(
        &self,
        id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE votes SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Scores
    // =========================================================================

    /// Append a score row, with its audit entry when given.
    ///
    /// # Returns
    /// `None` when the candidate does not exist
    pub async fn insert_score(
        &self,
        score: &NewScore,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Option<Score>, AppError> {
        let mut tx = ImmediateTx::begin(&self.pool).await?;

        let result = Self::insert_score_in(tx.conn()?, score, audit).await;
        match result {
            Ok(Some(score)) => {
                tx.commit().await?;
                Ok(Some(score))
            }
            Ok(None) => {
                tx.rollback().await;
                Ok(None)
            }
            Err(error) => {
                tx.rollback().await;
                Err(error)
            }
        }
    }

    async fn insert_score_in(
        conn: &mut SqliteConnection,
        score: &NewScore,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Option<Score>, AppError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM candidates WHERE id = ?")
            .bind(score.candidate_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO scores
                (candidate_id, judge_name, theme_chosen_score, theme_imposed_score, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(score.candidate_id)
        .bind(&score.judge_name)
        .bind(score.theme_chosen_score)
        .bind(score.theme_imposed_score)
        .bind(&score.notes)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if let Some(entry) = audit {
            Self::write_audit(conn, entry).await?;
        }

        let row = sqlx::query_as::<_, Score>("SELECT * FROM scores WHERE id = ?")
            .bind(inserted.last_insert_rowid())
            .fetch_one(&mut *conn)
            .await?;
        Ok(Some(row))
    }

    #[cfg(test)]
    pub(crate) async fn count_scores_for(&self, candidate_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scores WHERE candidate_id = ?")
                .bind(candidate_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Per-candidate vote totals and score averages.
    ///
    /// Both ledgers are outer-joined so candidates without votes or scores
    /// still appear. Rows come back in id order.
    pub async fn candidate_tallies(&self) -> Result<Vec<CandidateTally>, AppError> {
        let tallies = sqlx::query_as::<_, CandidateTally>(
            r#"
            SELECT c.id, c.full_name, c.city, c.country, c.photo_url,
                   COALESCE(v.total_votes, 0) AS total_votes,
                   s.average_score AS average_score,
                   COALESCE(s.passages, 0) AS passages
            FROM candidates c
            LEFT JOIN (
                SELECT candidate_id, COUNT(*) AS total_votes
                FROM votes
                GROUP BY candidate_id
            ) v ON v.candidate_id = c.id
            LEFT JOIN (
                SELECT candidate_id,
                       AVG(theme_chosen_score + theme_imposed_score) AS average_score,
                       COUNT(*) AS passages
                FROM scores
                GROUP BY candidate_id
            ) s ON s.candidate_id = c.id
            ORDER BY c.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tallies)
    }

    // =========================================================================
    // Competition settings
    // =========================================================================

    const SELECT_SETTINGS: &'static str = r#"
        SELECT max_candidates, direct_qualified, playoff_participants, playoff_winners,
               groups_count, candidates_per_group, finalists_from_winners,
               finalists_from_best_second, total_finalists, voting_enabled,
               registration_locked, competition_closed, announcement_text,
               schedule_json, updated_at
        FROM tournament_settings
        WHERE id = 1
    "#;

    /// Read the settings singleton seeded by [`Database::connect`]
    pub async fn get_settings(&self) -> Result<CompetitionSettings, AppError> {
        let settings = sqlx::query_as::<_, CompetitionSettings>(Self::SELECT_SETTINGS)
            .fetch_one(&self.pool)
            .await?;

        Ok(settings)
    }

    /// Replace every settings column and stamp `updated_at`.
    pub async fn replace_settings(
        &self,
        settings: &CompetitionSettings,
        audit: Option<&NewAuditEntry>,
    ) -> Result<CompetitionSettings, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tournament_settings (
                id, max_candidates, direct_qualified, playoff_participants, playoff_winners,
                groups_count, candidates_per_group, finalists_from_winners,
                finalists_from_best_second, total_finalists, voting_enabled,
                registration_locked, competition_closed, announcement_text,
                schedule_json, updated_at
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                max_candidates = excluded.max_candidates,
                direct_qualified = excluded.direct_qualified,
                playoff_participants = excluded.playoff_participants,
                playoff_winners = excluded.playoff_winners,
                groups_count = excluded.groups_count,
                candidates_per_group = excluded.candidates_per_group,
                finalists_from_winners = excluded.finalists_from_winners,
                finalists_from_best_second = excluded.finalists_from_best_second,
                total_finalists = excluded.total_finalists,
                voting_enabled = excluded.voting_enabled,
                registration_locked = excluded.registration_locked,
                competition_closed = excluded.competition_closed,
                announcement_text = excluded.announcement_text,
                schedule_json = excluded.schedule_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settings.max_candidates)
        .bind(settings.direct_qualified)
        .bind(settings.playoff_participants)
        .bind(settings.playoff_winners)
        .bind(settings.groups_count)
        .bind(settings.candidates_per_group)
        .bind(settings.finalists_from_winners)
        .bind(settings.finalists_from_best_second)
        .bind(settings.total_finalists)
        .bind(settings.voting_enabled)
        .bind(settings.registration_locked)
        .bind(settings.competition_closed)
        .bind(&settings.announcement_text)
        .bind(&settings.schedule_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(entry) = audit {
            Self::write_audit(&mut *tx, entry).await?;
        }

        let stored = sqlx::query_as::<_, CompetitionSettings>(Self::SELECT_SETTINGS)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(stored)
    }

    // =========================================================================
    // Contact messages
    // =========================================================================

    pub async fn insert_contact(
        &self,
        message: &NewContactMessage,
    ) -> Result<ContactMessage, AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO contact_messages (full_name, email, subject, message, ip, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.full_name)
        .bind(&message.email)
        .bind(&message.subject)
        .bind(&message.message)
        .bind(&message.ip)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, ContactMessage>("SELECT * FROM contact_messages WHERE id = ?")
            .bind(inserted.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    /// Newest first
    pub async fn list_contacts(&self, limit: i64) -> Result<Vec<ContactMessage>, AppError> {
        let rows = sqlx::query_as::<_, ContactMessage>(
            "SELECT * FROM contact_messages ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Returns whether the message exists; `audit` is stored only then.
    pub async fn set_contact_archived(
        &self,
        id: i64,
        archived: bool,
        audit: Option<&NewAuditEntry>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE contact_messages SET archived = ? WHERE id = ?")
            .bind(archived)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let found = result.rows_affected() > 0;

        if let (true, Some(entry)) = (found, audit) {
            Self::write_audit(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(found)
    }

    pub async fn delete_contact(
        &self,
        id: i64,
        audit: Option<&NewAuditEntry>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM contact_messages WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = result.rows_affected() > 0;

        if let (true, Some(entry)) = (removed, audit) {
            Self::write_audit(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    // =========================================================================
    // Audit
    // =========================================================================

    async fn write_audit(
        conn: &mut SqliteConnection,
        entry: &NewAuditEntry,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO admin_audit (action, payload, ip, created_at) VALUES (?, ?, ?, ?)")
            .bind(entry.action)
            .bind(entry.payload.to_string())
            .bind(&entry.ip)
            .bind(Utc::now())
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Standalone entry, for changes that live outside the database
    pub async fn insert_audit(&self, entry: &NewAuditEntry) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::write_audit(&mut *conn, entry).await
    }

    /// Newest first
    pub async fn list_audit(&self, limit: i64) -> Result<Vec<AuditEntry>, AppError> {
        let rows =
            sqlx::query_as::<_, AuditEntry>("SELECT * FROM admin_audit ORDER BY id DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    // =========================================================================
    // Admin config
    // =========================================================================

    pub async fn get_admin_config(&self, key: &str) -> Result<Option<String>, AppError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM admin_config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Store a value only when the key is not set yet.
    ///
    /// # Returns
    /// Whether the value was written
    pub async fn insert_admin_config_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO admin_config (key, value, updated_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite a value, with its audit entry when given.
    pub async fn set_admin_config(
        &self,
        key: &str,
        value: &str,
        audit: Option<&NewAuditEntry>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO admin_config (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if let Some(entry) = audit {
            Self::write_audit(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
