//! Database tests

use super::*;
use chrono::{Duration, Utc};
use sqlx::Connection;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

/// Second connection to the same file, outside the pool
async fn raw_connection(temp_dir: &TempDir) -> sqlx::SqliteConnection {
    let url = format!("sqlite:{}", temp_dir.path().join("test.db").display());
    sqlx::SqliteConnection::connect(&url).await.unwrap()
}

fn code(id: i64) -> String {
    format!("QI26-{:03}", id)
}

fn new_candidate(name: &str, whatsapp: &str) -> NewCandidate {
    NewCandidate {
        full_name: name.to_string(),
        age: Some(21),
        city: Some("Dakar".to_string()),
        country: Some("Sénégal".to_string()),
        email: None,
        phone: None,
        whatsapp: whatsapp.to_string(),
        photo_url: None,
        quran_level: QuranLevel::Beginner,
        motivation: None,
        status: CandidateStatus::Pending,
    }
}

fn new_vote(candidate_id: i64, ip: &str) -> NewVote {
    NewVote {
        candidate_id,
        voter_name: None,
        voter_contact: None,
        ip: ip.to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (db, _temp_dir) = create_test_db().await;
    db.ping().await.unwrap();
}

#[tokio::test]
async fn test_candidate_insert_assigns_code() {
    let (db, _temp_dir) = create_test_db().await;

    let first = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();
    let second = db
        .insert_candidate(&new_candidate("Moussa Ba", "+221770000002"), code, None)
        .await
        .unwrap();

    assert_eq!(first.candidate_code.as_deref(), Some("QI26-001"));
    assert_eq!(second.candidate_code.as_deref(), Some("QI26-002"));
    assert_eq!(first.quran_level, "Débutant");
    assert_eq!(first.status, "pending");
}

#[tokio::test]
async fn test_candidate_duplicate_identity_rejected() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();

    let same_person = db
        .insert_candidate(&new_candidate("AMINA DIALLO", "+221770000001"), code, None)
        .await
        .unwrap_err();
    assert!(matches!(same_person, crate::error::AppError::Conflict(ref m) if m == ALREADY_REGISTERED));

    let same_whatsapp = db
        .insert_candidate(&new_candidate("Someone Else", "+221770000001"), code, None)
        .await
        .unwrap_err();
    assert!(matches!(same_whatsapp, crate::error::AppError::Conflict(ref m) if m == WHATSAPP_ALREADY_USED));

    assert_eq!(db.list_candidates().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_registrations_with_same_whatsapp() {
    let (db, _temp_dir) = create_test_db().await;
    let db = Arc::new(db);

    let mut handles = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.insert_candidate(
                &new_candidate(&format!("Racer {}", i), "+221770009999"),
                code,
                None,
            )
            .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(db.list_candidates().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_candidate_update_rechecks_uniqueness() {
    let (db, _temp_dir) = create_test_db().await;

    let first = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();
    db.insert_candidate(&new_candidate("Moussa Ba", "+221770000002"), code, None)
        .await
        .unwrap();

    let clash = CandidatePatch {
        whatsapp: Some("+221770000002".to_string()),
        ..Default::default()
    };
    assert!(db.update_candidate(first.id, &clash, None).await.is_err());

    // Re-submitting its own handle is not a clash
    let own = CandidatePatch {
        whatsapp: Some("+221770000001".to_string()),
        status: Some(CandidateStatus::Approved),
        ..Default::default()
    };
    let updated = db.update_candidate(first.id, &own, None).await.unwrap();
    assert_eq!(updated.status, "approved");
    assert_eq!(updated.full_name, "Amina Diallo");
    assert_eq!(updated.candidate_code.as_deref(), Some("QI26-001"));
}

#[tokio::test]
async fn test_candidate_update_missing_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;

    let patch = CandidatePatch {
        city: Some("Thiès".to_string()),
        ..Default::default()
    };
    let error = db.update_candidate(42, &patch, None).await.unwrap_err();
    assert_eq!(error.kind(), "not_found");
}

#[tokio::test]
async fn test_vote_window() {
    let (db, _temp_dir) = create_test_db().await;
    let candidate = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();

    let first = db
        .insert_vote_if_absent(&new_vote(candidate.id, "10.0.0.1"), Duration::hours(24))
        .await
        .unwrap();
    let VoteOutcome::Recorded(first) = first else {
        panic!("first vote should be recorded");
    };

    let again = db
        .insert_vote_if_absent(&new_vote(candidate.id, "10.0.0.1"), Duration::hours(24))
        .await
        .unwrap();
    assert!(matches!(again, VoteOutcome::Duplicate));

    // Another client is independent
    let other = db
        .insert_vote_if_absent(&new_vote(candidate.id, "10.0.0.2"), Duration::hours(24))
        .await
        .unwrap();
    assert!(matches!(other, VoteOutcome::Recorded(_)));

    // Once the earlier vote ages out, the same client may vote again
    db.set_vote_created_at(first.id, Utc::now() - Duration::hours(25))
        .await
        .unwrap();
    let later = db
        .insert_vote_if_absent(&new_vote(candidate.id, "10.0.0.1"), Duration::hours(24))
        .await
        .unwrap();
    assert!(matches!(later, VoteOutcome::Recorded(_)));

    assert_eq!(db.count_votes_for(candidate.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_vote_trigger_rejects_raw_duplicate() {
    let (db, _temp_dir) = create_test_db().await;
    let candidate = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();

    db.insert_vote_unchecked(&new_vote(candidate.id, "10.0.0.1"))
        .await
        .unwrap();
    let error = db
        .insert_vote_unchecked(&new_vote(candidate.id, "10.0.0.1"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), "conflict");
    assert_eq!(db.count_votes_for(candidate.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_vote_for_missing_candidate() {
    let (db, _temp_dir) = create_test_db().await;

    let outcome = db
        .insert_vote_if_absent(&new_vote(99, "10.0.0.1"), Duration::hours(24))
        .await
        .unwrap();
    assert!(matches!(outcome, VoteOutcome::CandidateMissing));
}

#[tokio::test]
async fn test_delete_candidate_cascades() {
    let (db, _temp_dir) = create_test_db().await;
    let candidate = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();

    db.insert_vote_if_absent(&new_vote(candidate.id, "10.0.0.1"), Duration::hours(24))
        .await
        .unwrap();
    db.insert_score(
        &NewScore {
            candidate_id: candidate.id,
            judge_name: "Jury A".to_string(),
            theme_chosen_score: 8.0,
            theme_imposed_score: 7.5,
            notes: String::new(),
        },
        None,
    )
    .await
    .unwrap();

    assert!(db.delete_candidate(candidate.id, None).await.unwrap());
    assert!(!db.delete_candidate(candidate.id, None).await.unwrap());
    assert_eq!(db.count_votes_for(candidate.id).await.unwrap(), 0);
    assert_eq!(db.count_scores_for(candidate.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_tallies_include_candidates_without_activity() {
    let (db, _temp_dir) = create_test_db().await;
    let scored = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();
    let idle = db
        .insert_candidate(&new_candidate("Moussa Ba", "+221770000002"), code, None)
        .await
        .unwrap();

    for (chosen, imposed) in [(8.0, 7.0), (9.0, 6.0)] {
        db.insert_score(
            &NewScore {
                candidate_id: scored.id,
                judge_name: "Jury A".to_string(),
                theme_chosen_score: chosen,
                theme_imposed_score: imposed,
                notes: String::new(),
            },
            None,
        )
        .await
        .unwrap();
    }
    db.insert_vote_if_absent(&new_vote(scored.id, "10.0.0.1"), Duration::hours(24))
        .await
        .unwrap();

    let tallies = db.candidate_tallies().await.unwrap();
    assert_eq!(tallies.len(), 2);

    let scored_tally = tallies.iter().find(|t| t.id == scored.id).unwrap();
    assert_eq!(scored_tally.total_votes, 1);
    assert_eq!(scored_tally.passages, 2);
    assert!((scored_tally.average_score.unwrap() - 15.0).abs() < 1e-9);

    let idle_tally = tallies.iter().find(|t| t.id == idle.id).unwrap();
    assert_eq!(idle_tally.total_votes, 0);
    assert_eq!(idle_tally.passages, 0);
    assert!(idle_tally.average_score.is_none());
}

#[tokio::test]
async fn test_score_for_missing_candidate() {
    let (db, _temp_dir) = create_test_db().await;

    let score = db
        .insert_score(
            &NewScore {
                candidate_id: 7,
                judge_name: "Jury A".to_string(),
                theme_chosen_score: 5.0,
                theme_imposed_score: 5.0,
                notes: String::new(),
            },
            None,
        )
        .await
        .unwrap();
    assert!(score.is_none());
}

#[tokio::test]
async fn test_settings_defaults_and_replace() {
    let (db, _temp_dir) = create_test_db().await;

    let settings = db.get_settings().await.unwrap();
    assert_eq!(settings.max_candidates, 64);
    assert_eq!(settings.voting_enabled, 0);
    assert_eq!(settings.schedule_json, "[]");
    assert!(!settings.voting_open());
    assert!(settings.registration_open());

    let replaced = db
        .replace_settings(
            &CompetitionSettings {
                voting_enabled: 1,
                announcement_text: "Finale samedi".to_string(),
                ..settings
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(replaced.voting_enabled, 1);
    assert_eq!(replaced.announcement_text, "Finale samedi");
    assert!(replaced.updated_at.is_some());
    assert!(replaced.voting_open());
}

#[tokio::test]
async fn test_contact_inbox() {
    let (db, _temp_dir) = create_test_db().await;

    let message = db
        .insert_contact(&NewContactMessage {
            full_name: "Awa".to_string(),
            email: "awa@example.com".to_string(),
            subject: "Inscription".to_string(),
            message: "Bonjour".to_string(),
            ip: "10.0.0.1".to_string(),
        })
        .await
        .unwrap();
    assert!(!message.archived);

    assert!(db.set_contact_archived(message.id, true, None).await.unwrap());
    let listed = db.list_contacts(50).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].archived);

    assert!(db.delete_contact(message.id, None).await.unwrap());
    assert!(!db.set_contact_archived(message.id, false, None).await.unwrap());
}

#[tokio::test]
async fn test_audit_and_admin_config() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_audit(&NewAuditEntry::new(
        "candidate_delete",
        serde_json::json!({ "id": 1 }),
        "10.0.0.1",
    ))
    .await
    .unwrap();
    db.insert_audit(&NewAuditEntry::new(
        "settings_update",
        serde_json::json!({}),
        "10.0.0.1",
    ))
    .await
    .unwrap();
    let entries = db.list_audit(10).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "settings_update");
    assert_eq!(entries[1].payload, r#"{"id":1}"#);

    assert!(db.insert_admin_config_if_absent("admin_password_hash", "a").await.unwrap());
    assert!(!db.insert_admin_config_if_absent("admin_password_hash", "b").await.unwrap());
    assert_eq!(
        db.get_admin_config("admin_password_hash").await.unwrap().as_deref(),
        Some("a")
    );

    db.set_admin_config("admin_password_hash", "c", None)
        .await
        .unwrap();
    assert_eq!(
        db.get_admin_config("admin_password_hash").await.unwrap().as_deref(),
        Some("c")
    );
}

#[tokio::test]
async fn test_settings_row_is_seeded_at_connect() {
    let (db, temp_dir) = create_test_db().await;
    let mut raw = raw_connection(&temp_dir).await;
    sqlx::query("DELETE FROM tournament_settings")
        .execute(&mut raw)
        .await
        .unwrap();

    // Reads never write
    assert!(db.get_settings().await.is_err());

    drop(db);
    let reopened = Database::connect(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    assert_eq!(reopened.get_settings().await.unwrap().max_candidates, 64);
}

#[tokio::test]
async fn test_writes_wait_for_a_held_write_lock() {
    let (db, temp_dir) = create_test_db().await;
    let db = Arc::new(db);

    let mut blocker = raw_connection(&temp_dir).await;
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut blocker)
        .await
        .unwrap();

    // Give up on a registration and a vote stuck behind the lock
    let stalled = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        db.insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None),
    )
    .await;
    assert!(stalled.is_err());
    let stalled = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        db.insert_vote_if_absent(&new_vote(1, "10.0.0.1"), Duration::hours(24)),
    )
    .await;
    assert!(stalled.is_err());

    sqlx::query("ROLLBACK").execute(&mut blocker).await.unwrap();

    for i in 0..10 {
        let candidate = db
            .insert_candidate(
                &new_candidate(&format!("Candidate {}", i), &format!("+2217700001{:02}", i)),
                code,
                None,
            )
            .await
            .unwrap();
        let outcome = db
            .insert_vote_if_absent(&new_vote(candidate.id, "10.0.0.1"), Duration::hours(24))
            .await
            .unwrap();
        assert!(matches!(outcome, VoteOutcome::Recorded(_)));
    }
    assert_eq!(db.list_candidates().await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_aborted_writes_leave_pool_usable() {
    let (db, _temp_dir) = create_test_db().await;
    let db = Arc::new(db);
    let target_id = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap()
        .id;

    // Abort registrations and votes at varying points of their transactions
    let mut handles = Vec::new();
    for i in 0..100u64 {
        let db = db.clone();
        let handle = if i % 2 == 0 {
            tokio::spawn(async move {
                let _ = db
                    .insert_candidate(
                        &new_candidate(&format!("Aborted {}", i), &format!("+221771{:06}", i)),
                        code,
                        None,
                    )
                    .await;
            })
        } else {
            tokio::spawn(async move {
                let _ = db
                    .insert_vote_if_absent(
                        &new_vote(target_id, &format!("10.1.0.{}", i)),
                        Duration::hours(24),
                    )
                    .await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_micros(i * 4)).await;
        handle.abort();
        handles.push(handle);
    }
    for handle in handles {
        let _ = handle.await;
    }

    for i in 0..16 {
        let candidate = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            db.insert_candidate(
                &new_candidate(&format!("After {}", i), &format!("+221772{:06}", i)),
                code,
                None,
            ),
        )
        .await
        .expect("registration stalled after aborted writes")
        .unwrap();
        let outcome = db
            .insert_vote_if_absent(&new_vote(candidate.id, "10.2.0.1"), Duration::hours(24))
            .await
            .unwrap();
        assert!(matches!(outcome, VoteOutcome::Recorded(_)));
    }
}

#[tokio::test]
async fn test_audit_entry_commits_with_mutation() {
    let (db, _temp_dir) = create_test_db().await;

    let audit = NewAuditEntry::new("candidate_create", serde_json::json!({}), "10.0.0.9");
    let candidate = db
        .insert_candidate(
            &new_candidate("Amina Diallo", "+221770000001"),
            code,
            Some(&audit),
        )
        .await
        .unwrap();

    let entries = db.list_audit(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ip.as_deref(), Some("10.0.0.9"));
    let payload: serde_json::Value = serde_json::from_str(&entries[0].payload).unwrap();
    assert_eq!(payload["id"], candidate.id);

    // A rejected mutation leaves no entry
    assert!(
        db.insert_candidate(
            &new_candidate("Someone Else", "+221770000001"),
            code,
            Some(&audit),
        )
        .await
        .is_err()
    );
    let delete_audit =
        NewAuditEntry::new("candidate_delete", serde_json::json!({ "id": 99 }), "10.0.0.9");
    assert!(!db.delete_candidate(99, Some(&delete_audit)).await.unwrap());
    assert_eq!(db.list_audit(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_audit_rolls_back_mutation() {
    let (db, temp_dir) = create_test_db().await;
    let kept = db
        .insert_candidate(&new_candidate("Amina Diallo", "+221770000001"), code, None)
        .await
        .unwrap();

    let mut raw = raw_connection(&temp_dir).await;
    sqlx::query("DROP TABLE admin_audit")
        .execute(&mut raw)
        .await
        .unwrap();

    let audit = NewAuditEntry::new("candidate_create", serde_json::json!({}), "10.0.0.9");
    assert!(
        db.insert_candidate(&new_candidate("Moussa Ba", "+221770000002"), code, Some(&audit))
            .await
            .is_err()
    );
    assert!(db.delete_candidate(kept.id, Some(&audit)).await.is_err());
    assert!(
        db.replace_settings(
            &CompetitionSettings {
                voting_enabled: 1,
                ..Default::default()
            },
            Some(&audit),
        )
        .await
        .is_err()
    );

    let candidates = db.list_candidates().await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, kept.id);
    assert_eq!(db.get_settings().await.unwrap().voting_enabled, 0);
}
