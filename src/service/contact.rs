//! Contact inbox
//!
//! Public submissions are stored first; the notifier is a best-effort
//! convenience whose failures never reach the caller.

use axum::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::audit::AuditAction;
use crate::data::{ContactMessage, Database, NewContactMessage};
use crate::error::AppError;
use crate::validation::{check_lengths, clean, validate_email};

/// Newest-first listing cap
pub const CONTACT_LIST_LIMIT: i64 = 500;

/// Outbound notification for a new contact message
#[async_trait]
pub trait ContactNotifier: Send + Sync {
    async fn notify(&self, message: &ContactMessage) -> anyhow::Result<()>;
}

/// Notifier that only writes a log event
pub struct LogNotifier;

#[async_trait]
impl ContactNotifier for LogNotifier {
    async fn notify(&self, message: &ContactMessage) -> anyhow::Result<()> {
        tracing::info!(
            contact_id = message.id,
            subject = %message.subject,
            "New contact message"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// Contact service
pub struct ContactService {
    db: Arc<Database>,
    notifier: Arc<dyn ContactNotifier>,
}

impl ContactService {
    pub fn new(db: Arc<Database>, notifier: Arc<dyn ContactNotifier>) -> Self {
        Self { db, notifier }
    }

    /// Store a message, then notify.
    ///
    /// # Errors
    /// `Validation` when a field is missing, too long, or the email is malformed
    pub async fn submit(
        &self,
        input: ContactInput,
        client_id: &str,
    ) -> Result<ContactMessage, AppError> {
        let (Some(full_name), Some(email), Some(subject), Some(message)) = (
            clean(input.full_name),
            clean(input.email),
            clean(input.subject),
            clean(input.message),
        ) else {
            return Err(AppError::validation("All fields are required"));
        };

        check_lengths([
            ("contactName", Some(full_name.as_str())),
            ("contactEmail", Some(email.as_str())),
            ("contactSubject", Some(subject.as_str())),
            ("contactMessage", Some(message.as_str())),
        ])?;
        validate_email(&email)?;

        let stored = self
            .db
            .insert_contact(&NewContactMessage {
                full_name,
                email,
                subject,
                message,
                ip: client_id.to_string(),
            })
            .await?;

        if let Err(error) = self.notifier.notify(&stored).await {
            tracing::warn!(contact_id = stored.id, error = %error, "Contact notification failed");
        }

        Ok(stored)
    }

    pub async fn list(&self) -> Result<Vec<ContactMessage>, AppError> {
        self.db.list_contacts(CONTACT_LIST_LIMIT).await
    }

    pub async fn set_archived(&self, id: i64, archived: bool, ip: &str) -> Result<(), AppError> {
        let audit = AuditAction::ContactArchive.entry(json!({ "id": id, "archived": archived }), ip);
        if !self.db.set_contact_archived(id, archived, Some(&audit)).await? {
            return Err(AppError::not_found("Message not found"));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64, ip: &str) -> Result<(), AppError> {
        let audit = AuditAction::ContactDelete.entry(json!({ "id": id }), ip);
        if !self.db.delete_contact(id, Some(&audit)).await? {
            return Err(AppError::not_found("Message not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FailingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContactNotifier for FailingNotifier {
        async fn notify(&self, _message: &ContactMessage) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("smtp unreachable")
        }
    }

    fn input() -> ContactInput {
        ContactInput {
            full_name: Some("Awa".to_string()),
            email: Some("awa@example.com".to_string()),
            subject: Some("Question".to_string()),
            message: Some("Quand commence la finale ?".to_string()),
        }
    }

    async fn service(notifier: Arc<dyn ContactNotifier>) -> (ContactService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        (ContactService::new(db, notifier), temp_dir)
    }

    #[tokio::test]
    async fn notifier_failure_is_swallowed() {
        let notifier = Arc::new(FailingNotifier {
            calls: AtomicUsize::new(0),
        });
        let (service, _temp_dir) = service(notifier.clone()).await;

        let stored = service.submit(input(), "10.0.0.1").await.unwrap();
        assert_eq!(stored.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_fields_required_and_email_checked() {
        let (service, _temp_dir) = service(Arc::new(LogNotifier)).await;

        let missing = ContactInput {
            subject: Some("  ".to_string()),
            ..input()
        };
        assert!(service.submit(missing, "10.0.0.1").await.is_err());

        let bad_email = ContactInput {
            email: Some("awa-at-example".to_string()),
            ..input()
        };
        assert!(service.submit(bad_email, "10.0.0.1").await.is_err());

        let too_long = ContactInput {
            message: Some("m".repeat(1201)),
            ..input()
        };
        assert!(service.submit(too_long, "10.0.0.1").await.is_err());

        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn archive_and_delete_missing_are_not_found() {
        let (service, _temp_dir) = service(Arc::new(LogNotifier)).await;

        assert!(matches!(
            service.set_archived(3, true, "10.0.0.9").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.delete(3, "10.0.0.9").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
