//! Admin password storage and verification
//!
//! Stored format: `pbkdf2_sha256$<iterations>$<salt>$<hex digest>`.
//! The iteration count travels with each hash, so raising
//! [`PBKDF2_ITERATIONS`] never invalidates existing hashes.
//! Bare SHA-256 hex digests are still accepted for verification only.

use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::data::Database;
use crate::service::AuditAction;
use crate::error::AppError;

/// Iterations used for newly written hashes
pub const PBKDF2_ITERATIONS: u32 = 210_000;

/// Minimum length of a new admin password, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// `admin_config` key holding the current hash
pub const PASSWORD_HASH_KEY: &str = "admin_password_hash";

const PBKDF2_PREFIX: &str = "pbkdf2_sha256";
const SALT_BYTES: usize = 16;

/// Verification strategies, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordScheme {
    Pbkdf2Sha256,
    LegacySha256,
}

const VERIFICATION_ORDER: [PasswordScheme; 2] =
    [PasswordScheme::Pbkdf2Sha256, PasswordScheme::LegacySha256];

impl PasswordScheme {
    /// `None` when the stored hash is not in this scheme's format
    fn verify(self, password: &str, stored: &str) -> Option<bool> {
        match self {
            PasswordScheme::Pbkdf2Sha256 => {
                let rest = stored.strip_prefix(PBKDF2_PREFIX)?.strip_prefix('$')?;
                let mut parts = rest.splitn(3, '$');
                let iterations = parts.next()?.parse::<u32>().ok()?;
                let salt = parts.next()?;
                let expected = parts.next()?;
                if iterations == 0 {
                    return Some(false);
                }
                let derived = hex::encode(pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations));
                Some(constant_time_eq(derived.as_bytes(), expected.as_bytes()))
            }
            PasswordScheme::LegacySha256 => {
                if stored.len() != 64 || !stored.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                let digest = hex::encode(Sha256::digest(password.as_bytes()));
                Some(constant_time_eq(
                    digest.as_bytes(),
                    stored.to_ascii_lowercase().as_bytes(),
                ))
            }
        }
    }
}

/// PBKDF2-HMAC-SHA256 with a 32-byte output
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut derived);
    derived
}

/// Compare in time independent of where the inputs differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Hash a password in the current scheme with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);

    let derived = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), PBKDF2_ITERATIONS);

    Ok(format!(
        "{}${}${}${}",
        PBKDF2_PREFIX,
        PBKDF2_ITERATIONS,
        salt,
        hex::encode(derived)
    ))
}

/// Check a password against a stored hash of any supported scheme
pub fn verify_password(password: &str, stored: &str) -> bool {
    if password.is_empty() || stored.is_empty() {
        return false;
    }

    VERIFICATION_ORDER
        .iter()
        .find_map(|scheme| scheme.verify(password, stored))
        .unwrap_or(false)
}

/// Admin identity verifier backed by the `admin_config` table
pub struct AdminCredentials {
    db: Arc<Database>,
    username: String,
}

impl AdminCredentials {
    pub fn new(db: Arc<Database>, username: impl Into<String>) -> Self {
        Self {
            db,
            username: username.into(),
        }
    }

    /// Store a hash of `password` unless one already exists
    pub async fn seed(&self, password: &str) -> Result<(), AppError> {
        if self.db.get_admin_config(PASSWORD_HASH_KEY).await?.is_some() {
            return Ok(());
        }

        let hash = hash_blocking(password.to_string()).await?;
        if self.db.insert_admin_config_if_absent(PASSWORD_HASH_KEY, &hash).await? {
            tracing::info!("Seeded admin password hash");
        }
        Ok(())
    }

    /// Verify a username/password pair
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, AppError> {
        if !constant_time_eq(username.as_bytes(), self.username.as_bytes()) {
            return Ok(false);
        }

        let Some(stored) = self.db.get_admin_config(PASSWORD_HASH_KEY).await? else {
            return Ok(false);
        };

        verify_blocking(password.to_string(), stored).await
    }

    /// Replace the stored hash after checking the current password. The
    /// audit entry for `ip` is written with the new hash.
    ///
    /// # Errors
    /// - `Validation` when either password is missing or the new one is too short
    /// - `Unauthorized` when the current password is wrong
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        ip: &str,
    ) -> Result<(), AppError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AppError::validation(
                "Current and new password are required",
            ));
        }

        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let stored = self
            .db
            .get_admin_config(PASSWORD_HASH_KEY)
            .await?
            .unwrap_or_default();
        if !verify_blocking(current_password.to_string(), stored).await? {
            return Err(AppError::Unauthorized);
        }

        let hash = hash_blocking(new_password.to_string()).await?;
        let audit = AuditAction::AdminChangePassword.entry(json!({}), ip);
        self.db
            .set_admin_config(PASSWORD_HASH_KEY, &hash, Some(&audit))
            .await?;
        tracing::info!("Admin password changed");
        Ok(())
    }
}

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

async fn verify_blocking(password: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(e.into()))
}
