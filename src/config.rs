//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::MIN_PASSWORD_LENGTH;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
    pub media: MediaConfig,
    pub rate_limit: RateLimitConfig,
    pub competition: CompetitionConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Single origin allowed for cross-origin requests; any origin when unset
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Admin credentials
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    /// Seeds the stored hash on first start; ignored once a hash exists
    pub password: String,
    /// Organizer WhatsApp number used in the registration confirmation link
    #[serde(default)]
    pub whatsapp: String,
}

/// Media gallery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory scanned for gallery files
    pub root: PathBuf,
    /// Overlay filename inside `root`
    pub meta_file: String,
}

/// One sliding-window rule
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct WindowRule {
    pub limit: usize,
    pub window_seconds: u64,
}

/// Abuse guard rules per action
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub register: WindowRule,
    pub vote: WindowRule,
    pub contact: WindowRule,
}

/// Competition constants
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionConfig {
    /// Prefix of generated candidate codes (e.g., "QI26" -> "QI26-007")
    pub code_prefix: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CONCOURS__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/concours.db")?
            .set_default("admin.username", "admin")?
            .set_default("admin.whatsapp", "")?
            .set_default("media.root", "public/media")?
            .set_default("media.meta_file", ".quiz_media_meta.json")?
            .set_default("rate_limit.register.limit", 10)?
            .set_default("rate_limit.register.window_seconds", 300)?
            .set_default("rate_limit.vote.limit", 30)?
            .set_default("rate_limit.vote.window_seconds", 300)?
            .set_default("rate_limit.contact.limit", 8)?
            .set_default("rate_limit.contact.window_seconds", 300)?
            .set_default("competition.code_prefix", "QI26")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (CONCOURS__*)
            .add_source(
                Environment::with_prefix("CONCOURS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.admin.username.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "admin.username must not be empty".to_string(),
            ));
        }

        if self.admin.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(crate::error::AppError::Config(format!(
                "admin.password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self.media.meta_file.is_empty() || self.media.meta_file.contains(['/', '\\']) {
            return Err(crate::error::AppError::Config(
                "media.meta_file must be a bare filename".to_string(),
            ));
        }

        for (action, rule) in [
            ("register", self.rate_limit.register),
            ("vote", self.rate_limit.vote),
            ("contact", self.rate_limit.contact),
        ] {
            if rule.limit == 0 || rule.window_seconds == 0 {
                return Err(crate::error::AppError::Config(format!(
                    "rate_limit.{} limit and window_seconds must be greater than 0",
                    action
                )));
            }
        }

        if self.competition.code_prefix.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "competition.code_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                allowed_origin: None,
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/concours-test.db"),
            },
            admin: AdminConfig {
                username: "admin".to_string(),
                password: "correct horse".to_string(),
                whatsapp: "2250100000000".to_string(),
            },
            media: MediaConfig {
                root: PathBuf::from("/tmp/concours-media"),
                meta_file: ".quiz_media_meta.json".to_string(),
            },
            rate_limit: RateLimitConfig {
                register: WindowRule {
                    limit: 10,
                    window_seconds: 300,
                },
                vote: WindowRule {
                    limit: 30,
                    window_seconds: 300,
                },
                contact: WindowRule {
                    limit: 8,
                    window_seconds: 300,
                },
            },
            competition: CompetitionConfig {
                code_prefix: "QI26".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_admin_username() {
        let mut config = valid_config();
        config.admin.username = "  ".to_string();

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("admin.username"));
    }

    #[test]
    fn validate_rejects_short_seed_password() {
        let mut config = valid_config();
        config.admin.password = "short".to_string();

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("admin.password"));
    }

    #[test]
    fn validate_rejects_zero_window() {
        let mut config = valid_config();
        config.rate_limit.vote.window_seconds = 0;

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("rate_limit.vote"));
    }

    #[test]
    fn validate_rejects_meta_file_with_path() {
        let mut config = valid_config();
        config.media.meta_file = "../meta.json".to_string();

        assert!(config.validate().is_err());
    }
}
