//! Common test utilities for E2E tests

#![allow(dead_code)]

use concours::{AppState, config, service::SettingsUpdate};
use serde_json::Value;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "test-admin-secret";
pub const ORGANIZER_WHATSAPP: &str = "+2250100000000";
pub const META_FILE: &str = ".media_meta.json";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

/// Configuration with generous rate limits and throwaway paths under `root`
pub fn test_config(root: &std::path::Path) -> config::AppConfig {
    let rule = config::WindowRule {
        limit: 1000,
        window_seconds: 300,
    };

    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            allowed_origin: None,
        },
        database: config::DatabaseConfig {
            path: root.join("test.db"),
        },
        admin: config::AdminConfig {
            username: ADMIN_USERNAME.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            whatsapp: ORGANIZER_WHATSAPP.to_string(),
        },
        media: config::MediaConfig {
            root: root.join("media"),
            meta_file: META_FILE.to_string(),
        },
        rate_limit: config::RateLimitConfig {
            register: rule,
            vote: rule,
            contact: rule,
        },
        competition: config::CompetitionConfig {
            code_prefix: "QI26".to_string(),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        // Create temporary directory for database and media
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("media")).unwrap();

        let mut config = test_config(temp_dir.path());
        adjust(&mut config);

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Same router as the binary
        let app = concours::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn media_root(&self) -> std::path::PathBuf {
        self.state.config.media.root.clone()
    }

    /// Authenticated admin request builder
    pub fn admin(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(ADMIN_USERNAME, Some(ADMIN_PASSWORD))
    }

    /// POST a JSON body as the client `ip`
    pub async fn post_as(&self, ip: &str, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("X-Forwarded-For", ip)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Register a candidate directly and return its id
    pub async fn register(&self, full_name: &str, whatsapp: &str) -> i64 {
        let response = self
            .post_as(
                "198.51.100.1",
                "/api/register",
                &serde_json::json!({ "fullName": full_name, "whatsapp": whatsapp }),
            )
            .await;
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        body["candidateId"].as_i64().unwrap()
    }

    /// Replace settings through the service layer
    pub async fn set_settings(&self, update: SettingsUpdate) {
        self.state.settings.update(update, "127.0.0.1").await.unwrap();
    }

    pub async fn open_voting(&self) {
        self.set_settings(SettingsUpdate {
            voting_enabled: Some(1),
            ..Default::default()
        })
        .await;
    }
}
