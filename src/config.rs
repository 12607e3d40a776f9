//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use std::env;

/// Default identity when the caller sends no credentials.
const DEFAULT_MOCK_USER_ID: u64 = 1;

/// Where positions, tours and executions are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local maps. State is lost on restart.
    Memory,
    /// Google Cloud Firestore (or its emulator).
    Firestore { project_id: String },
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Persistence backend
    pub storage: StorageBackend,
    /// Seed catalog (GeoJSON). A missing file means an empty catalog.
    pub tours_path: String,
    /// JWT signing key for bearer identities (raw bytes)
    pub jwt_signing_key: Option<Vec<u8>>,
    /// Identity used when no credentials are supplied
    pub mock_user_id: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            "firestore" => StorageBackend::Firestore {
                project_id: env::var("GCP_PROJECT_ID")
                    .map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?,
            },
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            storage,
            tours_path: env::var("TOURS_PATH")
                .unwrap_or_else(|_| "data/tours.geojson".to_string()),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(String::into_bytes),
            mock_user_id: env::var("MOCK_USER_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|id| *id > 0)
                .unwrap_or(DEFAULT_MOCK_USER_ID),
        })
    }

    /// Config for tests: in-memory storage and a known signing key.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:4200".to_string(),
            storage: StorageBackend::Memory,
            tours_path: "data/tours.geojson".to_string(),
            jwt_signing_key: Some(b"test_jwt_key_32_bytes_minimum!!".to_vec()),
            mock_user_id: DEFAULT_MOCK_USER_ID,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Unknown storage backend: {0} (expected 'memory' or 'firestore')")]
    UnknownBackend(String),
}
