//! Process configuration.
//!
//! Loaded once at startup and injected into constructors. Nothing in the
//! pipeline reads configuration from ambient state after this point; in
//! particular the encryption key travels as an explicit [`TokenCipher`]
//! built from `encryption_key_hex`.

use crate::errors::SyncError;
use std::env;

/// Settings the ingestion pipeline needs from the environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hex-encoded 32-byte AES key for stored tokens. Absence is a fatal
    /// configuration error before any adapter is constructed.
    pub encryption_key_hex: String,
    /// OAuth client for the Google-backed providers (mail, drive).
    pub google_client_id: String,
    pub google_client_secret: String,
}

impl SyncConfig {
    /// Loads configuration from the environment; a `.env` file is honored
    /// when present.
    pub fn from_env() -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            encryption_key_hex: require("MEMSYNC_ENCRYPTION_KEY")?,
            google_client_id: require("GOOGLE_CLIENT_ID")?,
            google_client_secret: require("GOOGLE_CLIENT_SECRET")?,
        })
    }
}

fn require(name: &str) -> Result<String, SyncError> {
    env::var(name)
        .map_err(|_| SyncError::Config(format!("Missing required environment variable: {name}")))
}
