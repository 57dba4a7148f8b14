//! Shared helpers for integration tests across the workspace.

use anyhow::Result;
use memsync::credentials::{Credential, CredentialStore};
use memsync::crypto::TokenCipher;
use memsync::storage::SqliteProvider;
use memsync::types::ProviderType;
use std::sync::Once;
use turso::params;

static INIT: Once = Once::new();

/// Initializes tracing output for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt::init();
    });
}

/// A fixed, well-formed encryption key for tests (32 bytes hex-encoded).
pub const TEST_ENCRYPTION_KEY_HEX: &str =
    "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

/// A helper struct to manage database creation for each test.
pub struct TestSetup {
    pub provider: SqliteProvider,
    pub cipher: TokenCipher,
}

impl TestSetup {
    /// Creates a new, isolated in-memory database with the schema applied
    /// and a cipher built from the fixed test key.
    pub async fn new() -> Result<Self> {
        let provider = SqliteProvider::new(":memory:").await?;
        provider.initialize_schema().await?;
        let cipher = TokenCipher::from_hex(TEST_ENCRYPTION_KEY_HEX)?;
        Ok(Self { provider, cipher })
    }

    /// Seeds an active credential with tokens encrypted under the test key,
    /// the way the external linking flow would.
    pub async fn seed_credential(
        &self,
        user_id: &str,
        provider_type: ProviderType,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        let store = CredentialStore::new(self.provider.clone());
        store
            .upsert(&Credential {
                user_id: user_id.to_string(),
                provider_type,
                access_token_encrypted: self.cipher.encrypt(access_token),
                refresh_token_encrypted: refresh_token.map(|t| self.cipher.encrypt(t)),
                is_active: true,
                last_synced_at: None,
            })
            .await?;
        Ok(())
    }

    /// Registers a URL for the web-scrape provider to pull on sync.
    pub async fn add_scrape_source(&self, user_id: &str, url: &str) -> Result<()> {
        let conn = self.provider.db.connect()?;
        conn.execute(
            "INSERT INTO scrape_sources (user_id, url) VALUES (?, ?)",
            params![user_id, url],
        )
        .await?;
        Ok(())
    }

    /// Reads `last_synced_at` straight from storage for assertions.
    pub async fn last_synced_at(
        &self,
        user_id: &str,
        provider_type: ProviderType,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let store = CredentialStore::new(self.provider.clone());
        let credential = store.load(user_id, provider_type).await?;
        Ok(credential.last_synced_at)
    }
}
