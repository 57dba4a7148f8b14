//! Encrypted OAuth credential storage.

use crate::errors::SyncError;
use crate::storage::{optional_text, SqliteProvider};
use crate::types::ProviderType;
use chrono::{DateTime, Utc};
use turso::{params, Row};

/// The stored, encrypted OAuth token pair for one (user, provider).
///
/// Tokens are only ever held decrypted for the duration of a single
/// adapter call chain; the stored form is always `{ivHex}:{cipherHex}`.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: String,
    pub provider_type: ProviderType,
    pub access_token_encrypted: String,
    pub refresh_token_encrypted: Option<String>,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Credential {
    fn from_row(row: &Row) -> Result<Self, SyncError> {
        let provider_str: String = row.get(1)?;
        let provider_type = ProviderType::parse(&provider_str).ok_or_else(|| {
            SyncError::Internal(anyhow::anyhow!(
                "Unknown provider_type in storage: {provider_str}"
            ))
        })?;
        let is_active: i64 = row.get(4)?;
        let last_synced_at = optional_text(row.get_value(5)?)
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(DateTime::<Utc>::from)
                    .map_err(|e| {
                        SyncError::Internal(anyhow::anyhow!("Corrupt last_synced_at '{s}': {e}"))
                    })
            })
            .transpose()?;

        Ok(Credential {
            user_id: row.get(0)?,
            provider_type,
            access_token_encrypted: row.get(2)?,
            refresh_token_encrypted: optional_text(row.get_value(3)?),
            is_active: is_active != 0,
            last_synced_at,
        })
    }
}

/// Reads and updates credential rows.
///
/// Rows are created when the user links a provider (outside this
/// pipeline); this store updates the access token after a refresh and the
/// sync bookkeeping, and never deletes anything.
#[derive(Clone)]
pub struct CredentialStore {
    provider: SqliteProvider,
}

impl CredentialStore {
    pub fn new(provider: SqliteProvider) -> Self {
        Self { provider }
    }

    /// Loads the active credential for a (user, provider) pair.
    ///
    /// A missing or deactivated row is `SyncError::NotConnected`; a row
    /// that exists but cannot be decrypted later surfaces separately as
    /// `SyncError::Decryption`.
    pub async fn load(
        &self,
        user_id: &str,
        provider_type: ProviderType,
    ) -> Result<Credential, SyncError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT user_id, provider_type, access_token_encrypted,
                        refresh_token_encrypted, is_active, last_synced_at
                 FROM provider_credentials
                 WHERE user_id = ? AND provider_type = ?",
                params![user_id, provider_type.as_str()],
            )
            .await?;

        let row = rows.next().await?.ok_or_else(|| {
            SyncError::NotConnected(format!("No {provider_type} credential for user {user_id}"))
        })?;
        let credential = Credential::from_row(&row)?;
        if !credential.is_active {
            return Err(SyncError::NotConnected(format!(
                "The {provider_type} credential for user {user_id} is deactivated"
            )));
        }
        Ok(credential)
    }

    /// Inserts or replaces a credential row. Used by the linking flow and
    /// by tests to seed state.
    pub async fn upsert(&self, credential: &Credential) -> Result<(), SyncError> {
        let conn = self.provider.db.connect()?;
        conn.execute(
            "INSERT INTO provider_credentials
                 (user_id, provider_type, access_token_encrypted,
                  refresh_token_encrypted, is_active, last_synced_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, provider_type) DO UPDATE SET
                 access_token_encrypted = excluded.access_token_encrypted,
                 refresh_token_encrypted = excluded.refresh_token_encrypted,
                 is_active = excluded.is_active,
                 last_synced_at = excluded.last_synced_at",
            params![
                credential.user_id.clone(),
                credential.provider_type.as_str(),
                credential.access_token_encrypted.clone(),
                credential.refresh_token_encrypted.clone(),
                i64::from(credential.is_active),
                credential.last_synced_at.map(|t| t.to_rfc3339())
            ],
        )
        .await?;
        Ok(())
    }

    /// Persists a freshly refreshed (already encrypted) access token so the
    /// next sync run does not redundantly re-refresh.
    pub async fn update_access_token(
        &self,
        user_id: &str,
        provider_type: ProviderType,
        access_token_encrypted: &str,
    ) -> Result<(), SyncError> {
        let conn = self.provider.db.connect()?;
        conn.execute(
            "UPDATE provider_credentials SET access_token_encrypted = ?
             WHERE user_id = ? AND provider_type = ?",
            params![access_token_encrypted, user_id, provider_type.as_str()],
        )
        .await?;
        Ok(())
    }

    /// Records the start time of a completed sync run.
    pub async fn update_last_synced(
        &self,
        user_id: &str,
        provider_type: ProviderType,
        at: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let conn = self.provider.db.connect()?;
        conn.execute(
            "UPDATE provider_credentials SET last_synced_at = ?
             WHERE user_id = ? AND provider_type = ?",
            params![at.to_rfc3339(), user_id, provider_type.as_str()],
        )
        .await?;
        Ok(())
    }
}
