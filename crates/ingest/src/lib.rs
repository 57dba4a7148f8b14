//! Sync orchestration.
//!
//! One [`SyncEngine`] runs the whole per-provider pipeline: build the
//! adapter, list recent items, fetch and normalize each one, persist the
//! resulting memory records, and stamp the credential's `last_synced_at`.
//! Item-level failures are logged and skipped; listing and credential
//! failures abort the run.

use chrono::Utc;
use memsync::config::SyncConfig;
use memsync::credentials::CredentialStore;
use memsync::crypto::TokenCipher;
use memsync::normalize::normalize;
use memsync::oauth::{google_token_url, OAuthConfig};
use memsync::storage::{MemoryStore, SqliteProvider};
use memsync::{ContentType, MemoryRecord, ProviderConnector, ProviderType, SyncError};
use memsync_drive::DriveConnector;
use memsync_gmail::GmailConnector;
use memsync_notion::NotionConnector;
use memsync_webscrape::WebScrapeConnector;
use tracing::{info, warn};
use uuid::Uuid;

/// How many items one sync run pulls from a provider.
pub const SYNC_ITEM_LIMIT: u32 = 50;

/// Outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Records written (created or refreshed) this run.
    pub memories_created: usize,
    /// True when the user had no records before this run and it wrote at
    /// least one, i.e. their history starts here. Callers use it to
    /// trigger first-import follow-ups like a welcome summary; a re-sync
    /// over the same items must not re-fire it.
    pub is_first_import: bool,
}

/// Dispatches sync runs across all supported providers.
pub struct SyncEngine {
    provider_db: SqliteProvider,
    memories: MemoryStore,
    credentials: CredentialStore,
    cipher: TokenCipher,
    google_oauth: OAuthConfig,
}

impl SyncEngine {
    /// Builds the engine from loaded configuration. A malformed encryption
    /// key fails here, before any provider work starts.
    pub fn new(provider_db: SqliteProvider, config: &SyncConfig) -> Result<Self, SyncError> {
        let cipher = TokenCipher::from_hex(&config.encryption_key_hex)?;
        Ok(Self {
            memories: MemoryStore::new(provider_db.clone()),
            credentials: CredentialStore::new(provider_db.clone()),
            provider_db,
            cipher,
            google_oauth: OAuthConfig {
                token_url: google_token_url(),
                client_id: config.google_client_id.clone(),
                client_secret: config.google_client_secret.clone(),
            },
        })
    }

    async fn connector_for(
        &self,
        user_id: &str,
        provider: ProviderType,
    ) -> Result<Box<dyn ProviderConnector>, SyncError> {
        Ok(match provider {
            ProviderType::Gmail => Box::new(
                GmailConnector::connect(
                    &self.provider_db,
                    &self.cipher,
                    self.google_oauth.clone(),
                    user_id,
                )
                .await?,
            ),
            ProviderType::Drive => Box::new(
                DriveConnector::connect(
                    &self.provider_db,
                    &self.cipher,
                    self.google_oauth.clone(),
                    user_id,
                )
                .await?,
            ),
            ProviderType::Notion => {
                Box::new(NotionConnector::connect(&self.provider_db, &self.cipher, user_id).await?)
            }
            ProviderType::WebScrape => Box::new(
                WebScrapeConnector::connect(&self.provider_db, &self.cipher, user_id).await?,
            ),
        })
    }

    /// Runs one sync for `(user_id, provider)`.
    ///
    /// The run's start time doubles as the `last_synced_at` stamp and as
    /// the temporal marker for items whose provider reports no timestamp.
    pub async fn sync(
        &self,
        user_id: &str,
        provider: ProviderType,
    ) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now();
        info!(%provider, user_id, "Starting sync run");

        let connector = self.connector_for(user_id, provider).await?;

        // Sampled before any writes: an upsert re-sync reports every row
        // as written, so the flag has to come from the prior state.
        let pre_existing = self.memories.count_for_user(user_id).await?;

        let items = connector.list_items(SYNC_ITEM_LIMIT).await?;
        let listed = items.len();

        let mut created = 0usize;
        for item in &items {
            let raw = match connector.get_item_content(item).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        %provider,
                        item_id = item.provider_id(),
                        error = %e,
                        "Skipping item whose content could not be fetched"
                    );
                    continue;
                }
            };

            let normalized = normalize(&raw, provider, item, started_at);
            let record = MemoryRecord {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                provider_item_id: item.provider_id().to_string(),
                content: normalized.text,
                content_type: match provider {
                    ProviderType::Drive => ContentType::Document,
                    _ => ContentType::Text,
                },
                extracted_data: normalized.metadata,
                temporal_marker: item.timestamp().unwrap_or(started_at),
            };
            if let Err(e) = self.memories.upsert(&record).await {
                warn!(
                    %provider,
                    item_id = item.provider_id(),
                    error = %e,
                    "Skipping item that could not be persisted"
                );
                continue;
            }
            created += 1;
        }

        self.credentials
            .update_last_synced(user_id, provider, started_at)
            .await?;

        let is_first_import = pre_existing == 0 && created > 0;
        info!(
            %provider,
            user_id,
            created,
            listed,
            is_first_import,
            "Sync run complete"
        );
        Ok(SyncReport {
            memories_created: created,
            is_first_import,
        })
    }
}
