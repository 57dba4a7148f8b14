//! # `memsync-drive`: Drive Provider Adapter
//!
//! Implements the `ProviderConnector` trait for a Google-Drive-style file
//! API. Listing projects only the fields the pipeline needs; content
//! fetching branches three ways: native workspace documents go through the
//! export endpoint with a fixed per-type MIME mapping, other
//! workspace-only types are unsupported, everything else is downloaded
//! directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memsync::connector::ProviderConnector;
use memsync::credentials::CredentialStore;
use memsync::crypto::TokenCipher;
use memsync::errors::SyncError;
use memsync::http;
use memsync::oauth::{OAuthConfig, OAuthSession, TokenRefresher};
use memsync::storage::SqliteProvider;
use memsync::types::{DriveFile, ProviderItem, ProviderType};
use serde::Deserialize;
use std::env;
use tracing::info;

/// Stored drive content is capped at this many characters.
pub const CONTENT_CHAR_CAP: usize = 10_000;

const WORKSPACE_MIME_PREFIX: &str = "application/vnd.google-apps.";

fn get_base_url() -> String {
    env::var("DRIVE_API_BASE_URL_OVERRIDE_FOR_TESTING")
        .unwrap_or_else(|_| "https://www.googleapis.com".to_string())
}

/// The fixed export mapping for native workspace document types. Types
/// outside this map (drawings, forms, sites, ...) have no text export.
fn export_mime_type(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/vnd.google-apps.document" => Some("text/plain"),
        "application/vnd.google-apps.spreadsheet" => Some("text/csv"),
        "application/vnd.google-apps.presentation" => Some("text/plain"),
        _ => None,
    }
}

// --- Drive API Response Structures ---

#[derive(Deserialize, Debug)]
struct FileList {
    #[serde(default)]
    files: Vec<FileMeta>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FileMeta {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    modified_time: Option<String>,
    /// The API reports sizes as decimal strings.
    #[serde(default)]
    size: Option<String>,
}

// --- Connector Implementation ---

/// The drive adapter for one (user, provider) pair.
pub struct DriveConnector {
    session: OAuthSession,
    client: reqwest::Client,
}

impl DriveConnector {
    pub async fn connect(
        provider_db: &SqliteProvider,
        cipher: &TokenCipher,
        oauth: OAuthConfig,
        user_id: &str,
    ) -> Result<Self, SyncError> {
        let client = http::client()?;
        let store = CredentialStore::new(provider_db.clone());
        let credential = store.load(user_id, ProviderType::Drive).await?;
        let access_token = cipher.decrypt(&credential.access_token_encrypted)?;
        let refresh_token = credential
            .refresh_token_encrypted
            .as_deref()
            .map(|t| cipher.decrypt(t))
            .transpose()?;
        let refresher = TokenRefresher::new(oauth, client.clone());
        let session = OAuthSession::new(
            access_token,
            refresh_token,
            Some(refresher),
            store,
            cipher.clone(),
            user_id,
            ProviderType::Drive,
        );
        Ok(Self { session, client })
    }

    async fn export_file(&self, id: &str, export_mime: &str) -> Result<String, SyncError> {
        let url = format!("{}/drive/v3/files/{id}/export", get_base_url());
        let request = self.client.get(&url).query(&[("mimeType", export_mime)]);
        let response = self.session.send_authorized(request).await?;
        response.text().await.map_err(SyncError::from)
    }

    async fn download_file(&self, id: &str) -> Result<String, SyncError> {
        let url = format!("{}/drive/v3/files/{id}", get_base_url());
        let request = self.client.get(&url).query(&[("alt", "media")]);
        let response = self.session.send_authorized(request).await?;
        response.text().await.map_err(SyncError::from)
    }
}

#[async_trait]
impl ProviderConnector for DriveConnector {
    fn provider(&self) -> ProviderType {
        ProviderType::Drive
    }

    async fn list_items(&self, max_results: u32) -> Result<Vec<ProviderItem>, SyncError> {
        let url = format!("{}/drive/v3/files", get_base_url());
        let request = self.client.get(&url).query(&[
            ("pageSize", max_results.to_string().as_str()),
            ("fields", "files(id,name,mimeType,modifiedTime,size)"),
        ]);
        let response = self.session.send_authorized(request).await?;
        let list = response
            .json::<FileList>()
            .await
            .map_err(|e| SyncError::Fetch(format!("Invalid file list response: {e}")))?;

        info!("Listed {} drive files", list.files.len());
        Ok(list
            .files
            .into_iter()
            .map(|f| {
                ProviderItem::Drive(DriveFile {
                    id: f.id,
                    name: f.name,
                    mime_type: f.mime_type,
                    modified_time: f
                        .modified_time
                        .as_deref()
                        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                        .map(DateTime::<Utc>::from),
                    size: f.size.as_deref().and_then(|s| s.parse().ok()),
                })
            })
            .collect())
    }

    async fn get_item_content(&self, item: &ProviderItem) -> Result<String, SyncError> {
        let ProviderItem::Drive(file) = item else {
            return Err(SyncError::UnsupportedContent(
                "Drive adapter received a non-drive item".into(),
            ));
        };

        let content = if file.mime_type.starts_with(WORKSPACE_MIME_PREFIX) {
            match export_mime_type(&file.mime_type) {
                Some(export_mime) => self.export_file(&file.id, export_mime).await?,
                None => {
                    return Err(SyncError::UnsupportedContent(format!(
                        "No text export for workspace type {}",
                        file.mime_type
                    )))
                }
            }
        } else {
            self.download_file(&file.id).await?
        };

        Ok(truncate_chars(content, CONTENT_CHAR_CAP))
    }
}

/// Truncates on a character boundary, never mid-codepoint.
fn truncate_chars(content: String, cap: usize) -> String {
    if content.chars().count() <= cap {
        content
    } else {
        content.chars().take(cap).collect()
    }
}
