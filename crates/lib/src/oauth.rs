//! OAuth token refresh and authorized request handling.
//!
//! Every adapter call goes through [`OAuthSession::send_authorized`],
//! which applies the single allowed 401 recovery: refresh the access token
//! at most once per outer call (explicit flag, not recursion), persist the
//! re-encrypted token, retry, and treat a second 401 as terminal.

use crate::credentials::CredentialStore;
use crate::crypto::TokenCipher;
use crate::errors::SyncError;
use crate::types::ProviderType;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::env;
use tokio::sync::Mutex;
use tracing::info;

/// OAuth client settings for one provider's token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// The token endpoint's response to a refresh grant.
#[derive(Debug, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// The Google OAuth token endpoint, overridable for tests.
pub fn google_token_url() -> String {
    env::var("OAUTH_TOKEN_URL_OVERRIDE_FOR_TESTING")
        .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string())
}

/// Exchanges a refresh token for a new access token.
#[derive(Clone)]
pub struct TokenRefresher {
    config: OAuthConfig,
    client: Client,
}

impl TokenRefresher {
    pub fn new(config: OAuthConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SyncError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "Token refresh failed with status {status}: {body}"
            )));
        }
        response
            .json::<RefreshedToken>()
            .await
            .map_err(|e| SyncError::Auth(format!("Invalid token endpoint response: {e}")))
    }
}

/// Holds decrypted tokens for the duration of one adapter's call chain.
///
/// The access token lives behind a mutex so a refresh mid-chain is seen by
/// subsequent calls on the same adapter instance. The refreshed token is
/// also persisted back to the credential store immediately, re-encrypted.
pub struct OAuthSession {
    access_token: Mutex<String>,
    refresh_token: Option<String>,
    refresher: Option<TokenRefresher>,
    store: CredentialStore,
    cipher: TokenCipher,
    user_id: String,
    provider_type: ProviderType,
}

impl OAuthSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        refresher: Option<TokenRefresher>,
        store: CredentialStore,
        cipher: TokenCipher,
        user_id: &str,
        provider_type: ProviderType,
    ) -> Self {
        Self {
            access_token: Mutex::new(access_token),
            refresh_token,
            refresher,
            store,
            cipher,
            user_id: user_id.to_string(),
            provider_type,
        }
    }

    /// Sends a request with bearer authorization, refreshing the access
    /// token at most once on a 401. A 401 after the refresh, or a 401 with
    /// no refresh token available, is a terminal `SyncError::Auth`.
    pub async fn send_authorized(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        // Cloned up front so the request can be replayed after a refresh.
        // All adapter requests carry at most a JSON body, which is
        // replayable.
        let retry = request.try_clone();

        let token = self.access_token.lock().await.clone();
        let response = request.bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        let (Some(refresh_token), Some(refresher)) =
            (self.refresh_token.as_deref(), self.refresher.as_ref())
        else {
            return Err(SyncError::Auth(
                "Provider returned 401 and no refresh token is available".into(),
            ));
        };
        let retry = retry.ok_or_else(|| {
            SyncError::Internal(anyhow::anyhow!(
                "Request body cannot be replayed after a token refresh"
            ))
        })?;

        info!(
            provider = %self.provider_type,
            "Access token rejected, attempting a single refresh"
        );
        let refreshed = refresher.refresh(refresh_token).await?;
        self.store
            .update_access_token(
                &self.user_id,
                self.provider_type,
                &self.cipher.encrypt(&refreshed.access_token),
            )
            .await?;
        *self.access_token.lock().await = refreshed.access_token.clone();

        let response = retry.bearer_auth(&refreshed.access_token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Auth(
                "Provider rejected the refreshed access token".into(),
            ));
        }
        check_status(response).await
    }
}

/// Maps a non-success response to the shared error taxonomy.
pub async fn check_status(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(SyncError::Auth("Provider returned 401 Unauthorized".into()));
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::ProviderApi {
        status: status.as_u16(),
        body,
    })
}
