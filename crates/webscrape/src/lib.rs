//! # `memsync-webscrape`: Web-Scrape Provider Adapter
//!
//! Implements the `ProviderConnector` trait for a hosted scraping service.
//! Unlike the other providers there is no remote listing API: the URLs a
//! user watches live in the local `scrape_sources` table (written by the
//! linking flow), and one POST per URL returns content plus link/image
//! metadata. The scrape happens at list time, so item content needs no
//! secondary fetch.

use async_trait::async_trait;
use memsync::connector::ProviderConnector;
use memsync::credentials::CredentialStore;
use memsync::crypto::TokenCipher;
use memsync::errors::SyncError;
use memsync::http;
use memsync::oauth::check_status;
use memsync::storage::SqliteProvider;
use memsync::types::{ProviderItem, ProviderType, ScrapedDoc};
use serde_json::{json, Value};
use std::env;
use tracing::{info, warn};

fn get_base_url() -> String {
    env::var("SCRAPER_API_BASE_URL_OVERRIDE_FOR_TESTING")
        .unwrap_or_else(|_| "https://api.scraperhost.dev".to_string())
}

/// The web-scrape adapter for one user.
///
/// The stored access token is the scrape service's API key; there is no
/// refresh flow, so a 401 from the service is terminal.
pub struct WebScrapeConnector {
    api_key: String,
    client: reqwest::Client,
    provider_db: SqliteProvider,
    user_id: String,
}

impl WebScrapeConnector {
    pub async fn connect(
        provider_db: &SqliteProvider,
        cipher: &TokenCipher,
        user_id: &str,
    ) -> Result<Self, SyncError> {
        let client = http::client()?;
        let store = CredentialStore::new(provider_db.clone());
        let credential = store.load(user_id, ProviderType::WebScrape).await?;
        let api_key = cipher.decrypt(&credential.access_token_encrypted)?;
        Ok(Self {
            api_key,
            client,
            provider_db: provider_db.clone(),
            user_id: user_id.to_string(),
        })
    }

    /// The user's watched URLs, oldest first, capped at `limit`.
    async fn watched_urls(&self, limit: u32) -> Result<Vec<String>, SyncError> {
        let conn = self.provider_db.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT url FROM scrape_sources WHERE user_id = ?
                 ORDER BY created_at, url LIMIT ?",
                turso::params![self.user_id.clone(), limit as i64],
            )
            .await?;
        let mut urls = Vec::new();
        while let Some(row) = rows.next().await? {
            urls.push(row.get::<String>(0)?);
        }
        Ok(urls)
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedDoc, SyncError> {
        let endpoint = format!("{}/v1/scrape", get_base_url());
        let body = json!({
            "url": url,
            "options": {
                "includeLinks": true,
                "includeImages": true,
                "maxDepth": 1,
                "format": "markdown",
            }
        });
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let value = response
            .json::<Value>()
            .await
            .map_err(|e| SyncError::Fetch(format!("Invalid scrape response: {e}")))?;
        parse_scrape_response(url, &value).ok_or_else(|| {
            SyncError::Fetch(format!("Scrape response for {url} contained no content"))
        })
    }
}

#[async_trait]
impl ProviderConnector for WebScrapeConnector {
    fn provider(&self) -> ProviderType {
        ProviderType::WebScrape
    }

    async fn list_items(&self, max_results: u32) -> Result<Vec<ProviderItem>, SyncError> {
        let urls = self.watched_urls(max_results).await?;
        info!("Scraping {} watched URLs", urls.len());

        let mut items = Vec::new();
        for url in urls {
            match self.scrape(&url).await {
                Ok(doc) => items.push(ProviderItem::WebScrape(doc)),
                // An auth failure poisons every remaining URL; anything
                // else only skips this one.
                Err(e @ SyncError::Auth(_)) => return Err(e),
                Err(e) => warn!("Skipping scrape source {url}: {e}"),
            }
        }
        Ok(items)
    }

    async fn get_item_content(&self, item: &ProviderItem) -> Result<String, SyncError> {
        let ProviderItem::WebScrape(doc) = item else {
            return Err(SyncError::UnsupportedContent(
                "Web-scrape adapter received a foreign item".into(),
            ));
        };
        Ok(doc.content.clone())
    }
}

// --- Response Parsing ---

/// The upstream service has shipped several response shapes over time.
/// Content is the first non-empty of `content`/`text`/`body`/`html`,
/// looked up under a `data` wrapper first and then at the top level.
fn parse_scrape_response(url: &str, value: &Value) -> Option<ScrapedDoc> {
    let scope = value.get("data").unwrap_or(value);
    let content = first_content_field(scope).or_else(|| first_content_field(value))?;

    let title = scope
        .get("title")
        .or_else(|| scope.get("metadata").and_then(|m| m.get("title")))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);

    Some(ScrapedDoc {
        url: url.to_string(),
        title,
        content: content.to_string(),
        links: string_array(scope.get("links")),
        images: string_array(scope.get("images")),
    })
}

fn first_content_field(scope: &Value) -> Option<&str> {
    ["content", "text", "body", "html"].iter().find_map(|key| {
        scope
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_field_fallback_order() {
        let with_text = json!({ "text": "from text field" });
        assert_eq!(
            parse_scrape_response("https://a.dev", &with_text).unwrap().content,
            "from text field"
        );

        let with_html = json!({ "content": "", "html": "<p>markup</p>" });
        assert_eq!(
            parse_scrape_response("https://a.dev", &with_html).unwrap().content,
            "<p>markup</p>"
        );

        let wrapped = json!({ "data": { "body": "wrapped body" } });
        assert_eq!(
            parse_scrape_response("https://a.dev", &wrapped).unwrap().content,
            "wrapped body"
        );
    }

    #[test]
    fn empty_response_yields_none() {
        assert!(parse_scrape_response("https://a.dev", &json!({})).is_none());
        assert!(parse_scrape_response("https://a.dev", &json!({ "content": "  " })).is_none());
    }

    #[test]
    fn links_images_and_title_are_captured() {
        let value = json!({
            "data": {
                "content": "article",
                "title": "An Article",
                "links": ["https://a.dev/about", 42],
                "images": ["https://a.dev/logo.png"]
            }
        });
        let doc = parse_scrape_response("https://a.dev", &value).unwrap();
        assert_eq!(doc.title.as_deref(), Some("An Article"));
        assert_eq!(doc.links, vec!["https://a.dev/about".to_string()]);
        assert_eq!(doc.images, vec!["https://a.dev/logo.png".to_string()]);
    }
}
