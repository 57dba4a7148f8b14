//! # `memsync-notion`: Notes Provider Adapter
//!
//! Implements the `ProviderConnector` trait for a Notion-style notes API.
//! Search returns pages; content requires a second call for the page's
//! block children, which are then recursively flattened into plain text.
//! Only paragraph and heading blocks contribute text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memsync::connector::ProviderConnector;
use memsync::credentials::CredentialStore;
use memsync::crypto::TokenCipher;
use memsync::errors::SyncError;
use memsync::http;
use memsync::oauth::OAuthSession;
use memsync::storage::SqliteProvider;
use memsync::types::{NotesPage, ProviderItem, ProviderType};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::env;
use tracing::info;

/// Every request carries this versioned API header.
pub const NOTION_VERSION: &str = "2022-06-28";

fn get_base_url() -> String {
    env::var("NOTION_API_BASE_URL_OVERRIDE_FOR_TESTING")
        .unwrap_or_else(|_| "https://api.notion.com".to_string())
}

// --- Notion API Response Structures ---

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<PageResult>,
}

#[derive(Deserialize, Debug)]
struct PageResult {
    id: String,
    #[serde(default)]
    last_edited_time: Option<String>,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PropertyValue {
    Title { title: Vec<RichText> },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct RichText {
    plain_text: String,
}

#[derive(Deserialize, Debug)]
struct BlockChildren {
    #[serde(default)]
    results: Vec<Block>,
}

#[derive(Deserialize, Debug)]
struct Block {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    paragraph: Option<RichTextHolder>,
    #[serde(default)]
    heading_1: Option<RichTextHolder>,
    #[serde(default)]
    heading_2: Option<RichTextHolder>,
    #[serde(default)]
    heading_3: Option<RichTextHolder>,
    #[serde(default)]
    children: Vec<Block>,
}

#[derive(Deserialize, Debug)]
struct RichTextHolder {
    #[serde(default)]
    rich_text: Vec<RichText>,
}

// --- Connector Implementation ---

/// The notes adapter for one (user, provider) pair.
///
/// Notes tokens do not rotate through a refresh grant, so the session
/// carries no refresher: a 401 is terminal immediately.
pub struct NotionConnector {
    session: OAuthSession,
    client: reqwest::Client,
}

impl NotionConnector {
    pub async fn connect(
        provider_db: &SqliteProvider,
        cipher: &TokenCipher,
        user_id: &str,
    ) -> Result<Self, SyncError> {
        let client = http::client()?;
        let store = CredentialStore::new(provider_db.clone());
        let credential = store.load(user_id, ProviderType::Notion).await?;
        let access_token = cipher.decrypt(&credential.access_token_encrypted)?;
        let session = OAuthSession::new(
            access_token,
            None,
            None,
            store,
            cipher.clone(),
            user_id,
            ProviderType::Notion,
        );
        Ok(Self { session, client })
    }

    async fn fetch_block_children(&self, page_id: &str) -> Result<Vec<Block>, SyncError> {
        let url = format!("{}/v1/blocks/{page_id}/children", get_base_url());
        let request = self
            .client
            .get(&url)
            .query(&[("page_size", "100")])
            .header("Notion-Version", NOTION_VERSION);
        let response = self.session.send_authorized(request).await?;
        let children = response
            .json::<BlockChildren>()
            .await
            .map_err(|e| SyncError::Fetch(format!("Invalid block children response: {e}")))?;
        Ok(children.results)
    }
}

#[async_trait]
impl ProviderConnector for NotionConnector {
    fn provider(&self) -> ProviderType {
        ProviderType::Notion
    }

    async fn list_items(&self, max_results: u32) -> Result<Vec<ProviderItem>, SyncError> {
        let url = format!("{}/v1/search", get_base_url());
        let body = json!({
            "filter": { "property": "object", "value": "page" },
            "page_size": max_results,
        });
        let request = self
            .client
            .post(&url)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body);
        let response = self.session.send_authorized(request).await?;
        let search = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| SyncError::Fetch(format!("Invalid search response: {e}")))?;

        info!("Listed {} notes pages", search.results.len());
        Ok(search
            .results
            .into_iter()
            .map(|page| {
                let title = extract_page_title(&page.properties);
                ProviderItem::Notes(NotesPage {
                    id: page.id,
                    title,
                    last_edited_time: page
                        .last_edited_time
                        .as_deref()
                        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                        .map(DateTime::<Utc>::from),
                })
            })
            .collect())
    }

    async fn get_item_content(&self, item: &ProviderItem) -> Result<String, SyncError> {
        let ProviderItem::Notes(page) = item else {
            return Err(SyncError::UnsupportedContent(
                "Notes adapter received a non-notes item".into(),
            ));
        };
        let blocks = self.fetch_block_children(&page.id).await?;
        Ok(flatten_blocks(&blocks))
    }
}

// --- Content Extraction ---

/// The page title is the first `title`-type property, concatenated from
/// its rich-text runs.
fn extract_page_title(properties: &HashMap<String, PropertyValue>) -> Option<String> {
    properties.values().find_map(|prop| match prop {
        PropertyValue::Title { title } => {
            let text = join_rich_text(title);
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        PropertyValue::Other => None,
    })
}

fn join_rich_text(runs: &[RichText]) -> String {
    runs.iter()
        .map(|r| r.plain_text.as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Recursively extracts plain text from paragraph and heading blocks,
/// joining the extracted lines with blank-line separation. Every other
/// block type contributes nothing.
fn flatten_blocks(blocks: &[Block]) -> String {
    let mut lines = Vec::new();
    collect_block_text(blocks, &mut lines);
    lines.join("\n\n")
}

fn collect_block_text(blocks: &[Block], lines: &mut Vec<String>) {
    for block in blocks {
        let holder = match block.block_type.as_str() {
            "paragraph" => block.paragraph.as_ref(),
            "heading_1" => block.heading_1.as_ref(),
            "heading_2" => block.heading_2.as_ref(),
            "heading_3" => block.heading_3.as_ref(),
            _ => None,
        };
        if let Some(holder) = holder {
            let text = join_rich_text(&holder.rich_text);
            if !text.is_empty() {
                lines.push(text);
            }
        }
        collect_block_text(&block.children, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rich(text: &str) -> RichTextHolder {
        RichTextHolder {
            rich_text: vec![RichText {
                plain_text: text.to_string(),
            }],
        }
    }

    fn block(block_type: &str, holder: Option<RichTextHolder>, children: Vec<Block>) -> Block {
        let mut b = Block {
            block_type: block_type.to_string(),
            paragraph: None,
            heading_1: None,
            heading_2: None,
            heading_3: None,
            children,
        };
        match block_type {
            "paragraph" => b.paragraph = holder,
            "heading_1" => b.heading_1 = holder,
            "heading_2" => b.heading_2 = holder,
            "heading_3" => b.heading_3 = holder,
            _ => {}
        }
        b
    }

    #[test]
    fn flatten_keeps_paragraphs_and_headings_only() {
        let blocks = vec![
            block("heading_1", Some(rich("Title")), vec![]),
            block("code", None, vec![]),
            block("paragraph", Some(rich("First paragraph.")), vec![]),
            block("image", None, vec![]),
        ];
        assert_eq!(flatten_blocks(&blocks), "Title\n\nFirst paragraph.");
    }

    #[test]
    fn flatten_recurses_into_nested_children() {
        let blocks = vec![block(
            "toggle",
            None,
            vec![
                block("paragraph", Some(rich("Hidden detail.")), vec![]),
                block(
                    "bulleted_list_item",
                    None,
                    vec![block("paragraph", Some(rich("Deeper still.")), vec![])],
                ),
            ],
        )];
        assert_eq!(flatten_blocks(&blocks), "Hidden detail.\n\nDeeper still.");
    }

    #[test]
    fn empty_and_unknown_blocks_produce_empty_output() {
        let blocks = vec![
            block("paragraph", Some(RichTextHolder { rich_text: vec![] }), vec![]),
            block("divider", None, vec![]),
        ];
        assert_eq!(flatten_blocks(&blocks), "");
    }

    #[test]
    fn page_title_comes_from_the_title_property() {
        let mut properties = HashMap::new();
        properties.insert(
            "Name".to_string(),
            PropertyValue::Title {
                title: vec![
                    RichText {
                        plain_text: "Meeting ".into(),
                    },
                    RichText {
                        plain_text: "notes".into(),
                    },
                ],
            },
        );
        properties.insert("Status".to_string(), PropertyValue::Other);
        assert_eq!(
            extract_page_title(&properties),
            Some("Meeting notes".to_string())
        );
    }
}
