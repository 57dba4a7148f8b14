//! Shared data model: providers, provider items, and memory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// A third-party content source a user can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Gmail,
    Drive,
    Notion,
    WebScrape,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Gmail => "gmail",
            ProviderType::Drive => "drive",
            ProviderType::Notion => "notion",
            ProviderType::WebScrape => "web_scrape",
        }
    }

    /// Parses the stored `provider_type` column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gmail" => Some(ProviderType::Gmail),
            "drive" => Some(ProviderType::Drive),
            "notion" => Some(ProviderType::Notion),
            "web_scrape" => Some(ProviderType::WebScrape),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lightweight reference to a mail message. The listing endpoint returns
/// ids only; the full message is fetched when content is requested.
#[derive(Debug, Clone)]
pub struct MailRef {
    pub id: String,
}

/// File metadata from the drive listing's field projection.
#[derive(Debug, Clone)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

/// A page returned by the notes search endpoint.
#[derive(Debug, Clone)]
pub struct NotesPage {
    pub id: String,
    pub title: Option<String>,
    pub last_edited_time: Option<DateTime<Utc>>,
}

/// One scraped document, content included. The scrape call happens at list
/// time, so requesting this item's content needs no further network call.
#[derive(Debug, Clone)]
pub struct ScrapedDoc {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// One provider-native unit of content as returned by an adapter's listing
/// call. Ephemeral: fetched, normalized, discarded. Never persisted
/// verbatim.
#[derive(Debug, Clone)]
pub enum ProviderItem {
    Mail(MailRef),
    Drive(DriveFile),
    Notes(NotesPage),
    WebScrape(ScrapedDoc),
}

impl ProviderItem {
    /// The provider-native identifier, used as the idempotency key when
    /// persisting the normalized record.
    pub fn provider_id(&self) -> &str {
        match self {
            ProviderItem::Mail(m) => &m.id,
            ProviderItem::Drive(f) => &f.id,
            ProviderItem::Notes(p) => &p.id,
            ProviderItem::WebScrape(d) => &d.url,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            ProviderItem::Mail(_) => None,
            ProviderItem::Drive(f) => Some(&f.name),
            ProviderItem::Notes(p) => p.title.as_deref(),
            ProviderItem::WebScrape(d) => d.title.as_deref(),
        }
    }

    /// The item's native modification timestamp, when the provider exposes
    /// one at listing time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            ProviderItem::Mail(_) => None,
            ProviderItem::Drive(f) => f.modified_time,
            ProviderItem::Notes(p) => p.last_edited_time,
            ProviderItem::WebScrape(_) => None,
        }
    }

    /// Provider-specific fields forwarded into the `extracted_data`
    /// envelope.
    pub fn extra_metadata(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        match self {
            ProviderItem::Mail(_) | ProviderItem::Notes(_) => {}
            ProviderItem::Drive(f) => {
                extra.insert("original_name".into(), json!(f.name));
                extra.insert("mime_type".into(), json!(f.mime_type));
                if let Some(size) = f.size {
                    extra.insert("original_size".into(), json!(size));
                }
            }
            ProviderItem::WebScrape(d) => {
                extra.insert("url".into(), json!(d.url));
                if !d.links.is_empty() {
                    extra.insert("links".into(), json!(d.links));
                }
                if !d.images.is_empty() {
                    extra.insert("images".into(), json!(d.images));
                }
            }
        }
        extra
    }
}

/// The coarse shape of a memory record's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Document,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ContentType::Text),
            "document" => Some(ContentType::Document),
            _ => None,
        }
    }
}

/// The normalized, persisted output of ingesting one `ProviderItem`.
///
/// Created exactly once per successfully processed item (re-runs upsert on
/// the same provider item id rather than duplicating); never updated or
/// deleted by the pipeline otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub provider_item_id: String,
    pub content: String,
    pub content_type: ContentType,
    pub extracted_data: Value,
    pub temporal_marker: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_type_round_trips_through_storage_form() {
        for provider in [
            ProviderType::Gmail,
            ProviderType::Drive,
            ProviderType::Notion,
            ProviderType::WebScrape,
        ] {
            assert_eq!(ProviderType::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(ProviderType::parse("dropbox"), None);
    }

    #[test]
    fn scraped_item_uses_url_as_provider_id() {
        let item = ProviderItem::WebScrape(ScrapedDoc {
            url: "https://example.com/post".into(),
            title: Some("A post".into()),
            content: "body".into(),
            links: vec![],
            images: vec![],
        });
        assert_eq!(item.provider_id(), "https://example.com/post");
        assert_eq!(item.title(), Some("A post"));
    }
}
