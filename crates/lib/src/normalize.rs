//! Content normalization.
//!
//! The adapters already did the heavy extraction (MIME decoding, block
//! flattening, export branching); this layer only trims the text and
//! attaches the uniform metadata envelope every memory record carries.

use crate::types::{ProviderItem, ProviderType};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Normalized output for one provider item.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub text: String,
    pub metadata: Value,
}

/// Maps raw extracted text plus provider metadata to plain text and a
/// metadata envelope: source identifier, provider item id, byte size, sync
/// timestamp, title when present, and any provider-specific extras.
pub fn normalize(
    raw: &str,
    provider: ProviderType,
    item: &ProviderItem,
    synced_at: DateTime<Utc>,
) -> Normalized {
    let text = raw.trim().to_string();

    let mut envelope = serde_json::Map::new();
    envelope.insert("source".into(), json!(provider.as_str()));
    envelope.insert("provider_item_id".into(), json!(item.provider_id()));
    envelope.insert("size_bytes".into(), json!(text.len()));
    envelope.insert("synced_at".into(), json!(synced_at.to_rfc3339()));
    if let Some(title) = item.title() {
        envelope.insert("title".into(), json!(title));
    }
    for (key, value) in item.extra_metadata() {
        envelope.insert(key, value);
    }

    Normalized {
        text,
        metadata: Value::Object(envelope),
    }
}
