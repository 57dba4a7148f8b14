//! # `memsync-gmail`: Mail Provider Adapter
//!
//! Implements the `ProviderConnector` trait from the core `memsync`
//! library for a Gmail-style mail API. Listing returns lightweight message
//! references; each reference needs a second fetch for its full payload,
//! from which the subject and sender headers plus the `text/plain` body
//! are extracted.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use memsync::connector::ProviderConnector;
use memsync::credentials::CredentialStore;
use memsync::crypto::TokenCipher;
use memsync::errors::SyncError;
use memsync::http;
use memsync::oauth::{OAuthConfig, OAuthSession, TokenRefresher};
use memsync::storage::SqliteProvider;
use memsync::types::{MailRef, ProviderItem, ProviderType};
use serde::Deserialize;
use std::env;
use tracing::info;

fn get_base_url() -> String {
    env::var("GMAIL_API_BASE_URL_OVERRIDE_FOR_TESTING")
        .unwrap_or_else(|_| "https://gmail.googleapis.com".to_string())
}

// --- Gmail API Response Structures ---

#[derive(Deserialize, Debug)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageId>,
}

#[derive(Deserialize, Debug)]
struct MessageId {
    id: String,
}

#[derive(Deserialize, Debug)]
struct Message {
    payload: Option<MessagePart>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Deserialize, Debug)]
struct Header {
    name: String,
    value: String,
}

#[derive(Deserialize, Debug)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

// --- Connector Implementation ---

/// The mail adapter for one (user, provider) pair.
pub struct GmailConnector {
    session: OAuthSession,
    client: reqwest::Client,
}

impl GmailConnector {
    /// Loads the user's mail credential, decrypts the token pair, and
    /// prepares the authorized session.
    pub async fn connect(
        provider_db: &SqliteProvider,
        cipher: &TokenCipher,
        oauth: OAuthConfig,
        user_id: &str,
    ) -> Result<Self, SyncError> {
        let client = http::client()?;
        let store = CredentialStore::new(provider_db.clone());
        let credential = store.load(user_id, ProviderType::Gmail).await?;
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
            ProviderType::Gmail,
        );
        Ok(Self { session, client })
    }

    async fn fetch_message(&self, id: &str) -> Result<Message, SyncError> {
        let url = format!(
            "{}/gmail/v1/users/me/messages/{id}?format=full",
            get_base_url()
        );
        let response = self.session.send_authorized(self.client.get(&url)).await?;
        response
            .json::<Message>()
            .await
            .map_err(|e| SyncError::Fetch(format!("Invalid message response: {e}")))
    }
}

#[async_trait]
impl ProviderConnector for GmailConnector {
    fn provider(&self) -> ProviderType {
        ProviderType::Gmail
    }

    async fn list_items(&self, max_results: u32) -> Result<Vec<ProviderItem>, SyncError> {
        let url = format!(
            "{}/gmail/v1/users/me/messages?maxResults={max_results}",
            get_base_url()
        );
        let response = self.session.send_authorized(self.client.get(&url)).await?;
        let list = response
            .json::<MessageList>()
            .await
            .map_err(|e| SyncError::Fetch(format!("Invalid message list response: {e}")))?;

        info!("Listed {} mail messages", list.messages.len());
        Ok(list
            .messages
            .into_iter()
            .map(|m| ProviderItem::Mail(MailRef { id: m.id }))
            .collect())
    }

    async fn get_item_content(&self, item: &ProviderItem) -> Result<String, SyncError> {
        let ProviderItem::Mail(mail) = item else {
            return Err(SyncError::UnsupportedContent(
                "Mail adapter received a non-mail item".into(),
            ));
        };
        let message = self.fetch_message(&mail.id).await?;
        Ok(extract_message_text(&message))
    }
}

// --- Content Extraction ---

/// Concatenates the subject and sender headers, then the text body.
fn extract_message_text(message: &Message) -> String {
    let Some(payload) = &message.payload else {
        return String::new();
    };

    let mut header_lines = Vec::new();
    if let Some(subject) = header_value(payload, "Subject") {
        header_lines.push(format!("Subject: {subject}"));
    }
    if let Some(from) = header_value(payload, "From") {
        header_lines.push(format!("From: {from}"));
    }

    let body = extract_text_body(payload).unwrap_or_default();
    match (header_lines.is_empty(), body.is_empty()) {
        (true, _) => body,
        (false, true) => header_lines.join("\n"),
        (false, false) => format!("{}\n\n{}", header_lines.join("\n"), body),
    }
}

fn header_value<'a>(payload: &'a MessagePart, name: &str) -> Option<&'a str> {
    payload
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Prefers a direct body payload, falling back to the first `text/plain`
/// part in the (possibly nested) multipart tree. Binary and HTML-only
/// parts contribute nothing.
fn extract_text_body(payload: &MessagePart) -> Option<String> {
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref()) {
        if let Some(text) = decode_body(data) {
            return Some(text);
        }
    }
    find_plain_text_part(&payload.parts)
}

fn find_plain_text_part(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if part.mime_type.as_deref() == Some("text/plain") {
            if let Some(text) = part
                .body
                .as_ref()
                .and_then(|b| b.data.as_deref())
                .and_then(decode_body)
            {
                return Some(text);
            }
        }
        if let Some(text) = find_plain_text_part(&part.parts) {
            return Some(text);
        }
    }
    None
}

/// Mail bodies are base64url, sometimes padded, sometimes not.
fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text)
    }

    fn headers() -> Vec<Header> {
        vec![
            Header {
                name: "Subject".into(),
                value: "Quarterly report".into(),
            },
            Header {
                name: "From".into(),
                value: "alice@example.com".into(),
            },
            Header {
                name: "To".into(),
                value: "bob@example.com".into(),
            },
        ]
    }

    #[test]
    fn direct_body_is_preferred() {
        let message = Message {
            payload: Some(MessagePart {
                mime_type: Some("text/plain".into()),
                headers: headers(),
                body: Some(PartBody {
                    data: Some(encode("Hello from the body.")),
                }),
                parts: vec![],
            }),
        };
        assert_eq!(
            extract_message_text(&message),
            "Subject: Quarterly report\nFrom: alice@example.com\n\nHello from the body."
        );
    }

    #[test]
    fn multipart_falls_back_to_the_text_plain_part() {
        let message = Message {
            payload: Some(MessagePart {
                mime_type: Some("multipart/alternative".into()),
                headers: headers(),
                body: None,
                parts: vec![
                    MessagePart {
                        mime_type: Some("text/html".into()),
                        body: Some(PartBody {
                            data: Some(encode("<p>rich</p>")),
                        }),
                        ..Default::default()
                    },
                    MessagePart {
                        mime_type: Some("text/plain".into()),
                        body: Some(PartBody {
                            data: Some(encode("plain text wins")),
                        }),
                        ..Default::default()
                    },
                ],
            }),
        };
        assert!(extract_message_text(&message).ends_with("plain text wins"));
    }

    #[test]
    fn nested_multipart_parts_are_scanned() {
        let message = Message {
            payload: Some(MessagePart {
                headers: headers(),
                parts: vec![MessagePart {
                    mime_type: Some("multipart/related".into()),
                    parts: vec![MessagePart {
                        mime_type: Some("text/plain".into()),
                        body: Some(PartBody {
                            data: Some(encode("deeply nested")),
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }),
        };
        assert!(extract_message_text(&message).contains("deeply nested"));
    }

    #[test]
    fn binary_only_message_yields_headers_without_error() {
        let message = Message {
            payload: Some(MessagePart {
                headers: headers(),
                parts: vec![MessagePart {
                    mime_type: Some("image/png".into()),
                    body: Some(PartBody {
                        data: Some("iVBORw0KGgo".into()),
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        };
        // The PNG bytes are not valid UTF-8, so only headers survive.
        assert_eq!(
            extract_message_text(&message),
            "Subject: Quarterly report\nFrom: alice@example.com"
        );
    }

    #[test]
    fn padded_base64url_bodies_decode() {
        assert_eq!(decode_body("aGk="), Some("hi".to_string()));
        assert_eq!(decode_body("aGk"), Some("hi".to_string()));
    }
}
