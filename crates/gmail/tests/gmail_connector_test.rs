//! # Mail Adapter Integration Tests

use anyhow::Result;
use httpmock::{Method, MockServer};
use lazy_static::lazy_static;
use memsync::connector::ProviderConnector;
use memsync::errors::SyncError;
use memsync::oauth::OAuthConfig;
use memsync::types::ProviderType;
use memsync_gmail::GmailConnector;
use memsync_test_utils::{setup_tracing, TestSetup};
use serde_json::json;
use std::env;
use std::sync::Mutex;

lazy_static! {
    static ref TEST_MUTEX: Mutex<()> = Mutex::new(());
}

fn encode_body(text: &str) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(text)
}

fn oauth_config(token_url: &str) -> OAuthConfig {
    OAuthConfig {
        token_url: token_url.to_string(),
        client_id: "test-client".into(),
        client_secret: "test-secret".into(),
    }
}

#[tokio::test]
async fn test_list_and_fetch_message_content() -> Result<()> {
    setup_tracing();
    let _guard = TEST_MUTEX.lock().unwrap();
    let setup = TestSetup::new().await?;
    let mock_server = MockServer::start();
    env::set_var(
        "GMAIL_API_BASE_URL_OVERRIDE_FOR_TESTING",
        mock_server.base_url(),
    );
    let user_id = "mail-user-001";
    setup
        .seed_credential(user_id, ProviderType::Gmail, "valid-token", Some("refresh"))
        .await?;

    let list_mock = mock_server.mock(|when, then| {
        when.method(Method::GET)
            .path("/gmail/v1/users/me/messages")
            .query_param("maxResults", "10")
            .header("authorization", "Bearer valid-token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "messages": [{ "id": "msg-1" }, { "id": "msg-2" }] }));
    });

    let detail_mock = mock_server.mock(|when, then| {
        when.method(Method::GET).path("/gmail/v1/users/me/messages/msg-1");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "id": "msg-1",
                "payload": {
                    "mimeType": "multipart/alternative",
                    "headers": [
                        { "name": "Subject", "value": "Lunch?" },
                        { "name": "From", "value": "carol@example.com" }
                    ],
                    "parts": [
                        {
                            "mimeType": "text/html",
                            "body": { "data": encode_body("<b>Lunch at noon</b>") }
                        },
                        {
                            "mimeType": "text/plain",
                            "body": { "data": encode_body("Lunch at noon?") }
                        }
                    ]
                }
            }));
    });

    let connector = GmailConnector::connect(
        &setup.provider,
        &setup.cipher,
        oauth_config(&mock_server.url("/token")),
        user_id,
    )
    .await?;

    let items = connector.list_items(10).await?;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].provider_id(), "msg-1");

    let content = connector.get_item_content(&items[0]).await?;
    assert_eq!(
        content,
        "Subject: Lunch?\nFrom: carol@example.com\n\nLunch at noon?"
    );

    list_mock.assert();
    detail_mock.assert();
    env::remove_var("GMAIL_API_BASE_URL_OVERRIDE_FOR_TESTING");
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_refreshed_exactly_once() -> Result<()> {
    setup_tracing();
    let _guard = TEST_MUTEX.lock().unwrap();
    let setup = TestSetup::new().await?;
    let mock_server = MockServer::start();
    env::set_var(
        "GMAIL_API_BASE_URL_OVERRIDE_FOR_TESTING",
        mock_server.base_url(),
    );
    let user_id = "mail-user-002";
    setup
        .seed_credential(
            user_id,
            ProviderType::Gmail,
            "expired-token",
            Some("refresh-token"),
        )
        .await?;

    // The expired token gets a 401; the refreshed token succeeds.
    let rejected_mock = mock_server.mock(|when, then| {
        when.method(Method::GET)
            .path("/gmail/v1/users/me/messages")
            .header("authorization", "Bearer expired-token");
        then.status(401);
    });
    let accepted_mock = mock_server.mock(|when, then| {
        when.method(Method::GET)
            .path("/gmail/v1/users/me/messages")
            .header("authorization", "Bearer fresh-token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "messages": [{ "id": "msg-9" }] }));
    });
    let token_mock = mock_server.mock(|when, then| {
        when.method(Method::POST)
            .path("/token")
            .body_contains("grant_type=refresh_token")
            .body_contains("refresh_token=refresh-token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "access_token": "fresh-token", "expires_in": 3600 }));
    });

    let connector = GmailConnector::connect(
        &setup.provider,
        &setup.cipher,
        oauth_config(&mock_server.url("/token")),
        user_id,
    )
    .await?;

    let items = connector.list_items(10).await?;
    assert_eq!(items.len(), 1);

    rejected_mock.assert();
    token_mock.assert();
    accepted_mock.assert();

    // The refreshed token must be persisted back, re-encrypted.
    let store = memsync::credentials::CredentialStore::new(setup.provider.clone());
    let credential = store.load(user_id, ProviderType::Gmail).await?;
    assert_eq!(
        setup.cipher.decrypt(&credential.access_token_encrypted)?,
        "fresh-token"
    );

    env::remove_var("GMAIL_API_BASE_URL_OVERRIDE_FOR_TESTING");
    Ok(())
}

#[tokio::test]
async fn test_second_401_after_refresh_is_terminal() -> Result<()> {
    setup_tracing();
    let _guard = TEST_MUTEX.lock().unwrap();
    let setup = TestSetup::new().await?;
    let mock_server = MockServer::start();
    env::set_var(
        "GMAIL_API_BASE_URL_OVERRIDE_FOR_TESTING",
        mock_server.base_url(),
    );
    let user_id = "mail-user-003";
    setup
        .seed_credential(
            user_id,
            ProviderType::Gmail,
            "expired-token",
            Some("refresh-token"),
        )
        .await?;

    // Every list call is rejected, even with the refreshed token.
    let list_mock = mock_server.mock(|when, then| {
        when.method(Method::GET).path("/gmail/v1/users/me/messages");
        then.status(401);
    });
    let token_mock = mock_server.mock(|when, then| {
        when.method(Method::POST).path("/token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "access_token": "still-bad", "expires_in": 3600 }));
    });

    let connector = GmailConnector::connect(
        &setup.provider,
        &setup.cipher,
        oauth_config(&mock_server.url("/token")),
        user_id,
    )
    .await?;

    match connector.list_items(10).await {
        Err(SyncError::Auth(_)) => {}
        other => panic!("expected terminal AuthError, got {other:?}"),
    }

    // Exactly one refresh attempt, exactly two list attempts.
    token_mock.assert_hits(1);
    list_mock.assert_hits(2);

    env::remove_var("GMAIL_API_BASE_URL_OVERRIDE_FOR_TESTING");
    Ok(())
}

#[tokio::test]
async fn test_missing_credential_is_not_connected() -> Result<()> {
    setup_tracing();
    let _guard = TEST_MUTEX.lock().unwrap();
    let setup = TestSetup::new().await?;

    let result = GmailConnector::connect(
        &setup.provider,
        &setup.cipher,
        oauth_config("http://127.0.0.1:9/token"),
        "unlinked-user",
    )
    .await;

    match result {
        Err(SyncError::NotConnected(_)) => Ok(()),
        Err(e) => panic!("expected NotConnected, got {e:?}"),
        Ok(_) => panic!("expected NotConnected, got a connector"),
    }
}
