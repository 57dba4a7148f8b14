//! # SQLite Schema Definitions
//!
//! Centralizes the DDL for the local store. Credential and scrape-source
//! rows are created by the external linking flow; the pipeline only reads
//! them and updates credential bookkeeping columns.

/// All table/index creation statements, idempotent and safe to run on
/// every startup.
pub const ALL_TABLE_CREATION_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS provider_credentials (
        user_id                 TEXT NOT NULL,
        provider_type           TEXT NOT NULL,
        access_token_encrypted  TEXT NOT NULL,
        refresh_token_encrypted TEXT,
        is_active               INTEGER NOT NULL DEFAULT 1,
        last_synced_at          TEXT,
        PRIMARY KEY (user_id, provider_type)
    );",
    "CREATE TABLE IF NOT EXISTS memories (
        id               TEXT PRIMARY KEY,
        user_id          TEXT NOT NULL,
        provider_item_id TEXT NOT NULL,
        content          TEXT NOT NULL,
        content_type     TEXT NOT NULL,
        extracted_data   TEXT NOT NULL,
        temporal_marker  TEXT NOT NULL,
        UNIQUE (user_id, provider_item_id)
    );",
    "CREATE TABLE IF NOT EXISTS scrape_sources (
        user_id    TEXT NOT NULL,
        url        TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY (user_id, url)
    );",
];
