//! Local SQLite persistence via Turso.

use crate::errors::SyncError;
use crate::types::{ContentType, MemoryRecord};
use chrono::DateTime;
use std::fmt::{self, Debug};
use turso::{params, Database, Value as TursoValue};

pub mod sql;

/// A provider for the local SQLite database.
///
/// Holds a `Database` instance, which manages a connection pool. Cloning
/// shares the same underlying database, which is how the credential store,
/// memory store, and adapters all see one state.
#[derive(Clone)]
pub struct SqliteProvider {
    pub db: Database,
}

impl SqliteProvider {
    /// Creates a provider from a file path, or `":memory:"` for an
    /// isolated in-memory database (clone the provider to share it).
    pub async fn new(db_path: &str) -> Result<Self, SyncError> {
        let db = turso::Builder::new_local(db_path).build().await?;

        // WAL improves concurrency for file-based databases and is a no-op
        // in memory. PRAGMA returns a row, so `query` not `execute`.
        let conn = db.connect()?;
        conn.query("PRAGMA journal_mode=WAL;", ()).await?;

        Ok(Self { db })
    }

    /// Ensures all required tables and indexes exist. Idempotent.
    pub async fn initialize_schema(&self) -> Result<(), SyncError> {
        let conn = self.db.connect()?;
        for statement in sql::ALL_TABLE_CREATION_SQL {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }

    /// A helper for tests to pre-populate data from raw SQL statements.
    pub async fn initialize_with_data(&self, init_sql: &str) -> Result<(), SyncError> {
        let conn = self.db.connect()?;
        for statement in init_sql.split(';').filter(|s| !s.trim().is_empty()) {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }
}

impl Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").finish_non_exhaustive()
    }
}

impl AsRef<Database> for SqliteProvider {
    fn as_ref(&self) -> &Database {
        &self.db
    }
}

/// Writes and counts normalized memory records.
#[derive(Clone)]
pub struct MemoryStore {
    provider: SqliteProvider,
}

impl MemoryStore {
    pub fn new(provider: SqliteProvider) -> Self {
        Self { provider }
    }

    /// Persists one record, keyed on `(user_id, provider_item_id)` so that
    /// re-running a sync over the same provider items updates rather than
    /// duplicates.
    pub async fn upsert(&self, record: &MemoryRecord) -> Result<(), SyncError> {
        let conn = self.provider.db.connect()?;
        let extracted = serde_json::to_string(&record.extracted_data)
            .map_err(|e| SyncError::Internal(anyhow::anyhow!("Invalid extracted_data: {e}")))?;
        conn.execute(
            "INSERT INTO memories
                 (id, user_id, provider_item_id, content, content_type, extracted_data, temporal_marker)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, provider_item_id) DO UPDATE SET
                 content = excluded.content,
                 content_type = excluded.content_type,
                 extracted_data = excluded.extracted_data,
                 temporal_marker = excluded.temporal_marker",
            params![
                record.id.clone(),
                record.user_id.clone(),
                record.provider_item_id.clone(),
                record.content.clone(),
                record.content_type.as_str(),
                extracted,
                record.temporal_marker.to_rfc3339()
            ],
        )
        .await?;
        Ok(())
    }

    /// Total memory records for a user, across all providers.
    pub async fn count_for_user(&self, user_id: &str) -> Result<usize, SyncError> {
        let conn = self.provider.db.connect()?;
        let count = conn
            .query(
                "SELECT COUNT(*) FROM memories WHERE user_id = ?",
                params![user_id],
            )
            .await?
            .next()
            .await?
            .map_or(0, |row| row.get::<i64>(0).unwrap_or(0) as usize);
        Ok(count)
    }

    /// Loads a user's records ordered by insertion, for tests and callers
    /// that inspect sync output.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<MemoryRecord>, SyncError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, user_id, provider_item_id, content, content_type, extracted_data, temporal_marker
                 FROM memories WHERE user_id = ? ORDER BY rowid",
                params![user_id],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let content_type_str: String = row.get(4)?;
            let extracted_str: String = row.get(5)?;
            let marker_str: String = row.get(6)?;
            records.push(MemoryRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                provider_item_id: row.get(2)?,
                content: row.get(3)?,
                content_type: ContentType::parse(&content_type_str).ok_or_else(|| {
                    SyncError::Internal(anyhow::anyhow!(
                        "Unknown content_type in storage: {content_type_str}"
                    ))
                })?,
                extracted_data: serde_json::from_str(&extracted_str).map_err(|e| {
                    SyncError::Internal(anyhow::anyhow!("Corrupt extracted_data JSON: {e}"))
                })?,
                temporal_marker: DateTime::parse_from_rfc3339(&marker_str)
                    .map_err(|e| {
                        SyncError::Internal(anyhow::anyhow!("Corrupt temporal_marker: {e}"))
                    })?
                    .into(),
            });
        }
        Ok(records)
    }
}

/// Converts a Turso text-or-null column into an `Option<String>`.
pub(crate) fn optional_text(value: TursoValue) -> Option<String> {
    match value {
        TursoValue::Text(s) => Some(s),
        _ => None,
    }
}
