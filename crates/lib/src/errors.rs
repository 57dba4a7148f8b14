use thiserror::Error;

/// The shared error type for the ingestion pipeline.
///
/// Each adapter maps its provider-specific failures into these variants so
/// the orchestrator can apply a single propagation policy: errors during
/// listing abort the sync run, errors on an individual item are logged and
/// the item is skipped.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No active credential exists for the (user, provider) pair. The
    /// caller should prompt the user to link the provider again.
    #[error("Provider is not connected: {0}")]
    NotConnected(String),

    /// Terminal authorization failure, raised after at most one token
    /// refresh attempt. The caller should prompt for re-authorization.
    #[error("Provider authorization failed: {0}")]
    Auth(String),

    /// The item's content cannot be fetched in a text form. Skipped by the
    /// orchestrator; never fatal to the batch.
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// A non-auth HTTP failure from the provider API.
    #[error("Provider API returned status {status}: {body}")]
    ProviderApi { status: u16, body: String },

    /// A stored credential could not be decrypted. Surfaced immediately,
    /// no retry: the row is corrupted or the key has changed.
    #[error("Failed to decrypt stored credential: {0}")]
    Decryption(String),

    /// Missing or malformed process configuration, fatal at construction.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A transport-level failure before any HTTP status was received.
    #[error("Failed to fetch from the provider: {0}")]
    Fetch(String),

    #[error("A database operation failed: {0}")]
    Database(#[from] turso::Error),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Fetch(err.to_string())
    }
}
