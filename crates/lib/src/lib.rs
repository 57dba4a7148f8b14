//! # `memsync`: Core Ingestion Library
//!
//! This crate holds the shared building blocks of the ingestion pipeline:
//! the encrypted credential store, the OAuth refresh machinery, the
//! `ProviderConnector` trait that every provider adapter implements, the
//! content normalizer, and the local SQLite storage layer.
//!
//! Provider adapters live in their own crates (`memsync-gmail`,
//! `memsync-drive`, `memsync-notion`, `memsync-webscrape`) and the sync
//! orchestration lives in `memsync-ingest`. Keeping the adapters behind one
//! trait lets the orchestrator be written once against this crate.

pub mod config;
pub mod connector;
pub mod credentials;
pub mod crypto;
pub mod errors;
pub mod http;
pub mod normalize;
pub mod oauth;
pub mod storage;
pub mod types;

pub use connector::ProviderConnector;
pub use errors::SyncError;
pub use types::{ContentType, MemoryRecord, ProviderItem, ProviderType};
