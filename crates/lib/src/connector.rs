use crate::errors::SyncError;
use crate::types::{ProviderItem, ProviderType};
use async_trait::async_trait;

/// The uniform capability surface every provider adapter implements.
///
/// Adapters are constructed per sync run for one (user, provider) pair;
/// construction loads and decrypts the stored credential, so a constructed
/// adapter is always backed by an active credential. The orchestrator is
/// written once against this trait and the tagged-union [`ProviderItem`].
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    /// Which provider this adapter fronts.
    fn provider(&self) -> ProviderType;

    /// Lists up to `max_results` provider-native items. An error here
    /// aborts the whole sync run.
    async fn list_items(&self, max_results: u32) -> Result<Vec<ProviderItem>, SyncError>;

    /// Fetches and extracts the plain-text content for one listed item.
    /// Errors here are isolated per item by the orchestrator. Passing an
    /// item from a different provider is `SyncError::UnsupportedContent`.
    async fn get_item_content(&self, item: &ProviderItem) -> Result<String, SyncError>;
}
