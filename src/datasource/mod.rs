//! Sources of stored scenario inputs and volume imports.

use crate::db::StoreError;
use crate::domain::{ProductConfig, ProductId, ProviderConfig, ProviderId, TierView};
use async_trait::async_trait;

pub mod mock;
pub mod sqlite;
pub mod volume_csv;

pub use mock::MockScenarioSource;
pub use volume_csv::{parse_volume_csv, ImportError};

/// Read access to stored providers and products.
///
/// Lookups by id return `None` for unknown ids; only storage failures are
/// errors.
#[async_trait]
pub trait ScenarioSource: Send + Sync {
    async fn fetch_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductConfig>, StoreError>;

    /// `default_view` applies to providers stored without a tier view.
    async fn fetch_provider(
        &self,
        provider_id: ProviderId,
        default_view: TierView,
    ) -> Result<Option<ProviderConfig>, StoreError>;
}
