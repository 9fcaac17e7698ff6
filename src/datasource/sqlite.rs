use super::ScenarioSource;
use crate::db::{Repository, StoreError};
use crate::domain::{ProductConfig, ProductId, ProviderConfig, ProviderId, TierView};
use async_trait::async_trait;

#[async_trait]
impl ScenarioSource for Repository {
    async fn fetch_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductConfig>, StoreError> {
        self.get_product(product_id).await
    }

    async fn fetch_provider(
        &self,
        provider_id: ProviderId,
        default_view: TierView,
    ) -> Result<Option<ProviderConfig>, StoreError> {
        self.get_provider(provider_id, default_view).await
    }
}
