//! In-memory scenario source for testing without a database.

use super::ScenarioSource;
use crate::db::StoreError;
use crate::domain::{ProductConfig, ProductId, ProviderConfig, ProviderId, TierView};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Mock source that serves predefined providers and products.
///
/// Providers are stored with an explicit tier view, so `default_view` is
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct MockScenarioSource {
    providers: BTreeMap<ProviderId, ProviderConfig>,
    products: BTreeMap<ProductId, ProductConfig>,
}

impl MockScenarioSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.insert(provider.provider_id, provider);
        self
    }

    pub fn with_product(mut self, product: ProductConfig) -> Self {
        self.products.insert(product.product_id, product);
        self
    }
}

#[async_trait]
impl ScenarioSource for MockScenarioSource {
    async fn fetch_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductConfig>, StoreError> {
        Ok(self.products.get(&product_id).cloned())
    }

    async fn fetch_provider(
        &self,
        provider_id: ProviderId,
        _default_view: TierView,
    ) -> Result<Option<ProviderConfig>, StoreError> {
        Ok(self.providers.get(&provider_id).cloned())
    }
}
