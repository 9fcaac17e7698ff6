//! Projection inputs: providers, products and the reporting timeline.

use super::{
    AllocationRuleSet, Decimal, ItemId, ItemPriceTable, LookupStrategy, ProductId, ProviderId,
    TierSchedule, TierView, TimePoint, VolumeBasis, VolumeHistory,
};
use serde::{Deserialize, Serialize};

fn default_multiplier() -> Decimal {
    Decimal::one()
}

/// A provider's contract terms as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub provider_id: ProviderId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tiers: TierSchedule,
    #[serde(default)]
    pub strategy: LookupStrategy,
    /// Tier definition that drives pricing for this provider.
    pub tier_view: TierView,
    #[serde(default, skip_serializing_if = "ItemPriceTable::is_empty")]
    pub item_prices: ItemPriceTable,
    /// Replaces the rolling-window volume when looking up the effective tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_volume_override: Option<Decimal>,
}

impl ProviderConfig {
    pub fn new(provider_id: ProviderId, tiers: TierSchedule, tier_view: TierView) -> Self {
        Self {
            provider_id,
            name: String::new(),
            tiers,
            strategy: LookupStrategy::default(),
            tier_view,
            item_prices: ItemPriceTable::new(),
            tier_volume_override: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_strategy(mut self, strategy: LookupStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// One priced component of a product with its own provider split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductItem {
    pub item_id: ItemId,
    #[serde(default)]
    pub name: String,
    pub allocation: AllocationRuleSet,
    /// < 1 is a discount, > 1 a premium.
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
}

impl ProductItem {
    pub fn new(item_id: ItemId, allocation: AllocationRuleSet) -> Self {
        Self {
            item_id,
            name: String::new(),
            allocation,
            multiplier: Decimal::one(),
        }
    }

    pub fn with_multiplier(mut self, multiplier: Decimal) -> Self {
        self.multiplier = multiplier;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductConfig {
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub volumes: VolumeHistory,
    pub items: Vec<ProductItem>,
}

impl ProductConfig {
    pub fn new(product_id: ProductId, volumes: VolumeHistory, items: Vec<ProductItem>) -> Self {
        Self {
            product_id,
            name: String::new(),
            volumes,
            items,
        }
    }
}

/// Everything one projection run needs, supplied by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub providers: Vec<ProviderConfig>,
    pub products: Vec<ProductConfig>,
    /// Months reported in the result. History before the first month still
    /// feeds rolling windows.
    pub timeline: Vec<TimePoint>,
    #[serde(default)]
    pub volume_basis: VolumeBasis,
}

impl Scenario {
    pub fn provider(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider_id == id)
    }

    /// Replace the allocation of every matching `(product, item)` pair.
    pub fn with_allocations<I>(mut self, allocations: I) -> Self
    where
        I: IntoIterator<Item = (ProductId, ItemId, AllocationRuleSet)>,
    {
        for (product_id, item_id, rules) in allocations {
            if let Some(item) = self
                .products
                .iter_mut()
                .filter(|p| p.product_id == product_id)
                .flat_map(|p| p.items.iter_mut())
                .find(|i| i.item_id == item_id)
            {
                item.allocation = rules;
            }
        }
        self
    }
}
