use crate::datasource::ScenarioSource;
use crate::db::StoreError;
use crate::domain::{
    AllocationRuleSet, ItemId, ProductId, ProviderId, Scenario, TierView, TimePoint, VolumeBasis,
};
use futures::future::try_join_all;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Longest timeline a stored scenario may request: one hundred years.
pub const MAX_TIMELINE_MONTHS: usize = 1200;

/// Which stored products to project, and over which months.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredScenarioRequest {
    pub product_ids: Vec<ProductId>,
    pub start: TimePoint,
    pub months: usize,
    #[serde(default)]
    pub volume_basis: VolumeBasis,
}

/// Replacement allocation for the optimized side of a comparison. Without
/// an `item_id` it applies to every item of the product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOverride {
    pub product_id: ProductId,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    pub allocation: AllocationRuleSet,
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no products requested")]
    NoProducts,
    #[error("months must be at least 1")]
    EmptyTimeline,
    #[error("months must be at most {max}, got {months}")]
    TimelineTooLong { months: usize, max: usize },
    #[error("{0} not found")]
    ProductNotFound(ProductId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds engine scenarios from stored records.
#[derive(Clone)]
pub struct ScenarioAssembler {
    source: Arc<dyn ScenarioSource>,
    default_view: TierView,
}

impl ScenarioAssembler {
    pub fn new(source: Arc<dyn ScenarioSource>, default_view: TierView) -> Self {
        Self {
            source,
            default_view,
        }
    }

    /// Load the requested products and every provider their allocations
    /// reference. Providers missing from the store are left out; the
    /// projection reports them as unknown.
    pub async fn assemble(
        &self,
        request: &StoredScenarioRequest,
        overrides: &[AllocationOverride],
    ) -> Result<Scenario, AssemblyError> {
        if request.product_ids.is_empty() {
            return Err(AssemblyError::NoProducts);
        }
        if request.months == 0 {
            return Err(AssemblyError::EmptyTimeline);
        }
        if request.months > MAX_TIMELINE_MONTHS {
            return Err(AssemblyError::TimelineTooLong {
                months: request.months,
                max: MAX_TIMELINE_MONTHS,
            });
        }

        let unique: BTreeSet<ProductId> = request.product_ids.iter().copied().collect();
        let fetched = try_join_all(unique.iter().map(|id| self.source.fetch_product(*id))).await?;

        let mut products = Vec::with_capacity(fetched.len());
        for (id, product) in unique.iter().zip(fetched) {
            products.push(product.ok_or(AssemblyError::ProductNotFound(*id))?);
        }

        let mut scenario = Scenario {
            providers: Vec::new(),
            products,
            timeline: request.start.range(request.months),
            volume_basis: request.volume_basis,
        };
        scenario = apply_overrides(scenario, overrides);

        let provider_ids: BTreeSet<ProviderId> = scenario
            .products
            .iter()
            .flat_map(|p| p.items.iter())
            .flat_map(|i| i.allocation.provider_ids())
            .collect();
        let fetched = try_join_all(
            provider_ids
                .iter()
                .map(|id| self.source.fetch_provider(*id, self.default_view)),
        )
        .await?;

        for (id, provider) in provider_ids.iter().zip(fetched) {
            match provider {
                Some(provider) => scenario.providers.push(provider),
                None => warn!(provider_id = id.as_i64(), "allocated provider not stored"),
            }
        }

        info!(
            products = scenario.products.len(),
            providers = scenario.providers.len(),
            months = scenario.timeline.len(),
            overrides = overrides.len(),
            "scenario assembled"
        );
        Ok(scenario)
    }
}

fn apply_overrides(scenario: Scenario, overrides: &[AllocationOverride]) -> Scenario {
    let expanded: Vec<(ProductId, ItemId, AllocationRuleSet)> = overrides
        .iter()
        .flat_map(|o| {
            let items: Vec<ItemId> = match o.item_id {
                Some(item_id) => vec![item_id],
                None => scenario
                    .products
                    .iter()
                    .filter(|p| p.product_id == o.product_id)
                    .flat_map(|p| p.items.iter().map(|i| i.item_id))
                    .collect(),
            };
            items
                .into_iter()
                .map(move |item_id| (o.product_id, item_id, o.allocation.clone()))
        })
        .collect();
    scenario.with_allocations(expanded)
}
