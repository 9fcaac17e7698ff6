use crate::domain::{
    Decimal, ItemId, ProductId, ProviderConfig, ProviderId, ResolvedTier, Scenario, TierNumber,
    TierView, TimePoint, ValidationError, VolumePoint, VolumeSource,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::{
    sorted_series, AllocationSplitter, PricingResolver, RollingWindowAggregator, TierResolver,
    Warning,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionOptions {
    /// Treat a percentage allocation that does not sum to 100 as an error
    /// instead of a warning.
    #[serde(default)]
    pub strict_allocation: bool,
}

/// One provider-month of a projection. All three tier views are reported
/// side by side; `tier_in_use` is the one that priced `cost`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPoint {
    #[serde(flatten)]
    pub time: TimePoint,
    /// Unrolled allocated volume from the strategy's source series.
    pub raw_volume: Decimal,
    /// Rolling-window volume (or the configured override).
    pub effective_volume: Decimal,
    /// Allocated volume that was priced this month.
    pub billed_units: Decimal,
    pub raw_tier: ResolvedTier,
    pub effective_tier: ResolvedTier,
    pub billed_tier: Option<TierNumber>,
    pub tier_in_use: ResolvedTier,
    /// View that supplied `tier_in_use`; differs from the requested view on fallback.
    pub tier_source: TierView,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProjection {
    pub provider_id: ProviderId,
    pub name: String,
    pub tier_view: TierView,
    pub billed_tier: Option<TierNumber>,
    pub points: Vec<ProviderPoint>,
    pub total_cost: Decimal,
    pub total_units: Decimal,
}

impl ProviderProjection {
    pub fn cost_series(&self) -> Vec<(TimePoint, Decimal)> {
        self.points.iter().map(|p| (p.time, p.cost)).collect()
    }
}

/// Units and cost one item sent to one provider over the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBreakdown {
    pub item_id: ItemId,
    pub name: String,
    pub provider_id: ProviderId,
    pub multiplier: Decimal,
    pub units: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBreakdown {
    pub product_id: ProductId,
    pub name: String,
    pub items: Vec<ItemBreakdown>,
    pub total_cost: Decimal,
    pub total_units: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub providers: Vec<ProviderProjection>,
    pub products: Vec<ProductBreakdown>,
    pub total_cost: Decimal,
    pub total_units: Decimal,
    pub warnings: Vec<Warning>,
}

impl ProjectionResult {
    pub fn provider(&self, id: ProviderId) -> Option<&ProviderProjection> {
        self.providers.iter().find(|p| p.provider_id == id)
    }

    pub fn product(&self, id: ProductId) -> Option<&ProductBreakdown> {
        self.products.iter().find(|p| p.product_id == id)
    }
}

/// Allocated, billable volume for one item, provider and month.
struct Allocated {
    product_idx: usize,
    item_idx: usize,
    provider_id: ProviderId,
    time: TimePoint,
    units: Decimal,
}

/// Composes allocation, rolling aggregation, tier resolution and pricing
/// into per-provider cost series.
pub struct CostProjector;

impl CostProjector {
    /// # Errors
    /// Structural problems (empty tier table, duplicate ids, negative units
    /// or prices, non-positive multipliers, bad percentage sums under
    /// `strict_allocation`, and costs beyond the decimal range) abort the
    /// projection. Configuration gaps do not;
    /// they are listed in `warnings`.
    pub fn project(
        scenario: &Scenario,
        options: &ProjectionOptions,
    ) -> Result<ProjectionResult, ValidationError> {
        let mut warnings = BTreeSet::new();
        let providers = Self::index_providers(&scenario.providers)?;

        let mut timeline = scenario.timeline.clone();
        timeline.sort();
        timeline.dedup();
        let timeline_idx: BTreeMap<TimePoint, usize> =
            timeline.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        debug!(
            providers = scenario.providers.len(),
            products = scenario.products.len(),
            months = timeline.len(),
            "projecting scenario"
        );

        let mut lookup_streams: BTreeMap<ProviderId, BTreeMap<TimePoint, Decimal>> =
            BTreeMap::new();
        let mut billed = Vec::new();
        let mut seen_products = BTreeSet::new();

        for (product_idx, product) in scenario.products.iter().enumerate() {
            if !seen_products.insert(product.product_id) {
                return Err(ValidationError::DuplicateProduct {
                    product_id: product.product_id,
                });
            }

            let actuals = sorted_series(
                &product.volumes.actuals,
                &format!("{} actuals", product.product_id),
            )?;
            let forecasts = sorted_series(
                &product.volumes.forecasts,
                &format!("{} forecasts", product.product_id),
            )?;
            let basis_series = product.volumes.for_basis(scenario.volume_basis);

            let mut seen_items = BTreeSet::new();
            for (item_idx, item) in product.items.iter().enumerate() {
                if !seen_items.insert(item.item_id) {
                    return Err(ValidationError::DuplicateItem {
                        product_id: product.product_id,
                        item_id: item.item_id,
                    });
                }
                PricingResolver::check_multiplier(item.item_id, item.multiplier)?;

                let context = format!("{}/{}", product.product_id, item.item_id);
                if let Some(total) = item
                    .allocation
                    .validate(&context, options.strict_allocation)?
                {
                    warnings.insert(Warning::AllocationSumMismatch {
                        product_id: product.product_id,
                        item_id: item.item_id,
                        total,
                    });
                }
                for provider_id in item.allocation.provider_ids() {
                    if !providers.contains_key(&provider_id) {
                        warnings.insert(Warning::UnknownProvider {
                            product_id: product.product_id,
                            item_id: item.item_id,
                            provider_id,
                        });
                    }
                }

                for (provider_id, series) in
                    AllocationSplitter::split_sorted(&basis_series, &item.allocation)?
                {
                    billed.extend(
                        series
                            .into_iter()
                            .filter(|p| timeline_idx.contains_key(&p.time))
                            .map(|p| Allocated {
                                product_idx,
                                item_idx,
                                provider_id,
                                time: p.time,
                                units: p.units,
                            }),
                    );
                }

                for (source, series) in [
                    (VolumeSource::Actuals, &actuals),
                    (VolumeSource::Forecasts, &forecasts),
                ] {
                    let wanted: BTreeSet<ProviderId> = item
                        .allocation
                        .provider_ids()
                        .into_iter()
                        .filter(|id| providers.get(id).is_some_and(|p| p.strategy.source == source))
                        .collect();
                    if wanted.is_empty() {
                        continue;
                    }

                    for (provider_id, allocated) in
                        AllocationSplitter::split_sorted(series, &item.allocation)?
                    {
                        if !wanted.contains(&provider_id) {
                            continue;
                        }
                        let stream = lookup_streams.entry(provider_id).or_default();
                        for point in allocated {
                            let slot = stream.entry(point.time).or_insert_with(Decimal::zero);
                            *slot = add(*slot, point.units, || {
                                format!("{} lookup volume at {}", provider_id, point.time)
                            })?;
                        }
                    }
                }
            }
        }

        let mut projections = Vec::with_capacity(scenario.providers.len());
        for provider in &scenario.providers {
            let stream = lookup_streams
                .remove(&provider.provider_id)
                .unwrap_or_default();
            projections.push(Self::provider_tiers(
                provider,
                stream,
                &timeline,
                &mut warnings,
            )?);
        }
        let projection_idx: BTreeMap<ProviderId, usize> = projections
            .iter()
            .enumerate()
            .map(|(i, p)| (p.provider_id, i))
            .collect();

        let mut item_totals: Vec<BTreeMap<(ItemId, ProviderId), ItemBreakdown>> =
            vec![BTreeMap::new(); scenario.products.len()];

        for allocated in billed {
            let product = &scenario.products[allocated.product_idx];
            let item = &product.items[allocated.item_idx];

            let mut cost = Decimal::zero();
            if let (Some(&pi), Some(provider)) = (
                projection_idx.get(&allocated.provider_id),
                providers.get(&allocated.provider_id),
            ) {
                let point = &mut projections[pi].points[timeline_idx[&allocated.time]];
                let tier = point.tier_in_use.tier_number;
                let base_price = PricingResolver::item_base_price(provider, item.item_id, tier)
                    .unwrap_or_else(|| {
                        warnings.insert(Warning::MissingPrice {
                            provider_id: provider.provider_id,
                            item_id: item.item_id,
                            tier_number: tier,
                        });
                        Decimal::zero()
                    });
                let field = || format!("{} cost at {}", provider.provider_id, allocated.time);
                cost = allocated
                    .units
                    .checked_mul(base_price)
                    .and_then(|c| c.checked_mul(item.multiplier))
                    .ok_or_else(|| ValidationError::overflow(field()))?;
                point.billed_units = add(point.billed_units, allocated.units, field)?;
                point.cost = add(point.cost, cost, field)?;
            }

            let entry = item_totals[allocated.product_idx]
                .entry((item.item_id, allocated.provider_id))
                .or_insert_with(|| ItemBreakdown {
                    item_id: item.item_id,
                    name: item.name.clone(),
                    provider_id: allocated.provider_id,
                    multiplier: item.multiplier,
                    units: Decimal::zero(),
                    cost: Decimal::zero(),
                });
            let field = || format!("{}/{} totals", product.product_id, item.item_id);
            entry.units = add(entry.units, allocated.units, field)?;
            entry.cost = add(entry.cost, cost, field)?;
        }

        for projection in &mut projections {
            let provider_id = projection.provider_id;
            let field = || format!("{} totals", provider_id);
            projection.total_cost = total(projection.points.iter().map(|p| p.cost), field)?;
            projection.total_units =
                total(projection.points.iter().map(|p| p.billed_units), field)?;
        }

        let products = scenario
            .products
            .iter()
            .zip(item_totals)
            .map(|(product, items)| -> Result<ProductBreakdown, ValidationError> {
                let items: Vec<ItemBreakdown> = items.into_values().collect();
                let field = || format!("{} totals", product.product_id);
                Ok(ProductBreakdown {
                    product_id: product.product_id,
                    name: product.name.clone(),
                    total_cost: total(items.iter().map(|i| i.cost), field)?,
                    total_units: total(items.iter().map(|i| i.units), field)?,
                    items,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_cost = total(products.iter().map(|p| p.total_cost), || {
            "scenario totals".to_string()
        })?;
        let total_units = total(products.iter().map(|p| p.total_units), || {
            "scenario totals".to_string()
        })?;

        Ok(ProjectionResult {
            providers: projections,
            products,
            total_cost,
            total_units,
            warnings: warnings.into_iter().collect(),
        })
    }

    fn index_providers(
        providers: &[ProviderConfig],
    ) -> Result<BTreeMap<ProviderId, &ProviderConfig>, ValidationError> {
        let mut index = BTreeMap::new();
        for provider in providers {
            if provider.tiers.thresholds().is_empty() {
                return Err(ValidationError::EmptyTierTable {
                    context: provider.provider_id.to_string(),
                });
            }
            if let Some(volume) = provider.tier_volume_override {
                if volume.is_negative() {
                    return Err(ValidationError::NegativeValue {
                        field: format!("{} tier_volume_override", provider.provider_id),
                        value: volume,
                    });
                }
            }
            for (item_id, prices) in &provider.item_prices {
                if let Some((tier_number, price)) = prices.iter().find(|(_, p)| p.is_negative()) {
                    return Err(ValidationError::NegativeItemPrice {
                        provider_id: provider.provider_id,
                        item_id: *item_id,
                        tier_number: *tier_number,
                        price: *price,
                    });
                }
            }
            if index.insert(provider.provider_id, provider).is_some() {
                return Err(ValidationError::DuplicateProvider {
                    provider_id: provider.provider_id,
                });
            }
        }
        Ok(index)
    }

    /// Resolve raw, effective and billed tiers for every timeline month.
    /// Costs are filled in afterwards.
    fn provider_tiers(
        provider: &ProviderConfig,
        stream: BTreeMap<TimePoint, Decimal>,
        timeline: &[TimePoint],
        warnings: &mut BTreeSet<Warning>,
    ) -> Result<ProviderProjection, ValidationError> {
        let series: Vec<VolumePoint> = stream
            .into_iter()
            .map(|(time, units)| VolumePoint::new(time, units))
            .collect();
        let effective: BTreeMap<TimePoint, Decimal> =
            RollingWindowAggregator::aggregate_sorted(&series, &provider.strategy)?
                .into_iter()
                .map(|p| (p.time, p.value))
                .collect();
        let raw: BTreeMap<TimePoint, Decimal> =
            series.iter().map(|p| (p.time, p.units)).collect();

        let thresholds = provider.tiers.thresholds();
        let billed_tier = provider.tiers.billed_tier();
        if provider.tier_view == TierView::Billed && billed_tier.is_none() {
            warnings.insert(Warning::BilledTierMissing {
                provider_id: provider.provider_id,
            });
        }

        let mut points = Vec::with_capacity(timeline.len());
        for time in timeline {
            let raw_volume = raw.get(time).copied().unwrap_or_else(Decimal::zero);
            let effective_volume = provider
                .tier_volume_override
                .or_else(|| effective.get(time).copied())
                .unwrap_or_else(Decimal::zero);

            let raw_tier = TierResolver::resolve(raw_volume, thresholds)?;
            let effective_tier = TierResolver::resolve(effective_volume, thresholds)?;
            let (tier_in_use, tier_source) = match (provider.tier_view, billed_tier) {
                (TierView::Raw, _) => (raw_tier, TierView::Raw),
                (TierView::Effective, _) | (TierView::Billed, None) => {
                    (effective_tier, TierView::Effective)
                }
                (TierView::Billed, Some(tier)) => (ResolvedTier::manual(tier), TierView::Billed),
            };

            points.push(ProviderPoint {
                time: *time,
                raw_volume,
                effective_volume,
                billed_units: Decimal::zero(),
                raw_tier,
                effective_tier,
                billed_tier,
                tier_in_use,
                tier_source,
                cost: Decimal::zero(),
            });
        }

        Ok(ProviderProjection {
            provider_id: provider.provider_id,
            name: provider.name.clone(),
            tier_view: provider.tier_view,
            billed_tier,
            points,
            total_cost: Decimal::zero(),
            total_units: Decimal::zero(),
        })
    }
}

/// `a + b`, naming `field` on overflow.
fn add(a: Decimal, b: Decimal, field: impl FnOnce() -> String) -> Result<Decimal, ValidationError> {
    a.checked_add(b).ok_or_else(|| ValidationError::overflow(field()))
}

fn total(
    values: impl IntoIterator<Item = Decimal>,
    field: impl FnOnce() -> String,
) -> Result<Decimal, ValidationError> {
    Decimal::checked_sum(values).ok_or_else(|| ValidationError::overflow(field()))
}
