//! Pure computation engine for tiered volume allocation and pricing.
//!
//! Every function here is synchronous, performs no I/O and keeps no state
//! between calls. Inputs arrive by value or reference; outputs are fresh.

use crate::domain::{Decimal, ItemId, ProductId, ProviderId, TierNumber, ValidationError, VolumePoint};
use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod allocation;
pub mod comparator;
pub mod pricing;
pub mod projector;
pub mod tier_resolver;

pub use aggregator::RollingWindowAggregator;
pub use allocation::AllocationSplitter;
pub use comparator::{Comparison, CostComparator, Delta, DeltaClassification};
pub use pricing::PricingResolver;
pub use projector::{
    CostProjector, ItemBreakdown, ProductBreakdown, ProjectionOptions, ProjectionResult,
    ProviderPoint, ProviderProjection,
};
pub use tier_resolver::{TierHeadroom, TierResolver};

/// A non-fatal configuration gap. The affected figure falls back to a safe
/// default (zero price, effective tier) and computation continues.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Warning {
    /// Percentage allocation that does not sum to 100 (lenient mode only).
    #[serde(rename_all = "camelCase")]
    AllocationSumMismatch {
        product_id: ProductId,
        item_id: ItemId,
        total: Decimal,
    },
    /// Allocation names a provider the scenario does not configure.
    #[serde(rename_all = "camelCase")]
    UnknownProvider {
        product_id: ProductId,
        item_id: ItemId,
        provider_id: ProviderId,
    },
    /// No item price and no base price for the tier in use.
    #[serde(rename_all = "camelCase")]
    MissingPrice {
        provider_id: ProviderId,
        item_id: ItemId,
        tier_number: TierNumber,
    },
    /// Billed view requested but no tier is selected; effective tier used.
    #[serde(rename_all = "camelCase")]
    BilledTierMissing { provider_id: ProviderId },
}

/// Sort a series by month and reject negative units or repeated months.
///
/// `field` names the series in error messages.
pub fn sorted_series(series: &[VolumePoint], field: &str) -> Result<Vec<VolumePoint>, ValidationError> {
    let mut sorted = series.to_vec();
    sorted.sort_by_key(|p| p.time);

    for (i, point) in sorted.iter().enumerate() {
        if point.units.is_negative() {
            return Err(ValidationError::NegativeVolume {
                field: field.to_string(),
                at: point.time,
                units: point.units,
            });
        }
        if i > 0 && sorted[i - 1].time == point.time {
            return Err(ValidationError::DuplicateTimePoint {
                field: field.to_string(),
                at: point.time,
            });
        }
    }

    Ok(sorted)
}
