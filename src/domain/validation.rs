//! Validation failures for malformed engine input.

use super::{Decimal, InvalidMonth, ItemId, ProductId, ProviderId, TierNumber, TimePoint};
use thiserror::Error;

/// Structural or numeric input the engine refuses to compute with.
///
/// Every variant names the offending field so a caller can point the operator
/// at the exact value to fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Month(#[from] InvalidMonth),

    #[error("{field}: negative value {value}")]
    NegativeValue { field: String, value: Decimal },

    #[error("{field}: negative units {units} at {at}")]
    NegativeVolume {
        field: String,
        at: TimePoint,
        units: Decimal,
    },

    #[error("{field}: duplicate month {at}")]
    DuplicateTimePoint { field: String, at: TimePoint },

    #[error("{context}: tier table is empty")]
    EmptyTierTable { context: String },

    #[error("tier_number must be >= 1, got {tier_number}")]
    InvalidTierNumber { tier_number: u32 },

    #[error("{tier_number}: threshold_units must be > 0, got {threshold}")]
    NonPositiveThreshold {
        tier_number: TierNumber,
        threshold: Decimal,
    },

    #[error("{tier_number}: defined more than once")]
    DuplicateTier { tier_number: TierNumber },

    #[error("thresholds must ascend with tier number: {lower} >= {higher} by threshold")]
    TierOrder { lower: TierNumber, higher: TierNumber },

    #[error("at most one billed tier may be selected, got {}", format_tiers(.tiers))]
    MultipleBilledTiers { tiers: Vec<TierNumber> },

    #[error("{tier_number}: base_price must be >= 0, got {price}")]
    NegativeBasePrice { tier_number: TierNumber, price: Decimal },

    #[error("{provider_id}/{item_id} {tier_number}: item price must be >= 0, got {price}")]
    NegativeItemPrice {
        provider_id: ProviderId,
        item_id: ItemId,
        tier_number: TierNumber,
        price: Decimal,
    },

    #[error("{provider_id}: allocation value must be >= 0, got {value}")]
    NegativeAllocation { provider_id: ProviderId, value: Decimal },

    #[error("{provider_id}: listed more than once in one allocation")]
    DuplicateAllocationRule { provider_id: ProviderId },

    #[error("{context}: percentage allocation sums to {total}, expected 100")]
    AllocationSum { context: String, total: Decimal },

    #[error("{item_id}: multiplier must be > 0, got {multiplier}")]
    NonPositiveMultiplier { item_id: ItemId, multiplier: Decimal },

    #[error("{provider_id}: defined more than once")]
    DuplicateProvider { provider_id: ProviderId },

    #[error("{product_id}: defined more than once")]
    DuplicateProduct { product_id: ProductId },

    #[error("{product_id}/{item_id}: defined more than once")]
    DuplicateItem { product_id: ProductId, item_id: ItemId },

    #[error("{field}: result exceeds the decimal range")]
    Overflow { field: String },
}

impl ValidationError {
    pub fn overflow(field: impl Into<String>) -> Self {
        Self::Overflow {
            field: field.into(),
        }
    }
}

fn format_tiers(tiers: &[TierNumber]) -> String {
    tiers
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
