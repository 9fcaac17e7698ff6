use crate::domain::{
    Decimal, ItemId, ProviderConfig, ResolvedTier, TierNumber, ValidationError,
};
use std::collections::BTreeMap;

/// Turns a resolved tier into a unit price.
///
/// There is no overage rate: a volume above the highest threshold pays the
/// highest tier's price.
pub struct PricingResolver;

impl PricingResolver {
    /// `base_prices[tier] * multiplier`, or zero when the tier has no price.
    ///
    /// # Errors
    /// Fails when the product overflows.
    pub fn price(
        tier: ResolvedTier,
        base_prices: &BTreeMap<TierNumber, Decimal>,
        multiplier: Decimal,
    ) -> Result<Decimal, ValidationError> {
        Self::lookup(tier.tier_number, base_prices)
            .unwrap_or_else(Decimal::zero)
            .checked_mul(multiplier)
            .ok_or_else(|| ValidationError::overflow(format!("{} price", tier.tier_number)))
    }

    pub fn lookup(tier: TierNumber, prices: &BTreeMap<TierNumber, Decimal>) -> Option<Decimal> {
        prices.get(&tier).copied()
    }

    /// Base unit price an item pays a provider at `tier`. An item-specific
    /// price wins over the provider's base price.
    pub fn item_base_price(
        provider: &ProviderConfig,
        item_id: ItemId,
        tier: TierNumber,
    ) -> Option<Decimal> {
        provider
            .item_prices
            .get(&item_id)
            .and_then(|prices| Self::lookup(tier, prices))
            .or_else(|| Self::lookup(tier, provider.tiers.base_prices()))
    }

    /// # Errors
    /// Fails when the multiplier is zero or negative.
    pub fn check_multiplier(item_id: ItemId, multiplier: Decimal) -> Result<(), ValidationError> {
        if multiplier.is_positive() {
            Ok(())
        } else {
            Err(ValidationError::NonPositiveMultiplier {
                item_id,
                multiplier,
            })
        }
    }
}
