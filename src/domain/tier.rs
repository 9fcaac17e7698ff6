//! Tier tables: thresholds, base prices and the manually billed tier.

use super::{Decimal, ItemId, TierNumber, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a provider's tier table as stored or submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierEntry {
    pub tier_number: TierNumber,
    pub threshold_units: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_price: Option<Decimal>,
    #[serde(default)]
    pub is_selected: bool,
}

/// Validated `tier_number -> threshold_units` map.
///
/// Iteration is by ascending tier number, and thresholds are guaranteed to
/// ascend with tier number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<TierNumber, Decimal>", into = "BTreeMap<TierNumber, Decimal>")]
pub struct TierThresholds(BTreeMap<TierNumber, Decimal>);

impl TierThresholds {
    pub fn new(thresholds: BTreeMap<TierNumber, Decimal>) -> Result<Self, ValidationError> {
        let mut previous: Option<(TierNumber, Decimal)> = None;
        for (&tier_number, &threshold) in &thresholds {
            if tier_number.as_u32() == 0 {
                return Err(ValidationError::InvalidTierNumber { tier_number: 0 });
            }
            if !threshold.is_positive() {
                return Err(ValidationError::NonPositiveThreshold {
                    tier_number,
                    threshold,
                });
            }
            if let Some((lower, lower_threshold)) = previous {
                if lower_threshold >= threshold {
                    return Err(ValidationError::TierOrder {
                        lower,
                        higher: tier_number,
                    });
                }
            }
            previous = Some((tier_number, threshold));
        }
        Ok(Self(thresholds))
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (u32, Decimal)>,
    {
        let mut map = BTreeMap::new();
        for (tier, threshold) in pairs {
            let tier_number = TierNumber::new(tier);
            if map.insert(tier_number, threshold).is_some() {
                return Err(ValidationError::DuplicateTier { tier_number });
            }
        }
        Self::new(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, tier: TierNumber) -> Option<Decimal> {
        self.0.get(&tier).copied()
    }

    /// `(tier, threshold)` pairs by ascending tier number.
    pub fn iter(&self) -> impl Iterator<Item = (TierNumber, Decimal)> + '_ {
        self.0.iter().map(|(t, v)| (*t, *v))
    }

    pub fn highest(&self) -> Option<(TierNumber, Decimal)> {
        self.0.iter().next_back().map(|(t, v)| (*t, *v))
    }
}

impl TryFrom<BTreeMap<TierNumber, Decimal>> for TierThresholds {
    type Error = ValidationError;

    fn try_from(map: BTreeMap<TierNumber, Decimal>) -> Result<Self, Self::Error> {
        TierThresholds::new(map)
    }
}

impl From<TierThresholds> for BTreeMap<TierNumber, Decimal> {
    fn from(t: TierThresholds) -> Self {
        t.0
    }
}

/// Tier that a volume resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTier {
    pub tier_number: TierNumber,
    /// Volume is at or beyond the highest configured threshold.
    pub above_max: bool,
}

impl ResolvedTier {
    pub fn new(tier_number: TierNumber, above_max: bool) -> Self {
        Self {
            tier_number,
            above_max,
        }
    }

    /// A manually chosen tier; never flagged above max.
    pub fn manual(tier_number: TierNumber) -> Self {
        Self::new(tier_number, false)
    }
}

/// Which tier definition drives pricing for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierView {
    /// Tier implied by the current month's unrolled volume.
    Raw,
    /// Tier implied by the rolling-window aggregate.
    Effective,
    /// The manually selected invoicing tier.
    Billed,
}

impl TierView {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierView::Raw => "raw",
            TierView::Effective => "effective",
            TierView::Billed => "billed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Some(TierView::Raw),
            "effective" => Some(TierView::Effective),
            "billed" | "manual" => Some(TierView::Billed),
            _ => None,
        }
    }
}

/// A provider's full tier configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TierEntry>", into = "Vec<TierEntry>")]
pub struct TierSchedule {
    thresholds: TierThresholds,
    base_prices: BTreeMap<TierNumber, Decimal>,
    billed_tier: Option<TierNumber>,
}

impl TierSchedule {
    pub fn from_entries(entries: Vec<TierEntry>) -> Result<Self, ValidationError> {
        let mut thresholds = BTreeMap::new();
        let mut base_prices = BTreeMap::new();
        let mut selected = Vec::new();

        for entry in entries {
            if thresholds
                .insert(entry.tier_number, entry.threshold_units)
                .is_some()
            {
                return Err(ValidationError::DuplicateTier {
                    tier_number: entry.tier_number,
                });
            }
            if let Some(price) = entry.base_price {
                if price.is_negative() {
                    return Err(ValidationError::NegativeBasePrice {
                        tier_number: entry.tier_number,
                        price,
                    });
                }
                base_prices.insert(entry.tier_number, price);
            }
            if entry.is_selected {
                selected.push(entry.tier_number);
            }
        }

        if selected.len() > 1 {
            selected.sort();
            return Err(ValidationError::MultipleBilledTiers { tiers: selected });
        }

        Ok(Self {
            thresholds: TierThresholds::new(thresholds)?,
            base_prices,
            billed_tier: selected.pop(),
        })
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    pub fn base_prices(&self) -> &BTreeMap<TierNumber, Decimal> {
        &self.base_prices
    }

    pub fn billed_tier(&self) -> Option<TierNumber> {
        self.billed_tier
    }

    pub fn entries(&self) -> Vec<TierEntry> {
        self.thresholds
            .iter()
            .map(|(tier_number, threshold_units)| TierEntry {
                tier_number,
                threshold_units,
                base_price: self.base_prices.get(&tier_number).copied(),
                is_selected: self.billed_tier == Some(tier_number),
            })
            .collect()
    }
}

impl TryFrom<Vec<TierEntry>> for TierSchedule {
    type Error = ValidationError;

    fn try_from(entries: Vec<TierEntry>) -> Result<Self, Self::Error> {
        TierSchedule::from_entries(entries)
    }
}

impl From<TierSchedule> for Vec<TierEntry> {
    fn from(schedule: TierSchedule) -> Self {
        schedule.entries()
    }
}

/// Per-item price table that overrides a provider's base prices.
pub type ItemPriceTable = BTreeMap<ItemId, BTreeMap<TierNumber, Decimal>>;
