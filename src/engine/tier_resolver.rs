use crate::domain::{Decimal, ResolvedTier, TierNumber, TierThresholds, ValidationError};
use serde::{Deserialize, Serialize};

/// Distance from a volume to the next bracket boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierHeadroom {
    pub current_tier: TierNumber,
    /// Threshold of the current tier; reaching it moves the volume up.
    pub boundary_units: Decimal,
    pub gap: Decimal,
    /// Tier reached at the boundary; `None` when the boundary leads above max.
    pub next_tier: Option<TierNumber>,
}

/// Maps a volume onto a tier table.
///
/// A volume belongs to the first tier (by ascending tier number) whose
/// threshold is strictly greater than it. A volume equal to a threshold
/// therefore lands in the following tier.
pub struct TierResolver;

impl TierResolver {
    /// # Errors
    /// Fails on a negative volume or an empty tier table.
    pub fn resolve(
        volume: Decimal,
        thresholds: &TierThresholds,
    ) -> Result<ResolvedTier, ValidationError> {
        if volume.is_negative() {
            return Err(ValidationError::NegativeValue {
                field: "volume".to_string(),
                value: volume,
            });
        }

        if let Some((tier, _)) = thresholds.iter().find(|(_, threshold)| *threshold > volume) {
            return Ok(ResolvedTier::new(tier, false));
        }

        let (highest, _) = thresholds
            .highest()
            .ok_or_else(|| ValidationError::EmptyTierTable {
                context: "thresholds".to_string(),
            })?;
        Ok(ResolvedTier::new(highest, true))
    }

    /// Units left before `volume` crosses into the next bracket; `None` once
    /// the volume is above the highest threshold.
    pub fn headroom(
        volume: Decimal,
        thresholds: &TierThresholds,
    ) -> Result<Option<TierHeadroom>, ValidationError> {
        let resolved = Self::resolve(volume, thresholds)?;
        if resolved.above_max {
            return Ok(None);
        }

        let Some(boundary_units) = thresholds.get(resolved.tier_number) else {
            return Ok(None);
        };
        let next_tier = thresholds
            .iter()
            .map(|(tier, _)| tier)
            .find(|tier| *tier > resolved.tier_number);

        Ok(Some(TierHeadroom {
            current_tier: resolved.tier_number,
            boundary_units,
            gap: boundary_units - volume,
            next_tier,
        }))
    }
}
