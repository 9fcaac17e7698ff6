use crate::domain::{
    AllocationMode, AllocationRuleSet, Decimal, ProviderId, ValidationError, VolumePoint,
};
use std::collections::BTreeMap;

use super::sorted_series;

/// Splits a raw monthly series across providers.
///
/// Percentage rules take `value / 100` of each month's raw volume. Units
/// rules hand out `value` every month regardless of the raw volume. A lock
/// sends the full raw volume to the locked provider and zero to everyone
/// else, whatever the stored values say.
pub struct AllocationSplitter;

impl AllocationSplitter {
    /// Per-provider allocated series, each aligned with the sorted input.
    ///
    /// Sum validation is left to [`AllocationSplitter::is_valid`] and
    /// [`AllocationRuleSet::validate`]; values are never rescaled here.
    ///
    /// # Errors
    /// Rejects negative raw units, repeated months, negative rule values,
    /// providers listed twice and shares beyond the decimal range.
    pub fn split(
        raw: &[VolumePoint],
        rules: &AllocationRuleSet,
    ) -> Result<BTreeMap<ProviderId, Vec<VolumePoint>>, ValidationError> {
        rules.check_structure()?;
        let sorted = sorted_series(raw, "raw volume")?;
        Self::split_sorted(&sorted, rules)
    }

    /// Split an already sorted, validated series.
    pub fn split_sorted(
        sorted: &[VolumePoint],
        rules: &AllocationRuleSet,
    ) -> Result<BTreeMap<ProviderId, Vec<VolumePoint>>, ValidationError> {
        let mut out: BTreeMap<ProviderId, Vec<VolumePoint>> = rules
            .provider_ids()
            .into_iter()
            .map(|id| (id, Vec::with_capacity(sorted.len())))
            .collect();

        for point in sorted {
            let shares = Self::allocate(point.units, rules).map_err(|err| match err {
                ValidationError::Overflow { field } => {
                    ValidationError::overflow(format!("{} at {}", field, point.time))
                }
                other => other,
            })?;
            for (provider_id, units) in shares {
                if let Some(series) = out.get_mut(&provider_id) {
                    series.push(VolumePoint::new(point.time, units));
                }
            }
        }

        Ok(out)
    }

    /// Allocate one month's raw volume.
    ///
    /// # Errors
    /// Fails when a percentage share overflows.
    pub fn allocate(
        raw_units: Decimal,
        rules: &AllocationRuleSet,
    ) -> Result<BTreeMap<ProviderId, Decimal>, ValidationError> {
        if let Some(locked) = rules.locked_provider_id {
            return Ok(rules
                .provider_ids()
                .into_iter()
                .map(|id| {
                    let units = if id == locked { raw_units } else { Decimal::zero() };
                    (id, units)
                })
                .collect());
        }

        rules
            .rules
            .iter()
            .map(|rule| -> Result<(ProviderId, Decimal), ValidationError> {
                let units = match rules.mode {
                    AllocationMode::Percentage => (rule.value / Decimal::hundred())
                        .checked_mul(raw_units)
                        .ok_or_else(|| {
                            ValidationError::overflow(format!("{} share", rule.provider_id))
                        })?,
                    AllocationMode::Units => rule.value,
                };
                Ok((rule.provider_id, units))
            })
            .collect()
    }

    pub fn is_valid(rules: &AllocationRuleSet) -> bool {
        rules.is_valid()
    }
}
