//! Allocation rules distributing one item's demand across providers.

use super::{Decimal, ProviderId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMode {
    /// `value` is a share of the raw volume, 0..=100.
    #[default]
    Percentage,
    /// `value` is a fixed monthly amount that does not follow the raw volume.
    Units,
}

impl AllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMode::Percentage => "percentage",
            AllocationMode::Units => "units",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" | "percent" => Some(AllocationMode::Percentage),
            "units" | "fixed" => Some(AllocationMode::Units),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRule {
    pub provider_id: ProviderId,
    pub value: Decimal,
}

impl AllocationRule {
    pub fn new(provider_id: ProviderId, value: Decimal) -> Self {
        Self { provider_id, value }
    }
}

/// All provider rules for one item, sharing a mode and an optional lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRuleSet {
    #[serde(default)]
    pub mode: AllocationMode,
    #[serde(default)]
    pub rules: Vec<AllocationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_provider_id: Option<ProviderId>,
}

impl AllocationRuleSet {
    pub fn new(mode: AllocationMode, rules: Vec<AllocationRule>) -> Self {
        Self {
            mode,
            rules,
            locked_provider_id: None,
        }
    }

    pub fn percentage(rules: &[(i64, i64)]) -> Self {
        Self::new(
            AllocationMode::Percentage,
            rules
                .iter()
                .map(|&(p, v)| AllocationRule::new(ProviderId::new(p), Decimal::from(v)))
                .collect(),
        )
    }

    pub fn units(rules: &[(i64, i64)]) -> Self {
        Self::new(
            AllocationMode::Units,
            rules
                .iter()
                .map(|&(p, v)| AllocationRule::new(ProviderId::new(p), Decimal::from(v)))
                .collect(),
        )
    }

    pub fn locked_to(mut self, provider_id: ProviderId) -> Self {
        self.locked_provider_id = Some(provider_id);
        self
    }

    pub fn provider_ids(&self) -> BTreeSet<ProviderId> {
        let mut ids: BTreeSet<ProviderId> = self.rules.iter().map(|r| r.provider_id).collect();
        if let Some(locked) = self.locked_provider_id {
            ids.insert(locked);
        }
        ids
    }

    /// Sum of the rule values, saturating at the decimal maximum.
    pub fn total(&self) -> Decimal {
        self.rules
            .iter()
            .fold(Decimal::zero(), |acc, r| acc.saturating_add(r.value))
    }

    /// Rewrite stored values so the lock is explicit: the locked provider
    /// holds 100 and every other provider 0. Applying it twice is a no-op.
    pub fn normalized(&self) -> Self {
        let Some(locked) = self.locked_provider_id else {
            return self.clone();
        };

        let mut rules: Vec<AllocationRule> = self
            .rules
            .iter()
            .map(|r| {
                let value = if r.provider_id == locked {
                    Decimal::hundred()
                } else {
                    Decimal::zero()
                };
                AllocationRule::new(r.provider_id, value)
            })
            .collect();
        if !rules.iter().any(|r| r.provider_id == locked) {
            rules.push(AllocationRule::new(locked, Decimal::hundred()));
        }

        Self {
            mode: AllocationMode::Percentage,
            rules,
            locked_provider_id: Some(locked),
        }
    }

    /// Reject negative values, providers listed twice and totals beyond the
    /// decimal range.
    pub fn check_structure(&self) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        for rule in &self.rules {
            if rule.value.is_negative() {
                return Err(ValidationError::NegativeAllocation {
                    provider_id: rule.provider_id,
                    value: rule.value,
                });
            }
            if !seen.insert(rule.provider_id) {
                return Err(ValidationError::DuplicateAllocationRule {
                    provider_id: rule.provider_id,
                });
            }
        }
        Decimal::checked_sum(self.rules.iter().map(|r| r.value))
            .map(|_| ())
            .ok_or_else(|| ValidationError::overflow("allocation total"))
    }

    /// Whether the rule set is complete: structurally sound and, for an
    /// unlocked percentage allocation, summing to exactly 100.
    pub fn is_valid(&self) -> bool {
        self.check_structure().is_ok() && self.sum_mismatch().is_none()
    }

    /// The percentage total when it is not 100; `None` when the sum does not
    /// apply (fixed units, locked) or is correct.
    pub fn sum_mismatch(&self) -> Option<Decimal> {
        if self.locked_provider_id.is_some() || self.mode == AllocationMode::Units {
            return None;
        }
        let total = self.total();
        (total != Decimal::hundred()).then_some(total)
    }

    /// Structural validation plus, when `strict`, the percentage-sum rule.
    ///
    /// Returns the mismatching total in non-strict mode so the caller can
    /// surface it as a warning. Values are never rescaled.
    pub fn validate(&self, context: &str, strict: bool) -> Result<Option<Decimal>, ValidationError> {
        self.check_structure()?;
        match self.sum_mismatch() {
            Some(total) if strict => Err(ValidationError::AllocationSum {
                context: context.to_string(),
                total,
            }),
            mismatch => Ok(mismatch),
        }
    }
}
