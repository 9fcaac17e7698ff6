use crate::domain::{Decimal, Scenario, ValidationError};
use serde::{Deserialize, Serialize};

use super::{CostProjector, ProjectionOptions, ProjectionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaClassification {
    Savings,
    Increase,
    Unchanged,
}

/// `optimized - current`. A negative amount is a saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub amount: Decimal,
    /// Percent of the current total, two decimal places. `None` when the
    /// current total is zero or the ratio leaves the decimal range.
    pub percent: Option<Decimal>,
    pub classification: DeltaClassification,
}

impl Delta {
    /// # Errors
    /// Fails when the difference overflows.
    pub fn between(current: Decimal, optimized: Decimal) -> Result<Self, ValidationError> {
        let amount = optimized
            .checked_sub(current)
            .ok_or_else(|| ValidationError::overflow("comparison delta"))?;
        let percent = if current.is_positive() {
            amount
                .checked_div(current)
                .and_then(|ratio| ratio.checked_mul(Decimal::hundred()))
                .map(|pct| pct.round_dp(2))
        } else {
            None
        };
        let classification = if amount.is_negative() {
            DeltaClassification::Savings
        } else if amount.is_positive() {
            DeltaClassification::Increase
        } else {
            DeltaClassification::Unchanged
        };

        Ok(Self {
            amount,
            percent,
            classification,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub current: ProjectionResult,
    pub optimized: ProjectionResult,
    pub delta: Delta,
}

impl Comparison {
    /// # Errors
    /// Fails when the totals are too far apart to subtract.
    pub fn new(
        current: ProjectionResult,
        optimized: ProjectionResult,
    ) -> Result<Self, ValidationError> {
        let delta = Delta::between(current.total_cost, optimized.total_cost)?;
        Ok(Self {
            current,
            optimized,
            delta,
        })
    }
}

/// Projects two scenarios under the same options and reports the difference.
pub struct CostComparator;

impl CostComparator {
    /// # Errors
    /// Fails if either scenario fails to project.
    pub fn compare(
        current: &Scenario,
        optimized: &Scenario,
        options: &ProjectionOptions,
    ) -> Result<Comparison, ValidationError> {
        let current = CostProjector::project(current, options)?;
        let optimized = CostProjector::project(optimized, options)?;
        Comparison::new(current, optimized)
    }
}
