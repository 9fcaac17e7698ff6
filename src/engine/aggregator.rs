use crate::domain::{
    AggregationMethod, Decimal, EffectivePoint, LookupStrategy, ValidationError, VolumePoint,
};

use super::sorted_series;

/// Converts a monthly series into a trailing rolling-window series.
///
/// The window is variable-completeness: the first points of a series see a
/// shorter window. Only points present in the input count; a calendar month
/// missing from the series is neither zero-filled nor interpolated, so it
/// silently shortens the window instead of contributing a zero.
pub struct RollingWindowAggregator;

impl RollingWindowAggregator {
    /// Aggregate `series` under `strategy`, one output point per input point.
    ///
    /// Input is sorted by month before aggregation.
    ///
    /// # Errors
    /// Rejects negative units, repeated months and window sums beyond the
    /// decimal range.
    pub fn aggregate(
        series: &[VolumePoint],
        strategy: &LookupStrategy,
    ) -> Result<Vec<EffectivePoint>, ValidationError> {
        let sorted = sorted_series(series, "series")?;
        Self::aggregate_sorted(&sorted, strategy)
    }

    /// Aggregate an already sorted, validated series.
    ///
    /// # Errors
    /// Fails when a window sum overflows.
    pub fn aggregate_sorted(
        sorted: &[VolumePoint],
        strategy: &LookupStrategy,
    ) -> Result<Vec<EffectivePoint>, ValidationError> {
        let window_len = strategy.window_len();
        let mut out = Vec::with_capacity(sorted.len());
        let mut running = Decimal::zero();

        for (i, point) in sorted.iter().enumerate() {
            // Drop the leaving point first so `running` never exceeds one window.
            if i >= window_len {
                running = running - sorted[i - window_len].units;
            }
            running = running.checked_add(point.units).ok_or_else(|| {
                ValidationError::overflow(format!("rolling window at {}", point.time))
            })?;

            let count = Self::contributing_points(i, strategy);
            let value = match strategy.method {
                AggregationMethod::Sum => running,
                AggregationMethod::Avg => running
                    .checked_div(Decimal::from(count as i64))
                    .unwrap_or_else(Decimal::zero),
            };

            out.push(EffectivePoint {
                time: point.time,
                value,
            });
        }

        Ok(out)
    }

    /// Number of raw points feeding the output at `index`: `min(index + 1, lookback + 1)`.
    pub fn contributing_points(index: usize, strategy: &LookupStrategy) -> usize {
        (index + 1).min(strategy.window_len())
    }

    /// Effective value at the last point of the series, if any.
    pub fn latest(
        series: &[VolumePoint],
        strategy: &LookupStrategy,
    ) -> Result<Option<EffectivePoint>, ValidationError> {
        Ok(Self::aggregate(series, strategy)?.last().copied())
    }
}
