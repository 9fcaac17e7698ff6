//! Domain types for tiered contract pricing.
//!
//! This module provides:
//! - Lossless numeric handling via a Decimal wrapper
//! - Identifiers, tier numbers and calendar months
//! - Volume series (actuals, forecasts, hybrid blends)
//! - Lookup strategies, tier schedules and allocation rule sets
//! - Scenario inputs consumed by the projection engine

pub mod allocation;
pub mod decimal;
pub mod primitives;
pub mod scenario;
pub mod series;
pub mod strategy;
pub mod tier;
pub mod validation;

pub use allocation::{AllocationMode, AllocationRule, AllocationRuleSet};
pub use decimal::Decimal;
pub use primitives::{InvalidMonth, ItemId, ProductId, ProviderId, TierNumber, TimePoint};
pub use scenario::{ProductConfig, ProductItem, ProviderConfig, Scenario};
pub use series::{EffectivePoint, VolumeBasis, VolumeHistory, VolumePoint, VolumeSource};
pub use strategy::{AggregationMethod, LookupStrategy};
pub use tier::{ItemPriceTable, ResolvedTier, TierEntry, TierSchedule, TierThresholds, TierView};
pub use validation::ValidationError;
