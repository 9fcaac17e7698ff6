//! Stateless engine primitives exposed one operation at a time.

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::json::ApiJson;
use crate::domain::{
    AllocationRuleSet, Decimal, EffectivePoint, LookupStrategy, ProviderId, ResolvedTier,
    TierEntry, TierSchedule, VolumePoint,
};
use crate::engine::{AllocationSplitter, RollingWindowAggregator, TierHeadroom, TierResolver};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveTierRequest {
    pub volume: Decimal,
    pub tiers: Vec<TierEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveTierResponse {
    #[serde(flatten)]
    pub tier: ResolvedTier,
    pub headroom: Option<TierHeadroom>,
}

pub async fn resolve_tier(
    ApiJson(req): ApiJson<ResolveTierRequest>,
) -> Result<Json<ResolveTierResponse>, AppError> {
    let schedule = TierSchedule::from_entries(req.tiers)?;
    let tier = TierResolver::resolve(req.volume, schedule.thresholds())?;
    let headroom = TierResolver::headroom(req.volume, schedule.thresholds())?;
    Ok(Json(ResolveTierResponse { tier, headroom }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    pub series: Vec<VolumePoint>,
    #[serde(default)]
    pub strategy: LookupStrategy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub strategy: LookupStrategy,
    pub points: Vec<EffectivePoint>,
}

pub async fn aggregate_volumes(
    ApiJson(req): ApiJson<AggregateRequest>,
) -> Result<Json<AggregateResponse>, AppError> {
    let points = RollingWindowAggregator::aggregate(&req.series, &req.strategy)?;
    Ok(Json(AggregateResponse {
        strategy: req.strategy,
        points,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub series: Vec<VolumePoint>,
    pub allocation: AllocationRuleSet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSeries {
    pub provider_id: ProviderId,
    pub points: Vec<VolumePoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    pub valid: bool,
    pub total: Decimal,
    /// The rule set with any lock applied to its stored values.
    pub normalized: AllocationRuleSet,
    pub providers: Vec<ProviderSeries>,
}

pub async fn split_allocation(
    ApiJson(req): ApiJson<SplitRequest>,
) -> Result<Json<SplitResponse>, AppError> {
    let split = AllocationSplitter::split(&req.series, &req.allocation)?;
    let normalized = req.allocation.normalized();

    Ok(Json(SplitResponse {
        valid: AllocationSplitter::is_valid(&req.allocation),
        total: normalized.total(),
        normalized,
        providers: split
            .into_iter()
            .map(|(provider_id, points)| ProviderSeries {
                provider_id,
                points,
            })
            .collect(),
    }))
}
