use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::api::json::ApiJson;
use crate::api::AppState;
use crate::domain::Scenario;
use crate::engine::{Comparison, ProjectionResult};
use crate::error::AppError;
use crate::orchestration::{AllocationOverride, StoredScenarioRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRequest {
    pub scenario: Scenario,
    /// Overrides the server's `STRICT_ALLOCATION` setting for this call.
    #[serde(default)]
    pub strict_allocation: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub current: Scenario,
    pub optimized: Scenario,
    #[serde(default)]
    pub strict_allocation: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProjectionRequest {
    #[serde(flatten)]
    pub scenario: StoredScenarioRequest,
    #[serde(default)]
    pub strict_allocation: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredComparisonRequest {
    #[serde(flatten)]
    pub scenario: StoredScenarioRequest,
    /// Allocations that differ on the optimized side.
    pub overrides: Vec<AllocationOverride>,
    #[serde(default)]
    pub strict_allocation: Option<bool>,
}

pub async fn project(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ProjectionRequest>,
) -> Result<Json<ProjectionResult>, AppError> {
    let options = state.projection_options(req.strict_allocation);
    let result = state.cache.project(&req.scenario, &options)?;
    Ok(Json(result.as_ref().clone()))
}

pub async fn compare(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ComparisonRequest>,
) -> Result<Json<Comparison>, AppError> {
    let options = state.projection_options(req.strict_allocation);
    let comparison = state.cache.compare(&req.current, &req.optimized, &options)?;
    Ok(Json(comparison))
}

pub async fn project_stored(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<StoredProjectionRequest>,
) -> Result<Json<ProjectionResult>, AppError> {
    let scenario = state.assembler.assemble(&req.scenario, &[]).await?;
    let options = state.projection_options(req.strict_allocation);
    let result = state.cache.project(&scenario, &options)?;

    info!(
        products = req.scenario.product_ids.len(),
        total_cost = %result.total_cost,
        warnings = result.warnings.len(),
        "stored projection"
    );
    Ok(Json(result.as_ref().clone()))
}

pub async fn compare_stored(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<StoredComparisonRequest>,
) -> Result<Json<Comparison>, AppError> {
    let (current, optimized) = futures::try_join!(
        state.assembler.assemble(&req.scenario, &[]),
        state.assembler.assemble(&req.scenario, &req.overrides),
    )?;
    let options = state.projection_options(req.strict_allocation);
    let comparison = state.cache.compare(&current, &optimized, &options)?;

    info!(
        products = req.scenario.product_ids.len(),
        overrides = req.overrides.len(),
        delta = %comparison.delta.amount,
        "stored comparison"
    );
    Ok(Json(comparison))
}
