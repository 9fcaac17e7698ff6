use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::api::json::ApiJson;
use crate::api::AppState;
use crate::domain::{ProviderId, TierEntry, TierNumber, TierSchedule};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTiersResponse {
    pub provider_id: ProviderId,
    pub tiers: Vec<TierEntry>,
    pub billed_tier: Option<TierNumber>,
}

/// Replace a provider's tier table. The body is the full list of entries.
pub async fn put_provider_tiers(
    State(state): State<AppState>,
    Path(provider_id): Path<i64>,
    ApiJson(entries): ApiJson<Vec<TierEntry>>,
) -> Result<Json<ProviderTiersResponse>, AppError> {
    let provider_id = ProviderId::new(provider_id);
    let schedule = TierSchedule::from_entries(entries)?;
    state
        .repo
        .replace_provider_tiers(provider_id, &schedule)
        .await?;

    info!(
        provider_id = provider_id.as_i64(),
        tiers = schedule.thresholds().len(),
        "provider tiers replaced"
    );

    Ok(Json(ProviderTiersResponse {
        provider_id,
        billed_tier: schedule.billed_tier(),
        tiers: schedule.entries(),
    }))
}
