use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::api::AppState;
use crate::datasource::parse_volume_csv;
use crate::domain::{ProductId, VolumeSource};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeImportResponse {
    pub product_id: ProductId,
    pub kind: VolumeSource,
    pub months: usize,
}

/// Import a `year,month,units` CSV into one of a product's volume series.
pub async fn put_product_volumes(
    State(state): State<AppState>,
    Path((product_id, kind)): Path<(i64, String)>,
    body: String,
) -> Result<Json<VolumeImportResponse>, AppError> {
    let product_id = ProductId::new(product_id);
    let kind = VolumeSource::parse(&kind).ok_or_else(|| {
        AppError::BadRequest(format!(
            "unknown volume kind '{}', expected actuals or forecasts",
            kind
        ))
    })?;

    if !state.repo.product_exists(product_id).await? {
        return Err(AppError::NotFound(format!("{} not found", product_id)));
    }

    let points = parse_volume_csv(body.as_bytes())?;
    let months = state.repo.upsert_volumes(product_id, kind, &points).await?;

    info!(
        product_id = product_id.as_i64(),
        kind = kind.as_str(),
        months,
        "volumes imported"
    );

    Ok(Json(VolumeImportResponse {
        product_id,
        kind,
        months,
    }))
}
