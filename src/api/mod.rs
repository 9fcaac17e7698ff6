pub mod contracts;
pub mod engine;
pub mod health;
pub mod json;
pub mod projections;
pub mod volumes;

use crate::config::Config;
use crate::datasource::ScenarioSource;
use crate::db::Repository;
use crate::engine::ProjectionOptions;
use crate::orchestration::{ProjectionCache, ScenarioAssembler};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub assembler: ScenarioAssembler,
    pub cache: Arc<ProjectionCache>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let source: Arc<dyn ScenarioSource> = repo.clone();
        let assembler = ScenarioAssembler::new(source, config.default_tier_view);
        let cache = Arc::new(ProjectionCache::new(config.projection_cache_size));
        Self {
            repo,
            config,
            assembler,
            cache,
        }
    }

    /// Per-request strictness, falling back to the configured default.
    pub fn projection_options(&self, strict_allocation: Option<bool>) -> ProjectionOptions {
        ProjectionOptions {
            strict_allocation: strict_allocation.unwrap_or(self.config.strict_allocation),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/tiers/resolve", post(engine::resolve_tier))
        .route("/v1/volumes/aggregate", post(engine::aggregate_volumes))
        .route("/v1/allocations/split", post(engine::split_allocation))
        .route("/v1/projections", post(projections::project))
        .route("/v1/comparisons", post(projections::compare))
        .route("/v1/stored/projections", post(projections::project_stored))
        .route("/v1/stored/comparisons", post(projections::compare_stored))
        .route(
            "/v1/providers/:id/tiers",
            put(contracts::put_provider_tiers),
        )
        .route(
            "/v1/products/:id/volumes/:kind",
            put(volumes::put_product_volumes),
        )
        .layer(cors)
        .with_state(state)
}
