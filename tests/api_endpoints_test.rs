use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tiercost::api;
use tiercost::config::Config;
use tiercost::db::init_db;
use tiercost::domain::{
    AllocationRuleSet, Decimal, ItemId, ProductConfig, ProductId, ProductItem, ProviderConfig,
    ProviderId, Scenario, TierEntry, TierNumber, TierSchedule, TierView, TimePoint, VolumeBasis,
    VolumeHistory, VolumePoint,
};
use tiercost::Repository;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    repo: Arc<Repository>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        strict_allocation: false,
        default_tier_view: TierView::Effective,
        projection_cache_size: 8,
    };

    let app = api::create_router(api::AppState::new(repo.clone(), config));
    TestApp {
        app,
        repo,
        _temp: temp_dir,
    }
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    content_type: &str,
    body: String,
) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type)
        .body(axum::body::Body::from(body))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, "application/json", body.to_string()).await
}

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn month(year: i32, month: u32) -> TimePoint {
    TimePoint::new(year, month).unwrap()
}

fn provider(id: i64, price: &str) -> ProviderConfig {
    let tiers = TierSchedule::from_entries(vec![TierEntry {
        tier_number: TierNumber::new(1),
        threshold_units: d("100000"),
        base_price: Some(d(price)),
        is_selected: false,
    }])
    .unwrap();
    ProviderConfig::new(ProviderId::new(id), tiers, TierView::Raw)
}

fn product(allocation: AllocationRuleSet) -> ProductConfig {
    ProductConfig::new(
        ProductId::new(1),
        VolumeHistory::new(vec![VolumePoint::new(month(2024, 1), d("1000"))], vec![]),
        vec![ProductItem::new(ItemId::new(1), allocation)],
    )
}

fn scenario(allocation: AllocationRuleSet) -> Scenario {
    Scenario {
        providers: vec![provider(1, "10"), provider(2, "6")],
        products: vec![product(allocation)],
        timeline: vec![month(2024, 1)],
        volume_basis: VolumeBasis::Actuals,
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app().await;
    let (status, body) = send(
        test_app.app.clone(),
        "GET",
        "/health",
        "text/plain",
        String::new(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(test_app.app, "GET", "/ready", "text/plain", String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_resolve_tier_on_boundary() {
    let test_app = setup_test_app().await;
    let (status, body) = post_json(
        test_app.app,
        "/v1/tiers/resolve",
        json!({
            "volume": 1000,
            "tiers": [
                {"tierNumber": 1, "thresholdUnits": 1000, "basePrice": 10},
                {"tierNumber": 2, "thresholdUnits": 5000, "basePrice": 8}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tierNumber"], 2);
    assert_eq!(body["aboveMax"], false);
    assert_eq!(body["headroom"]["gap"].as_f64(), Some(4000.0));
    assert!(body["headroom"]["nextTier"].is_null());
}

#[tokio::test]
async fn test_invalid_tier_table_is_bad_request() {
    let test_app = setup_test_app().await;
    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/tiers/resolve",
        json!({"volume": 10, "tiers": []}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = post_json(
        test_app.app,
        "/v1/tiers/resolve",
        json!({"volume": 10, "tiers": [{"tierNumber": 1, "thresholdUnits": 0}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_aggregate_volumes_rolling_average() {
    let test_app = setup_test_app().await;
    let (status, body) = post_json(
        test_app.app,
        "/v1/volumes/aggregate",
        json!({
            "series": [
                {"year": 2024, "month": 2, "units": 300},
                {"year": 2024, "month": 1, "units": 100}
            ],
            "strategy": {"source": "actuals", "method": "AVG", "lookbackMonths": 1}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0]["month"], 1);
    assert_eq!(points[1]["value"].as_f64(), Some(200.0));
}

#[tokio::test]
async fn test_invalid_month_is_bad_request() {
    let test_app = setup_test_app().await;
    let (status, _) = post_json(
        test_app.app,
        "/v1/volumes/aggregate",
        json!({"series": [{"year": 2024, "month": 13, "units": 1}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_split_reports_incomplete_allocation() {
    let test_app = setup_test_app().await;
    let (status, body) = post_json(
        test_app.app,
        "/v1/allocations/split",
        json!({
            "series": [{"year": 2024, "month": 1, "units": 1000}],
            "allocation": {
                "mode": "percentage",
                "rules": [
                    {"providerId": 1, "value": 60},
                    {"providerId": 2, "value": 30}
                ]
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["total"].as_f64(), Some(90.0));
    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["providerId"], 1);
    assert_eq!(providers[0]["points"][0]["units"].as_f64(), Some(600.0));
}

#[tokio::test]
async fn test_project_inline_scenario() {
    let test_app = setup_test_app().await;
    let body = json!({
        "scenario": scenario(AllocationRuleSet::percentage(&[(1, 60), (2, 40)])),
    });
    let (status, body) = post_json(test_app.app, "/v1/projections", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCost"].as_f64(), Some(8400.0));
    assert_eq!(body["providers"].as_array().unwrap().len(), 2);
    assert!(body["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_strict_allocation_per_request() {
    let test_app = setup_test_app().await;
    let short = scenario(AllocationRuleSet::percentage(&[(1, 60), (2, 30)]));

    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/projections",
        json!({"scenario": &short}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["warnings"][0]["kind"], "allocationSumMismatch");

    let (status, body) = post_json(
        test_app.app,
        "/v1/projections",
        json!({"scenario": &short, "strictAllocation": true}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("90"));
}

#[tokio::test]
async fn test_compare_inline_scenarios() {
    let test_app = setup_test_app().await;
    let body = json!({
        "current": scenario(AllocationRuleSet::percentage(&[(1, 100)])),
        "optimized": scenario(AllocationRuleSet::percentage(&[(1, 50), (2, 50)])),
    });
    let (status, body) = post_json(test_app.app, "/v1/comparisons", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delta"]["amount"].as_f64(), Some(-2000.0));
    assert_eq!(body["delta"]["percent"].as_f64(), Some(-20.0));
    assert_eq!(body["delta"]["classification"], "savings");
}

#[tokio::test]
async fn test_put_provider_tiers() {
    let test_app = setup_test_app().await;
    let body = json!([
        {"tierNumber": 2, "thresholdUnits": 5000, "basePrice": 8, "isSelected": true},
        {"tierNumber": 1, "thresholdUnits": 1000, "basePrice": 10}
    ]);
    let (status, body) = send(
        test_app.app,
        "PUT",
        "/v1/providers/5/tiers",
        "application/json",
        body.to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providerId"], 5);
    assert_eq!(body["billedTier"], 2);
    assert_eq!(body["tiers"][0]["tierNumber"], 1);

    let stored = test_app
        .repo
        .get_provider(ProviderId::new(5), TierView::Effective)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.tiers.billed_tier(), Some(TierNumber::new(2)));
}

#[tokio::test]
async fn test_put_provider_tiers_rejects_two_selected() {
    let test_app = setup_test_app().await;
    let body = json!([
        {"tierNumber": 1, "thresholdUnits": 1000, "isSelected": true},
        {"tierNumber": 2, "thresholdUnits": 5000, "isSelected": true}
    ]);
    let (status, _) = send(
        test_app.app,
        "PUT",
        "/v1/providers/5/tiers",
        "application/json",
        body.to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_volume_csv_import() {
    let test_app = setup_test_app().await;
    let csv = "year,month,units\n2024,2,1500\n2024,3,800\n".to_string();

    let (status, _) = send(
        test_app.app.clone(),
        "PUT",
        "/v1/products/1/volumes/actuals",
        "text/csv",
        csv.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    test_app
        .repo
        .upsert_product(&product(AllocationRuleSet::percentage(&[(1, 100)])))
        .await
        .unwrap();

    let (status, _) = send(
        test_app.app.clone(),
        "PUT",
        "/v1/products/1/volumes/estimates",
        "text/csv",
        csv.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        test_app.app,
        "PUT",
        "/v1/products/1/volumes/forecasts",
        "text/csv",
        csv,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "forecasts");
    assert_eq!(body["months"], 2);
}

#[tokio::test]
async fn test_volume_csv_with_bad_row_is_rejected() {
    let test_app = setup_test_app().await;
    test_app
        .repo
        .upsert_product(&product(AllocationRuleSet::percentage(&[(1, 100)])))
        .await
        .unwrap();

    let (status, body) = send(
        test_app.app,
        "PUT",
        "/v1/products/1/volumes/actuals",
        "text/csv",
        "year,month,units\n2024,1,-5\n".to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_stored_projection_and_comparison() {
    let test_app = setup_test_app().await;
    let repo = &test_app.repo;
    repo.upsert_provider(&provider(1, "10")).await.unwrap();
    repo.upsert_provider(&provider(2, "6")).await.unwrap();
    repo.upsert_product(&product(AllocationRuleSet::percentage(&[(1, 100)])))
        .await
        .unwrap();

    let request = json!({
        "productIds": [1],
        "start": {"year": 2024, "month": 1},
        "months": 2
    });
    let (status, body) =
        post_json(test_app.app.clone(), "/v1/stored/projections", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCost"].as_f64(), Some(10000.0));
    assert_eq!(body["providers"][0]["points"].as_array().unwrap().len(), 2);

    let request = json!({
        "productIds": [1],
        "start": {"year": 2024, "month": 1},
        "months": 1,
        "overrides": [{
            "productId": 1,
            "allocation": {"mode": "percentage", "rules": [{"providerId": 2, "value": 100}]}
        }]
    });
    let (status, body) = post_json(test_app.app, "/v1/stored/comparisons", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["totalCost"].as_f64(), Some(10000.0));
    assert_eq!(body["optimized"]["totalCost"].as_f64(), Some(6000.0));
    assert_eq!(body["delta"]["classification"], "savings");
}

#[tokio::test]
async fn test_stored_projection_missing_product() {
    let test_app = setup_test_app().await;
    let (status, body) = post_json(
        test_app.app,
        "/v1/stored/projections",
        json!({"productIds": [99], "start": {"year": 2024, "month": 1}, "months": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("99"));
}

#[tokio::test]
async fn test_aggregate_overflow_is_bad_request() {
    let test_app = setup_test_app().await;
    let (status, body) = post_json(
        test_app.app,
        "/v1/volumes/aggregate",
        json!({
            "series": [
                {"year": 2024, "month": 1, "units": 6e28},
                {"year": 2024, "month": 2, "units": 6e28}
            ],
            "strategy": {"source": "actuals", "method": "SUM", "lookbackMonths": 1}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("exceeds the decimal range"));
}

#[tokio::test]
async fn test_stored_projection_rejects_overlong_timeline() {
    let test_app = setup_test_app().await;
    test_app
        .repo
        .upsert_product(&product(AllocationRuleSet::percentage(&[(1, 100)])))
        .await
        .unwrap();

    for months in [1201u64, 100_000, 1_000_000_000_000_000_000] {
        let (status, body) = post_json(
            test_app.app.clone(),
            "/v1/stored/projections",
            json!({"productIds": [1], "start": {"year": 2024, "month": 1}, "months": months}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "months {}", months);
        assert!(body["error"].as_str().unwrap().contains("at most 1200"));
    }
}
