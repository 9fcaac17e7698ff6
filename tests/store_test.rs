use std::sync::Arc;
use tempfile::TempDir;
use tiercost::datasource::ScenarioSource;
use tiercost::db::init_db;
use tiercost::domain::{
    AggregationMethod, AllocationRuleSet, Decimal, ItemId, LookupStrategy, ProductConfig,
    ProductId, ProductItem, ProviderConfig, ProviderId, TierEntry, TierNumber, TierSchedule,
    TierView, TimePoint, VolumeBasis, VolumeHistory, VolumePoint, VolumeSource,
};
use tiercost::engine::{CostComparator, CostProjector, ProjectionOptions, Warning};
use tiercost::orchestration::{AllocationOverride, ScenarioAssembler, StoredScenarioRequest};
use tiercost::Repository;
use tokio_test::assert_ok;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn month(year: i32, month: u32) -> TimePoint {
    TimePoint::new(year, month).unwrap()
}

fn tier(n: u32, threshold: &str, price: &str) -> TierEntry {
    TierEntry {
        tier_number: TierNumber::new(n),
        threshold_units: d(threshold),
        base_price: Some(d(price)),
        is_selected: false,
    }
}

async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

async fn seed(repo: &Repository) {
    let acme = ProviderConfig::new(
        ProviderId::new(1),
        TierSchedule::from_entries(vec![
            tier(1, "1000", "10"),
            tier(2, "5000", "8"),
            tier(3, "10000", "6"),
        ])
        .unwrap(),
        TierView::Effective,
    )
    .with_name("Acme")
    .with_strategy(LookupStrategy::new(
        VolumeSource::Actuals,
        AggregationMethod::Sum,
        2,
    ));
    let globex = ProviderConfig::new(
        ProviderId::new(2),
        TierSchedule::from_entries(vec![tier(1, "2000", "9"), tier(2, "20000", "7")]).unwrap(),
        TierView::Raw,
    )
    .with_name("Globex");

    let mut product = ProductConfig::new(
        ProductId::new(1),
        VolumeHistory::new(
            vec![
                VolumePoint::new(month(2023, 11), d("600")),
                VolumePoint::new(month(2023, 12), d("600")),
                VolumePoint::new(month(2024, 1), d("600")),
                VolumePoint::new(month(2024, 2), d("1200")),
            ],
            vec![],
        ),
        vec![ProductItem::new(
            ItemId::new(1),
            AllocationRuleSet::percentage(&[(1, 50), (2, 50)]),
        )],
    );
    product.name = "Widgets".to_string();

    assert_ok!(repo.upsert_provider(&acme).await);
    assert_ok!(repo.upsert_provider(&globex).await);
    assert_ok!(repo.upsert_product(&product).await);
}

fn request() -> StoredScenarioRequest {
    StoredScenarioRequest {
        product_ids: vec![ProductId::new(1)],
        start: month(2024, 1),
        months: 2,
        volume_basis: VolumeBasis::Actuals,
    }
}

#[tokio::test]
async fn test_stored_provider_round_trips() {
    let (repo, _temp) = setup_repo().await;
    seed(&repo).await;

    let acme = repo
        .fetch_provider(ProviderId::new(1), TierView::Raw)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(acme.name, "Acme");
    assert_eq!(acme.tier_view, TierView::Effective);
    assert_eq!(acme.strategy.lookback_months, 2);
    assert_eq!(acme.tiers.entries().len(), 3);
    assert_eq!(
        acme.tiers.base_prices().get(&TierNumber::new(2)).copied(),
        Some(d("8"))
    );
}

#[tokio::test]
async fn test_bare_provider_takes_default_view() {
    let (repo, _temp) = setup_repo().await;
    let tiers = TierSchedule::from_entries(vec![tier(1, "500", "3")]).unwrap();
    assert_ok!(repo.replace_provider_tiers(ProviderId::new(7), &tiers).await);

    let provider = repo
        .get_provider(ProviderId::new(7), TierView::Billed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(provider.tier_view, TierView::Billed);
    assert_eq!(provider.tiers, tiers);
}

#[tokio::test]
async fn test_assembled_scenario_projects_like_inline_one() {
    let (repo, _temp) = setup_repo().await;
    seed(&repo).await;

    let assembler = ScenarioAssembler::new(repo.clone(), TierView::Effective);
    let scenario = assembler.assemble(&request(), &[]).await.unwrap();
    assert_eq!(scenario.providers.len(), 2);
    assert_eq!(scenario.timeline, vec![month(2024, 1), month(2024, 2)]);

    let result = CostProjector::project(&scenario, &ProjectionOptions::default()).unwrap();
    assert_eq!(result.total_cost, d("15900"));
    assert_eq!(result.products[0].name, "Widgets");
}

#[tokio::test]
async fn test_product_level_override_drives_comparison() {
    let (repo, _temp) = setup_repo().await;
    seed(&repo).await;

    let assembler = ScenarioAssembler::new(repo.clone(), TierView::Effective);
    let overrides = [AllocationOverride {
        product_id: ProductId::new(1),
        item_id: None,
        allocation: AllocationRuleSet::percentage(&[(1, 100)]),
    }];
    let current = assembler.assemble(&request(), &[]).await.unwrap();
    let optimized = assembler.assemble(&request(), &overrides).await.unwrap();

    let cmp = CostComparator::compare(&current, &optimized, &ProjectionOptions::default())
        .unwrap();
    assert_eq!(cmp.optimized.total_cost, d("14400"));
    assert_eq!(cmp.delta.amount, d("-1500"));
}

#[tokio::test]
async fn test_unstored_provider_surfaces_as_warning() {
    let (repo, _temp) = setup_repo().await;
    seed(&repo).await;
    let updated = repo
        .replace_item_allocation(
            ProductId::new(1),
            ItemId::new(1),
            &AllocationRuleSet::percentage(&[(1, 50), (42, 50)]),
        )
        .await
        .unwrap();
    assert!(updated);

    let assembler = ScenarioAssembler::new(repo.clone(), TierView::Effective);
    let scenario = assembler.assemble(&request(), &[]).await.unwrap();
    assert_eq!(scenario.providers.len(), 1);

    let result = CostProjector::project(&scenario, &ProjectionOptions::default()).unwrap();
    assert!(result.warnings.contains(&Warning::UnknownProvider {
        product_id: ProductId::new(1),
        item_id: ItemId::new(1),
        provider_id: ProviderId::new(42),
    }));
}

#[tokio::test]
async fn test_volume_upsert_overwrites_single_months() {
    let (repo, _temp) = setup_repo().await;
    seed(&repo).await;

    let written = repo
        .upsert_volumes(
            ProductId::new(1),
            VolumeSource::Actuals,
            &[
                VolumePoint::new(month(2024, 2), d("1500")),
                VolumePoint::new(month(2024, 3), d("800")),
            ],
        )
        .await
        .unwrap();
    assert_eq!(written, 2);

    let actuals = repo
        .query_volumes(ProductId::new(1), VolumeSource::Actuals)
        .await
        .unwrap();
    assert_eq!(actuals.len(), 5);
    assert_eq!(actuals[3].units, d("1500"));
    assert_eq!(actuals[4].time, month(2024, 3));
}
