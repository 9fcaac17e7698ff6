//! Product, item allocation and volume operations for the repository.

use crate::domain::{
    AllocationMode, AllocationRule, AllocationRuleSet, ItemId, ProductConfig, ProductId,
    ProductItem, ProviderId, TimePoint, VolumeHistory, VolumePoint, VolumeSource,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::debug;

use super::{now_ms, parse_decimal, Repository, StoreError};

impl Repository {
    /// Insert or replace a product with its items, allocations, multipliers
    /// and both volume series.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_product(&self, product: &ProductConfig) -> Result<(), StoreError> {
        let id = product.product_id.as_i64();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&product.name)
        .bind(now_ms())
        .execute(&mut *tx)
        .await?;

        // Cascades to allocations and multipliers.
        sqlx::query("DELETE FROM product_items WHERE product_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for item in &product.items {
            sqlx::query(
                r#"
                INSERT INTO product_items (product_id, item_id, name, allocation_mode, locked_provider_id)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(item.item_id.as_i64())
            .bind(&item.name)
            .bind(item.allocation.mode.as_str())
            .bind(item.allocation.locked_provider_id.map(|p| p.as_i64()))
            .execute(&mut *tx)
            .await?;

            write_allocation_rules(&mut *tx, product.product_id, item.item_id, &item.allocation)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO item_price_multipliers (product_id, item_id, multiplier)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(item.item_id.as_i64())
            .bind(item.multiplier.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM volumes WHERE product_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for (source, series) in [
            (VolumeSource::Actuals, &product.volumes.actuals),
            (VolumeSource::Forecasts, &product.volumes.forecasts),
        ] {
            write_volumes(&mut *tx, product.product_id, source, series).await?;
        }

        tx.commit().await?;
        debug!(product_id = id, items = product.items.len(), "product stored");
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn product_exists(&self, product_id: ProductId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM products WHERE id = ?")
            .bind(product_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Load a product with items ordered by item id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value does not parse.
    pub async fn get_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductConfig>, StoreError> {
        let id = product_id.as_i64();
        let Some(product_row) = sqlx::query("SELECT name FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let rule_rows = sqlx::query(
            r#"
            SELECT item_id, provider_id, value
            FROM item_allocations
            WHERE product_id = ?
            ORDER BY item_id ASC, provider_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut rules: BTreeMap<i64, Vec<AllocationRule>> = BTreeMap::new();
        for row in &rule_rows {
            let value: String = row.get("value");
            rules.entry(row.get("item_id")).or_default().push(AllocationRule::new(
                ProviderId::new(row.get("provider_id")),
                parse_decimal("item_allocations", "value", &value)?,
            ));
        }

        let item_rows = sqlx::query(
            r#"
            SELECT pi.item_id, pi.name, pi.allocation_mode, pi.locked_provider_id, m.multiplier
            FROM product_items pi
            LEFT JOIN item_price_multipliers m
                ON m.product_id = pi.product_id AND m.item_id = pi.item_id
            WHERE pi.product_id = ?
            ORDER BY pi.item_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(item_rows.len());
        for row in &item_rows {
            let item_id: i64 = row.get("item_id");
            let mode: String = row.get("allocation_mode");
            let mode = AllocationMode::parse(&mode).ok_or_else(|| {
                StoreError::corrupt("product_items", format!("allocation_mode={:?}", mode))
            })?;

            let mut allocation =
                AllocationRuleSet::new(mode, rules.remove(&item_id).unwrap_or_default());
            allocation.locked_provider_id = row
                .get::<Option<i64>, _>("locked_provider_id")
                .map(ProviderId::new);

            let mut item = ProductItem::new(ItemId::new(item_id), allocation);
            item.name = row.get("name");
            if let Some(multiplier) = row.get::<Option<String>, _>("multiplier") {
                item.multiplier =
                    parse_decimal("item_price_multipliers", "multiplier", &multiplier)?;
            }
            items.push(item);
        }

        let volumes = VolumeHistory::new(
            self.query_volumes(product_id, VolumeSource::Actuals).await?,
            self.query_volumes(product_id, VolumeSource::Forecasts).await?,
        );

        let mut product = ProductConfig::new(product_id, volumes, items);
        product.name = product_row.get("name");
        Ok(Some(product))
    }

    /// Replace one item's allocation rules. Returns `false` when the item
    /// does not exist.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn replace_item_allocation(
        &self,
        product_id: ProductId,
        item_id: ItemId,
        allocation: &AllocationRuleSet,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE product_items SET allocation_mode = ?, locked_provider_id = ?
            WHERE product_id = ? AND item_id = ?
            "#,
        )
        .bind(allocation.mode.as_str())
        .bind(allocation.locked_provider_id.map(|p| p.as_i64()))
        .bind(product_id.as_i64())
        .bind(item_id.as_i64())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        write_allocation_rules(&mut *tx, product_id, item_id, allocation).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Upsert one volume series month by month. Months not in `points` are
    /// left untouched.
    ///
    /// Returns the number of months written.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_volumes(
        &self,
        product_id: ProductId,
        source: VolumeSource,
        points: &[VolumePoint],
    ) -> Result<usize, StoreError> {
        if points.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let written = write_volumes(&mut *tx, product_id, source, points).await?;
        tx.commit().await?;

        debug!(
            product_id = product_id.as_i64(),
            kind = source.as_str(),
            months = written,
            "volumes stored"
        );
        Ok(written)
    }

    /// One series for a product, ordered by month.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored row does not parse.
    pub async fn query_volumes(
        &self,
        product_id: ProductId,
        source: VolumeSource,
    ) -> Result<Vec<VolumePoint>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT year, month, units
            FROM volumes
            WHERE product_id = ? AND kind = ?
            ORDER BY year ASC, month ASC
            "#,
        )
        .bind(product_id.as_i64())
        .bind(source.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let year: i64 = row.get("year");
                let month: i64 = row.get("month");
                let units: String = row.get("units");
                let time = i32::try_from(year)
                    .ok()
                    .zip(u32::try_from(month).ok())
                    .and_then(|(y, m)| TimePoint::new(y, m).ok())
                    .ok_or_else(|| {
                        StoreError::corrupt("volumes", format!("year={} month={}", year, month))
                    })?;
                Ok(VolumePoint::new(
                    time,
                    parse_decimal("volumes", "units", &units)?,
                ))
            })
            .collect()
    }
}

async fn write_allocation_rules(
    conn: &mut SqliteConnection,
    product_id: ProductId,
    item_id: ItemId,
    allocation: &AllocationRuleSet,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM item_allocations WHERE product_id = ? AND item_id = ?")
        .bind(product_id.as_i64())
        .bind(item_id.as_i64())
        .execute(&mut *conn)
        .await?;

    for rule in &allocation.rules {
        sqlx::query(
            r#"
            INSERT INTO item_allocations (product_id, item_id, provider_id, value)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(product_id.as_i64())
        .bind(item_id.as_i64())
        .bind(rule.provider_id.as_i64())
        .bind(rule.value.to_canonical_string())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn write_volumes(
    conn: &mut SqliteConnection,
    product_id: ProductId,
    source: VolumeSource,
    points: &[VolumePoint],
) -> Result<usize, StoreError> {
    let updated_at = now_ms();
    for point in points {
        sqlx::query(
            r#"
            INSERT INTO volumes (product_id, kind, year, month, units, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_id, kind, year, month) DO UPDATE SET
                units = excluded.units,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(product_id.as_i64())
        .bind(source.as_str())
        .bind(point.time.year())
        .bind(i64::from(point.time.month()))
        .bind(point.units.to_canonical_string())
        .bind(updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(points.len())
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use super::*;
    use crate::domain::Decimal;
    use tokio_test::{assert_err, assert_ok};

    fn vp(month: u32, units: i64) -> VolumePoint {
        VolumePoint::new(TimePoint::new(2024, month).unwrap(), Decimal::from(units))
    }

    fn product() -> ProductConfig {
        let mut product = ProductConfig::new(
            ProductId::new(1),
            VolumeHistory::new(vec![vp(1, 100), vp(2, 200)], vec![vp(3, 300)]),
            vec![
                ProductItem::new(ItemId::new(10), AllocationRuleSet::percentage(&[(1, 60), (2, 40)]))
                    .with_multiplier(Decimal::from_str_canonical("0.9").unwrap()),
                ProductItem::new(
                    ItemId::new(11),
                    AllocationRuleSet::units(&[(1, 500)]).locked_to(ProviderId::new(2)),
                ),
            ],
        );
        product.name = "Widgets".to_string();
        product.items[0].name = "base".to_string();
        product
    }

    #[tokio::test]
    async fn test_upsert_and_get_product() {
        let (repo, _temp) = setup_test_db().await;
        assert_ok!(repo.upsert_product(&product()).await);

        let loaded = repo.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(loaded, product());
        assert!(repo.product_exists(ProductId::new(1)).await.unwrap());
        assert!(!repo.product_exists(ProductId::new(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_product_replaces_items() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_product(&product()).await.unwrap();

        let mut smaller = product();
        smaller.items.truncate(1);
        smaller.volumes.forecasts.clear();
        repo.upsert_product(&smaller).await.unwrap();

        let loaded = repo.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert!(loaded.volumes.forecasts.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_volumes_overwrites_month() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_product(&product()).await.unwrap();

        let written = repo
            .upsert_volumes(ProductId::new(1), VolumeSource::Actuals, &[vp(2, 250), vp(4, 400)])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let actuals = repo
            .query_volumes(ProductId::new(1), VolumeSource::Actuals)
            .await
            .unwrap();
        assert_eq!(actuals, vec![vp(1, 100), vp(2, 250), vp(4, 400)]);
    }

    #[tokio::test]
    async fn test_volumes_require_existing_product() {
        let (repo, _temp) = setup_test_db().await;
        assert_err!(
            repo.upsert_volumes(ProductId::new(9), VolumeSource::Actuals, &[vp(1, 1)])
                .await
        );
    }

    #[tokio::test]
    async fn test_replace_item_allocation() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_product(&product()).await.unwrap();

        let replaced = repo
            .replace_item_allocation(
                ProductId::new(1),
                ItemId::new(10),
                &AllocationRuleSet::percentage(&[(3, 100)]),
            )
            .await
            .unwrap();
        assert!(replaced);

        let missing = repo
            .replace_item_allocation(
                ProductId::new(1),
                ItemId::new(99),
                &AllocationRuleSet::percentage(&[(3, 100)]),
            )
            .await
            .unwrap();
        assert!(!missing);

        let loaded = repo.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(
            loaded.items[0].allocation,
            AllocationRuleSet::percentage(&[(3, 100)])
        );
    }
}
