//! Provider contract operations for the repository.

use crate::domain::{
    AggregationMethod, Decimal, ItemId, ItemPriceTable, LookupStrategy, ProviderConfig,
    ProviderId, TierEntry, TierSchedule, TierView, VolumeSource,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::debug;

use super::{now_ms, parse_decimal, parse_tier_number, Repository, StoreError};

impl Repository {
    /// Insert or replace a provider with its tier table, lookup strategy and
    /// item prices in one transaction.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn upsert_provider(&self, provider: &ProviderConfig) -> Result<(), StoreError> {
        let id = provider.provider_id.as_i64();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO providers (id, name, tier_view, tier_volume_override, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                tier_view = excluded.tier_view,
                tier_volume_override = excluded.tier_volume_override,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&provider.name)
        .bind(provider.tier_view.as_str())
        .bind(provider.tier_volume_override.map(|d| d.to_canonical_string()))
        .bind(now_ms())
        .execute(&mut *tx)
        .await?;

        write_tiers(&mut *tx, provider.provider_id, &provider.tiers).await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO lookup_strategies (provider_id, source, method, lookback_months)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(provider.strategy.source.as_str())
        .bind(provider.strategy.method.as_str())
        .bind(i64::from(provider.strategy.lookback_months))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM item_tier_prices WHERE provider_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for (item_id, prices) in &provider.item_prices {
            for (tier_number, price) in prices {
                sqlx::query(
                    r#"
                    INSERT INTO item_tier_prices (provider_id, item_id, tier_number, price)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(id)
                .bind(item_id.as_i64())
                .bind(i64::from(tier_number.as_u32()))
                .bind(price.to_canonical_string())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        debug!(provider_id = id, tiers = provider.tiers.thresholds().len(), "provider stored");
        Ok(())
    }

    /// Replace a provider's tier table, creating a bare provider row if needed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn replace_provider_tiers(
        &self,
        provider_id: ProviderId,
        tiers: &TierSchedule,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO providers (id, updated_at) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(provider_id.as_i64())
        .bind(now_ms())
        .execute(&mut *tx)
        .await?;

        write_tiers(&mut *tx, provider_id, tiers).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Load a provider. `default_view` applies when no tier view is recorded.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored row no longer
    /// validates.
    pub async fn get_provider(
        &self,
        provider_id: ProviderId,
        default_view: TierView,
    ) -> Result<Option<ProviderConfig>, StoreError> {
        let id = provider_id.as_i64();
        let Some(row) = sqlx::query(
            "SELECT name, tier_view, tier_volume_override FROM providers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let tier_view = match row.get::<Option<String>, _>("tier_view") {
            Some(raw) => TierView::parse(&raw)
                .ok_or_else(|| StoreError::corrupt("providers", format!("tier_view={:?}", raw)))?,
            None => default_view,
        };
        let tier_volume_override = row
            .get::<Option<String>, _>("tier_volume_override")
            .map(|raw| parse_decimal("providers", "tier_volume_override", &raw))
            .transpose()?;

        let tier_rows = sqlx::query(
            r#"
            SELECT tier_number, threshold_units, base_price, is_selected
            FROM provider_tiers
            WHERE provider_id = ?
            ORDER BY tier_number ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(tier_rows.len());
        for row in &tier_rows {
            let threshold: String = row.get("threshold_units");
            let base_price: Option<String> = row.get("base_price");
            entries.push(TierEntry {
                tier_number: parse_tier_number("provider_tiers", row.get("tier_number"))?,
                threshold_units: parse_decimal("provider_tiers", "threshold_units", &threshold)?,
                base_price: base_price
                    .map(|raw| parse_decimal("provider_tiers", "base_price", &raw))
                    .transpose()?,
                is_selected: row.get::<i64, _>("is_selected") != 0,
            });
        }
        let tiers = TierSchedule::from_entries(entries)?;

        let strategy = match sqlx::query(
            "SELECT source, method, lookback_months FROM lookup_strategies WHERE provider_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        {
            Some(row) => {
                let source: String = row.get("source");
                let method: String = row.get("method");
                let lookback: i64 = row.get("lookback_months");
                LookupStrategy::new(
                    VolumeSource::parse(&source).ok_or_else(|| {
                        StoreError::corrupt("lookup_strategies", format!("source={:?}", source))
                    })?,
                    AggregationMethod::parse(&method).ok_or_else(|| {
                        StoreError::corrupt("lookup_strategies", format!("method={:?}", method))
                    })?,
                    u32::try_from(lookback).map_err(|_| {
                        StoreError::corrupt(
                            "lookup_strategies",
                            format!("lookback_months={}", lookback),
                        )
                    })?,
                )
            }
            None => LookupStrategy::default(),
        };

        let price_rows = sqlx::query(
            r#"
            SELECT item_id, tier_number, price
            FROM item_tier_prices
            WHERE provider_id = ?
            ORDER BY item_id ASC, tier_number ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut item_prices = ItemPriceTable::new();
        for row in &price_rows {
            let price: String = row.get("price");
            let price: Decimal = parse_decimal("item_tier_prices", "price", &price)?;
            item_prices
                .entry(ItemId::new(row.get("item_id")))
                .or_default()
                .insert(parse_tier_number("item_tier_prices", row.get("tier_number"))?, price);
        }

        let mut provider = ProviderConfig::new(provider_id, tiers, tier_view)
            .with_name(row.get::<String, _>("name"))
            .with_strategy(strategy);
        provider.item_prices = item_prices;
        provider.tier_volume_override = tier_volume_override;
        Ok(Some(provider))
    }
}

async fn write_tiers(
    conn: &mut SqliteConnection,
    provider_id: ProviderId,
    tiers: &TierSchedule,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM provider_tiers WHERE provider_id = ?")
        .bind(provider_id.as_i64())
        .execute(&mut *conn)
        .await?;

    for entry in tiers.entries() {
        sqlx::query(
            r#"
            INSERT INTO provider_tiers (provider_id, tier_number, threshold_units, base_price, is_selected)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(provider_id.as_i64())
        .bind(i64::from(entry.tier_number.as_u32()))
        .bind(entry.threshold_units.to_canonical_string())
        .bind(entry.base_price.map(|d| d.to_canonical_string()))
        .bind(i64::from(entry.is_selected))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
