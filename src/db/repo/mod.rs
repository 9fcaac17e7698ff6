//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `contracts.rs` - Providers, tier tables, lookup strategies and item prices
//! - `products.rs` - Products, items, allocations, multipliers and volumes

mod contracts;
mod products;

use crate::domain::{Decimal, TierNumber};
use sqlx::sqlite::SqlitePool;

use super::StoreError;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Cheap round trip used by readiness checks.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_decimal(table: &'static str, column: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str_canonical(raw)
        .map_err(|e| StoreError::corrupt(table, format!("{}={:?}: {}", column, raw, e)))
}

fn parse_tier_number(table: &'static str, raw: i64) -> Result<TierNumber, StoreError> {
    u32::try_from(raw)
        .map(TierNumber::new)
        .map_err(|_| StoreError::corrupt(table, format!("tier_number={}", raw)))
}
