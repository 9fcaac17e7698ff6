//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for contracts, products and volumes

pub mod migrations;
pub mod repo;

use crate::domain::ValidationError;
use thiserror::Error;

pub use migrations::init_db;
pub use repo::Repository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored value that no longer parses into its domain type.
    #[error("corrupt {table} row: {detail}")]
    Corrupt { table: &'static str, detail: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, detail: impl Into<String>) -> Self {
        StoreError::Corrupt {
            table,
            detail: detail.into(),
        }
    }
}
