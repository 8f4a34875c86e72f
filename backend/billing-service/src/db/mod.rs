/// Database access layer
///
/// This module provides:
/// - Database connection pooling
/// - Repositories for ledgers, promotional credits, upload intents and
///   block purchases
///
/// Every ledger mutation goes through a row-locked transaction; see
/// `ledger_repo` for the locking entry points.
pub mod credit_repo;
pub mod intent_repo;
pub mod ledger_repo;
pub mod purchase_repo;

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Build the service connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.max_connections.min(2))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.url)
        .await
}
