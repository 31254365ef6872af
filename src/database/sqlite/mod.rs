use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::LaptopRecord;
use crate::database::sqlite::models::{HistoryEntry, NewHistoryEntry};
use crate::database::sqlite::queries::{HistoryQueries, LaptopQueries};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    // Catalog operations
    pub async fn replace_catalog(&self, records: &[LaptopRecord]) -> Result<u64> {
        LaptopQueries::replace_all(&self.pool, records).await
    }

    pub async fn list_laptops(&self) -> Result<Vec<LaptopRecord>> {
        LaptopQueries::list_all(&self.pool).await
    }

    pub async fn count_laptops(&self) -> Result<i64> {
        LaptopQueries::count(&self.pool).await
    }

    // History operations
    pub async fn insert_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        HistoryQueries::append(&self.pool, entry).await
    }

    pub async fn list_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        HistoryQueries::list_for_user(&self.pool, user_id).await
    }

    pub async fn count_history(&self) -> Result<i64> {
        HistoryQueries::count(&self.pool).await
    }

    /// Close every pooled connection; the single teardown path for the store
    pub async fn close(&self) {
        debug!("Closing database pool");
        self.pool.close().await;
    }
}
