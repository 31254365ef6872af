#[cfg(test)]
mod tests;

use super::models::*;
use crate::catalog::LaptopRecord;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

const LAPTOP_COLUMNS: &str = "id, company, product, type_name, inches, ram, os, weight, price, \
     screen, screen_w, screen_h, touchscreen, ips, retina, cpu_company, cpu_freq, cpu_model, \
     primary_storage, secondary_storage, primary_storage_type, secondary_storage_type, \
     gpu_company, gpu_model";

pub struct LaptopQueries;

impl LaptopQueries {
    /// Swap the whole catalog for `records` in one transaction.
    ///
    /// Readers see either the old catalog or the new one, never a mix.
    #[inline]
    pub async fn replace_all(pool: &SqlitePool, records: &[LaptopRecord]) -> Result<u64> {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin catalog transaction")?;

        let removed = sqlx::query("DELETE FROM laptops")
            .execute(&mut *tx)
            .await
            .context("Failed to clear laptops table")?
            .rows_affected();

        let insert = format!(
            "INSERT INTO laptops ({LAPTOP_COLUMNS}) VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        for record in records {
            sqlx::query(&insert)
                .bind(record.id)
                .bind(&record.company)
                .bind(&record.product)
                .bind(&record.type_name)
                .bind(record.inches)
                .bind(record.ram)
                .bind(&record.os)
                .bind(record.weight)
                .bind(record.price)
                .bind(&record.screen)
                .bind(record.screen_w)
                .bind(record.screen_h)
                .bind(record.touchscreen)
                .bind(record.ips)
                .bind(record.retina)
                .bind(&record.cpu_company)
                .bind(record.cpu_freq)
                .bind(&record.cpu_model)
                .bind(record.primary_storage)
                .bind(record.secondary_storage)
                .bind(record.primary_storage_type)
                .bind(record.secondary_storage_type)
                .bind(&record.gpu_company)
                .bind(&record.gpu_model)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert laptop {}", record.id))?;
        }

        tx.commit()
            .await
            .context("Failed to commit catalog transaction")?;

        info!(
            "Replaced catalog: {} rows removed, {} rows inserted",
            removed,
            records.len()
        );
        Ok(records.len() as u64)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<LaptopRecord>> {
        let query = format!("SELECT {LAPTOP_COLUMNS} FROM laptops ORDER BY id");
        let records = sqlx::query_as::<_, LaptopRecord>(&query)
            .fetch_all(pool)
            .await
            .context("Failed to list laptops")?;

        debug!("Fetched {} laptops", records.len());
        Ok(records)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM laptops")
            .fetch_one(pool)
            .await
            .context("Failed to count laptops")?;

        Ok(count)
    }
}

pub struct HistoryQueries;

impl HistoryQueries {
    /// Append one entry; the timestamp is taken here, not from the caller
    #[inline]
    pub async fn append(pool: &SqlitePool, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let id = sqlx::query(
            "INSERT INTO history (user_id, query, recommendation, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.user_id)
        .bind(&entry.query)
        .bind(&entry.recommendation)
        .bind(&timestamp)
        .execute(pool)
        .await
        .context("Failed to insert history entry")?
        .last_insert_rowid();

        Ok(HistoryEntry {
            id,
            user_id: entry.user_id,
            query: entry.query,
            recommendation: entry.recommendation,
            timestamp,
        })
    }

    /// Entries for one user, most recent first
    #[inline]
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT id, user_id, query, recommendation, timestamp
            FROM history
            WHERE user_id = ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list history for user {user_id}"))?;

        Ok(entries)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM history")
            .fetch_one(pool)
            .await
            .context("Failed to count history entries")?;

        Ok(count)
    }
}
