// History module
// Append-only per-user record of queries and the recommendations they got


use anyhow::{Result, bail};
use tokio::sync::Mutex;
use tracing::debug;

use crate::database::sqlite::Database;
use crate::database::sqlite::models::{HistoryEntry, NewHistoryEntry};

/// History on top of the SQLite store. Writes from one store are
/// serialised; reads go straight to the pool.
#[derive(Debug)]
pub struct HistoryStore {
    database: Database,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    #[inline]
    pub fn new(database: Database) -> Self {
        Self {
            database,
            write_lock: Mutex::new(()),
        }
    }

    /// Record one query; the timestamp is assigned here
    #[inline]
    pub async fn append(
        &self,
        user_id: &str,
        query: &str,
        recommendation: Option<&str>,
    ) -> Result<HistoryEntry> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            bail!("History entries need a user id");
        }

        let _guard = self.write_lock.lock().await;
        let entry = self
            .database
            .insert_history(NewHistoryEntry {
                user_id: user_id.to_string(),
                query: query.to_string(),
                recommendation: recommendation.map(str::to_string),
            })
            .await?;

        debug!("Recorded history entry {} for {}", entry.id, entry.user_id);
        Ok(entry)
    }

    /// Entries for `user_id`, most recent first
    #[inline]
    pub async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        self.database.list_history(user_id.trim()).await
    }
}
