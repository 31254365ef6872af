
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded query, with the recommendation shown for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: String,
    pub query: String,
    pub recommendation: Option<String>,
    /// RFC 3339 UTC timestamp assigned by the store at write time
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub user_id: String,
    pub query: String,
    pub recommendation: Option<String>,
}

impl HistoryEntry {
    #[inline]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    #[inline]
    pub fn has_recommendation(&self) -> bool {
        self.recommendation
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }
}
