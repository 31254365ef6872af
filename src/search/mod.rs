// Search module
// Hybrid retrieval: vector candidates narrowed by LLM-derived attribute filters

pub mod filters;
pub mod intent;


use async_trait::async_trait;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::LaptopRecord;
use crate::embeddings::Embedder;

pub use filters::{AttributeFilter, USE_CASE_RULES, UseCaseRule, apply_filters, filters_for, normalize_use_case};
pub use intent::{IntentExtractor, IntentOutcome, IntentParseError, QueryIntent, parse_intent};

pub const NO_MATCHES_MESSAGE: &str = "Sorry, no laptops match your criteria.";

/// Exact nearest-neighbour lookup over the indexed catalog
#[async_trait]
pub trait NearestNeighbors: Send + Sync {
    /// Up to `k` catalog records closest to `query_vector`, nearest first
    async fn nearest(&self, query_vector: &[f32], k: usize) -> crate::Result<Vec<LaptopRecord>>;
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search query is empty")]
    EmptyQuery,
    #[error("Error during semantic search: {0}")]
    Embedding(String),
    #[error("Error accessing results: {0}")]
    Retrieval(String),
}

/// What a search produced. "No matches" is a valid answer, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Filtered candidates in ascending price order
    Matches(Vec<LaptopRecord>),
    NoMatches,
}

impl SearchOutcome {
    #[inline]
    pub fn matches(&self) -> &[LaptopRecord] {
        match self {
            Self::Matches(records) => records,
            Self::NoMatches => &[],
        }
    }
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatches => f.write_str(NO_MATCHES_MESSAGE),
            Self::Matches(records) => f.write_str(&render_results(records)),
        }
    }
}

/// Render matches as the "Top Results:" listing
#[inline]
pub fn render_results(records: &[LaptopRecord]) -> String {
    let mut out = String::from("Top Results:\n");
    for record in records {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "\n{} by {}\n  - RAM: {} GB\n  - CPU: {}\n  - GPU: {}\n  - Price: €{}\n  - Weight: {} kg\n  - Storage: {} GB {}\n",
            record.product,
            record.company,
            record.ram,
            record.cpu_model,
            record.gpu_model,
            record.price,
            record.weight,
            record.primary_storage,
            record.primary_storage_type,
        );
    }
    out
}

/// Full search result, with the intent that shaped it
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub intent: IntentOutcome,
    /// Size of the vector candidate set before filtering
    pub candidates: usize,
    pub outcome: SearchOutcome,
}

/// Vector search followed by structured filtering and a price sort
#[derive(Clone)]
pub struct HybridSearch {
    extractor: IntentExtractor,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn NearestNeighbors>,
    top_k: usize,
}

impl HybridSearch {
    #[inline]
    pub fn new(
        extractor: IntentExtractor,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn NearestNeighbors>,
        top_k: usize,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            top_k,
        }
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Search with the configured candidate window
    #[inline]
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        Ok(self.search_with_k(query, self.top_k).await?.outcome)
    }

    /// Search with an explicit candidate window `k`.
    ///
    /// Intent failures degrade to an unfiltered search. Embedding and
    /// retrieval failures are errors.
    #[inline]
    pub async fn search_with_k(&self, query: &str, k: usize) -> Result<SearchReport, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        info!("Searching for {:?} with k={}", query, k);

        let intent = self.extractor.extract(query);
        let filters = filters_for(&intent.intent());

        let query_vector = self
            .embedder
            .embed(query)
            .map_err(|e| SearchError::Embedding(format!("{e:#}")))?;

        let mut candidates = self
            .index
            .nearest(&query_vector, k)
            .await
            .map_err(|e| SearchError::Retrieval(e.to_string()))?;
        candidates.truncate(k);
        let candidate_count = candidates.len();
        debug!("Vector search returned {} candidates", candidate_count);

        let mut matches = apply_filters(&filters, candidates);
        let outcome = if matches.is_empty() {
            SearchOutcome::NoMatches
        } else {
            matches.sort_by(|a, b| a.price.total_cmp(&b.price));
            SearchOutcome::Matches(matches)
        };

        Ok(SearchReport {
            intent,
            candidates: candidate_count,
            outcome,
        })
    }
}
