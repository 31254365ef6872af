// Application context
// Everything a query needs, loaded and checked once at startup

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::DealError;
use crate::config::Config;
use crate::database::sqlite::Database;
use crate::database::sqlite::models::HistoryEntry;
use crate::embeddings::{Embedder, OllamaClient};
use crate::history::HistoryStore;
use crate::indexer::{BuildManifest, LoadedIndex};
use crate::llm::{ChatClient, ChatModel};
use crate::recommend::RecommendationComposer;
use crate::search::{HybridSearch, IntentExtractor, SearchOutcome};

/// A finished recommendation and the history entry it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub outcome: SearchOutcome,
    pub text: String,
    pub entry: HistoryEntry,
}

/// Loaded configuration, stores and clients. Built once per process and
/// torn down with [`AppContext::shutdown`].
pub struct AppContext {
    config: Config,
    database: Database,
    manifest: BuildManifest,
    search: HybridSearch,
    composer: RecommendationComposer,
    history: HistoryStore,
}

impl AppContext {
    /// Validate `config`, then open every store and client it names.
    ///
    /// A missing API key or a missing or inconsistent index fails here,
    /// before any query is served.
    #[inline]
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().map_err(DealError::from)?;

        let chat = ChatClient::from_config(&config.llm)?;
        let embedder =
            OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;

        let database = Database::new(config.database_path())
            .await
            .context("Failed to open the catalog database")?;

        Self::from_parts(config, database, Arc::new(embedder), Arc::new(chat)).await
    }

    /// Assemble a context from already-built collaborators. The index is
    /// loaded from the configured artifacts directory and must have been
    /// built with `embedder`'s model.
    #[inline]
    pub async fn from_parts(
        config: Config,
        database: Database,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let index = LoadedIndex::load(&config.artifacts_dir(), embedder.model())
            .await
            .context("Failed to load the search index")?;
        let manifest = index.manifest().clone();

        let search = HybridSearch::new(
            IntentExtractor::new(Arc::clone(&chat)),
            embedder,
            Arc::new(index),
            config.search.top_k,
        );
        let composer = RecommendationComposer::new(chat, config.llm.temperature);
        let history = HistoryStore::new(database.clone());

        info!(
            "Ready: index build {} with {} laptops",
            manifest.build_id, manifest.record_count
        );

        Ok(Self {
            config,
            database,
            manifest,
            search,
            composer,
            history,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    #[inline]
    pub fn search(&self) -> &HybridSearch {
        &self.search
    }

    #[inline]
    pub fn composer(&self) -> &RecommendationComposer {
        &self.composer
    }

    #[inline]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Search, hand the cheapest few matches to the composer and record the
    /// exchange in `user_id`'s history
    #[inline]
    pub async fn recommend(&self, user_id: &str, query: &str) -> Result<Recommendation> {
        let outcome = self.search.search(query).await.context("Search failed")?;

        let shortlist: Vec<_> = outcome
            .matches()
            .iter()
            .take(self.config.search.recommendation_candidates)
            .cloned()
            .collect();
        debug!("Recommending from {} of {} matches", shortlist.len(), outcome.matches().len());

        let text = self.composer.compose(query, &shortlist);
        let entry = self
            .history
            .append(user_id, query, Some(&text))
            .await
            .context("Failed to record history")?;

        Ok(Recommendation {
            outcome,
            text,
            entry,
        })
    }

    /// Close the database pool
    #[inline]
    pub async fn shutdown(self) {
        debug!("Shutting down application context");
        self.database.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::sample_catalog;
    use crate::embeddings::fakes::HashEmbedder;
    use crate::indexer::IndexBuilder;
    use crate::llm::fakes::ScriptedChat;
    use crate::recommend::NO_CANDIDATES_MESSAGE;
    use serial_test::serial;
    use tempfile::TempDir;

    async fn built_config(temp_dir: &TempDir) -> (Config, Database) {
        let config = Config {
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let database = Database::new(config.database_path())
            .await
            .expect("database should open");
        database
            .replace_catalog(&sample_catalog())
            .await
            .expect("catalog should be stored");
        IndexBuilder::from_config(&config, database.clone(), Arc::new(HashEmbedder::new(8)))
            .build()
            .await
            .expect("build should succeed");
        (config, database)
    }

    #[tokio::test]
    async fn recommend_records_history() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let (config, database) = built_config(&temp_dir).await;
        let chat = Arc::new(ScriptedChat::replying("Buy the cheapest one."));
        let context = AppContext::from_parts(
            config,
            database,
            Arc::new(HashEmbedder::new(8)),
            chat.clone(),
        )
        .await
        .expect("context should initialize");

        let recommendation = context
            .recommend("alice", "a laptop")
            .await
            .expect("recommend should succeed");

        // One intent call plus one recommendation call
        assert_eq!(chat.calls(), 2);
        assert_eq!(recommendation.entry.user_id, "alice");
        assert_eq!(recommendation.entry.recommendation.as_deref(), Some(recommendation.text.as_str()));

        let history = context.history().list("alice").await.expect("list should succeed");
        assert_eq!(history.len(), 1);
        context.shutdown().await;
    }

    #[tokio::test]
    async fn no_matches_still_answers_and_records() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let (config, database) = built_config(&temp_dir).await;
        let chat = Arc::new(ScriptedChat::replying(
            r#"{"important_attributes": {"brand": "Alienware"}}"#,
        ));
        let context = AppContext::from_parts(config, database, Arc::new(HashEmbedder::new(8)), chat)
            .await
            .expect("context should initialize");

        let recommendation = context
            .recommend("bob", "alienware")
            .await
            .expect("recommend should succeed");

        assert_eq!(recommendation.outcome, SearchOutcome::NoMatches);
        assert_eq!(recommendation.text, NO_CANDIDATES_MESSAGE);
    }

    #[tokio::test]
    async fn index_from_another_model_is_fatal() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let (config, database) = built_config(&temp_dir).await;

        struct OtherModel(HashEmbedder);
        impl Embedder for OtherModel {
            fn model(&self) -> &str {
                "other-model"
            }
            fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                self.0.embed_batch(texts)
            }
        }

        let result = AppContext::from_parts(
            config,
            database,
            Arc::new(OtherModel(HashEmbedder::new(8))),
            Arc::new(ScriptedChat::replying("{}")),
        )
        .await;
        let err = result.err().expect("context should fail");
        assert!(format!("{err:#}").contains("other-model"));
    }

    #[tokio::test]
    #[serial]
    async fn missing_api_key_is_fatal() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = Config {
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        config.llm.api_key_env = "DEALWIZARD_TEST_CONTEXT_KEY".to_string();
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::remove_var("DEALWIZARD_TEST_CONTEXT_KEY") };

        let err = AppContext::initialize(config).await.err().expect("should fail");
        assert!(err.to_string().contains("DEALWIZARD_TEST_CONTEXT_KEY"));
        assert!(matches!(err.downcast_ref::<DealError>(), Some(DealError::Config(_))));
    }

    #[tokio::test]
    async fn invalid_config_is_fatal() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = Config {
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        config.search.top_k = 0;

        let err = AppContext::initialize(config).await.err().expect("should fail");
        assert!(matches!(err.downcast_ref::<DealError>(), Some(DealError::Config(_))));
    }

    #[tokio::test]
    #[serial]
    async fn missing_index_is_fatal() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = Config {
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        config.llm.api_key_env = "DEALWIZARD_TEST_CONTEXT_KEY".to_string();
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::set_var("DEALWIZARD_TEST_CONTEXT_KEY", "secret") };

        let result = AppContext::initialize(config).await;
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::remove_var("DEALWIZARD_TEST_CONTEXT_KEY") };

        let err = result.err().expect("should fail");
        assert!(format!("{err:#}").contains("build-index"));
    }
}
