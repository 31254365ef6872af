use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::read_catalog_csv;
use crate::DealError;
use crate::config::Config;
use crate::context::{AppContext, Recommendation};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::HistoryEntry;
use crate::embeddings::OllamaClient;
use crate::history::HistoryStore;
use crate::indexer::{BuildSummary, IndexBuilder, LoadedIndex, read_manifest};
use crate::search::SearchReport;

/// Replace the catalog with the rows of `csv_path`
#[inline]
pub async fn ingest_catalog(config: &Config, csv_path: &Path) -> Result<u64> {
    let records = read_catalog_csv(csv_path)
        .map_err(DealError::from)
        .with_context(|| format!("Failed to read catalog {}", csv_path.display()))?;

    let database = Database::new(config.database_path())
        .await
        .context("Failed to initialize database")?;
    let stored = database
        .replace_catalog(&records)
        .await
        .context("Failed to store catalog")?;
    database.close().await;

    info!("Catalog replaced with {} laptops", stored);
    println!("Stored {} laptops from {}", stored, csv_path.display());
    println!("Run 'dealwizard build-index' to make them searchable.");
    Ok(stored)
}

/// Embed the catalog with the configured Ollama model and swap in a new index
#[inline]
pub async fn build_index(config: &Config) -> Result<BuildSummary> {
    config.validate().context("Invalid configuration")?;

    let database = Database::new(config.database_path())
        .await
        .context("Failed to initialize database")?;
    let embedder = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;

    let result = IndexBuilder::from_config(config, database.clone(), Arc::new(embedder))
        .build()
        .await;
    database.close().await;
    let summary = result.context("Index build failed")?;

    println!(
        "Indexed {} laptops with {} ({} dimensions)",
        summary.manifest.record_count, summary.manifest.model, summary.manifest.dimension
    );
    if summary.skipped > 0 {
        println!("Skipped {} laptops without a usable description", summary.skipped);
    }
    println!("Build: {}", summary.manifest.build_id);
    Ok(summary)
}

/// Hybrid search; `k` overrides the configured candidate window
#[inline]
pub async fn search_laptops(config: Config, query: &str, k: Option<usize>) -> Result<SearchReport> {
    let context = AppContext::initialize(config).await?;
    let k = k.unwrap_or_else(|| context.search().top_k());

    let result = context.search().search_with_k(query, k).await;
    context.shutdown().await;
    let report = result?;

    if report.intent.is_fallback() {
        println!(
            "{}",
            style("(Could not interpret the query's attributes; showing unfiltered results)").dim()
        );
    }
    println!("{}", report.outcome);
    Ok(report)
}

/// Search, then ask the chat model for a recommendation and record it
#[inline]
pub async fn recommend_laptop(
    config: Config,
    query: &str,
    user_id: Option<&str>,
) -> Result<Recommendation> {
    let user_id = user_id.unwrap_or(&config.search.default_user).to_string();
    let context = AppContext::initialize(config).await?;

    let result = context.recommend(&user_id, query).await;
    context.shutdown().await;
    let recommendation = result?;

    println!("{}", recommendation.outcome);
    println!();
    println!("{}", style("Recommendation:").bold());
    println!("{}", recommendation.text);
    Ok(recommendation)
}

/// Print `user_id`'s past queries, most recent first
#[inline]
pub async fn show_history(config: &Config, user_id: Option<&str>) -> Result<Vec<HistoryEntry>> {
    let user_id = user_id.unwrap_or(&config.search.default_user);

    let database = Database::new(config.database_path())
        .await
        .context("Failed to initialize database")?;
    let store = HistoryStore::new(database.clone());
    let result = store.list(user_id).await;
    database.close().await;
    let entries = result.context("Failed to read history")?;

    if entries.is_empty() {
        println!("No history for user {}.", user_id);
        return Ok(entries);
    }

    println!("History for {} ({} entries):", user_id, entries.len());
    for entry in &entries {
        println!();
        println!("{} {}", style(history_time(entry)).dim(), entry.query);
        match entry.recommendation.as_deref() {
            Some(text) if entry.has_recommendation() => {
                for line in text.lines() {
                    println!("    {}", line);
                }
            }
            _ => println!("    {}", style("(no recommendation)").dim()),
        }
    }

    Ok(entries)
}

/// Minute-precision UTC time of an entry, or the raw value if it does not parse
fn history_time(entry: &HistoryEntry) -> String {
    entry
        .recorded_at()
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| entry.timestamp.clone())
}

/// Report on the catalog, index, model services and build lock
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("DealWizard Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("Catalog:");
    match Database::new(config.database_path()).await {
        Ok(database) => {
            match database.count_laptops().await {
                Ok(count) => println!("   ✅ SQLite: {} laptops", count),
                Err(e) => println!("   ⚠️  SQLite: connected, count failed - {}", e),
            }
            match database.count_history().await {
                Ok(count) => println!("   📜 History entries: {}", count),
                Err(e) => println!("   ⚠️  History: {}", e),
            }
            database.close().await;
        }
        Err(e) => println!("   ❌ SQLite: Failed to open - {:#}", e),
    }

    println!();
    println!("Index:");
    let artifacts_dir = config.artifacts_dir();
    match read_manifest(&artifacts_dir) {
        Ok(manifest) => {
            println!("   🔖 Build: {}", manifest.build_id);
            println!(
                "   🕒 Built: {}",
                manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!(
                "   🔢 Laptops: {} ({} dimensions, model {})",
                manifest.record_count, manifest.dimension, manifest.model
            );
            match LoadedIndex::load(&artifacts_dir, &config.ollama.model).await {
                Ok(_) => println!("   ✅ Artifacts consistent"),
                Err(e) => println!("   ❌ Artifacts unusable - {}", e),
            }
        }
        Err(e) => println!("   ❌ {}", e),
    }
    if config.build_lock_path().exists() {
        println!(
            "   🔒 Build lock present: {} (delete it if no build is running)",
            config.build_lock_path().display()
        );
    }

    println!();
    println!("Ollama:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => println!(
                "   ✅ Connected ({}:{}), model {}",
                config.ollama.host, config.ollama.port, config.ollama.model
            ),
            Err(e) => {
                warn!("Ollama health check failed: {:#}", e);
                println!("   ⚠️  Unhealthy - {:#}", e);
            }
        },
        Err(e) => println!("   ❌ Invalid settings - {:#}", e),
    }

    println!();
    println!("Language model:");
    println!("   🌐 {} ({})", config.llm.base_url, config.llm.model);
    match config.llm.api_key() {
        Ok(_) => println!("   ✅ API key found in {}", config.llm.api_key_env),
        Err(e) => println!("   ❌ {}", e),
    }

    Ok(())
}
