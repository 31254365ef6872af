// Indexer module
// Offline build of the embedding index: catalog -> text -> vectors -> artifact set

pub mod artifacts;


use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::DealError;
use crate::catalog::LaptopRecord;
use crate::config::Config;
use crate::database::lancedb::VectorRecord;
use crate::database::lancedb::vector_store::VectorStore;
use crate::database::sqlite::Database;
use crate::embeddings::{Embedder, describe_laptop};

pub use artifacts::{
    ArtifactError, BuildManifest, CatalogSnapshot, LoadedIndex, RowMap, read_manifest,
};

/// Vectors per LanceDB append
const STORE_BATCH: usize = 256;

/// What a finished build produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub manifest: BuildManifest,
    /// Catalog rows left out because no description could be built
    pub skipped: usize,
}

/// Exclusive hold on the build lock file, released on drop.
///
/// A lock left behind by a crashed build must be deleted by hand.
#[derive(Debug)]
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DealError::Index(format!(
                    "Another index build is already running (remove {} if it is stale)",
                    path.display()
                ))
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create lock file {}", path.display()));
            }
        };
        // Informational only
        let _ = writeln!(file, "{}", std::process::id());

        debug!("Acquired build lock {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove build lock {:?}: {}", self.path, e);
        }
    }
}

/// Builds the artifact set from the catalog store
pub struct IndexBuilder {
    database: Database,
    embedder: Arc<dyn Embedder>,
    artifacts_dir: PathBuf,
    lock_path: PathBuf,
}

impl IndexBuilder {
    #[inline]
    pub fn new(
        database: Database,
        embedder: Arc<dyn Embedder>,
        artifacts_dir: PathBuf,
        lock_path: PathBuf,
    ) -> Self {
        Self {
            database,
            embedder,
            artifacts_dir,
            lock_path,
        }
    }

    /// Builder using the data directory layout from `config`
    #[inline]
    pub fn from_config(config: &Config, database: Database, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            database,
            embedder,
            config.artifacts_dir(),
            config.build_lock_path(),
        )
    }

    #[inline]
    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Rebuild the whole index. The live artifact set is only replaced once
    /// the new one is completely written.
    #[inline]
    pub async fn build(&self) -> Result<BuildSummary> {
        let _lock = BuildLock::acquire(&self.lock_path)?;

        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            )
        } else {
            ProgressBar::hidden()
        };

        let result = self.build_locked(&bar).await;
        bar.finish_and_clear();
        result
    }

    async fn build_locked(&self, bar: &ProgressBar) -> Result<BuildSummary> {
        let records = self
            .database
            .list_laptops()
            .await
            .context("Failed to read the catalog")?;
        if records.is_empty() {
            bail!(DealError::Index(
                "The catalog is empty; run `dealwizard ingest <csv>` first".to_string()
            ));
        }
        info!("Building index for {} catalog rows", records.len());

        let total = records.len();
        bar.set_length(total as u64);
        bar.set_message("Describing laptops");
        let (described, texts) = describe_all(records, bar);
        let skipped = total - described.len();
        if described.is_empty() {
            bail!(DealError::Index(
                "No catalog row could be described for embedding".to_string()
            ));
        }

        bar.set_message(format!("Embedding with {}", self.embedder.model()));
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .context("Failed to embed laptop descriptions")?;
        if vectors.len() != texts.len() {
            bail!(DealError::Embedding(format!(
                "Embedding count mismatch: sent {} texts, got {} vectors",
                texts.len(),
                vectors.len()
            )));
        }
        let dimension = vectors
            .first()
            .map(Vec::len)
            .filter(|&d| d > 0)
            .ok_or_else(|| anyhow!("Embedding model returned empty vectors"))?;

        let manifest = BuildManifest::new(self.embedder.model(), dimension, described.len());
        let staging = self.sibling_dir("staging", manifest.build_id)?;

        bar.set_message("Writing artifacts");
        if let Err(e) = write_artifact_set(&staging, &manifest, described, vectors).await {
            error!("Index build {} failed: {:#}", manifest.build_id, e);
            remove_dir_quietly(&staging);
            return Err(e);
        }

        if let Err(e) = self.swap_in(&staging, manifest.build_id) {
            remove_dir_quietly(&staging);
            return Err(e);
        }

        info!(
            "Index build {} complete: {} laptops indexed, {} skipped",
            manifest.build_id, manifest.record_count, skipped
        );
        Ok(BuildSummary { manifest, skipped })
    }

    fn sibling_dir(&self, label: &str, build_id: Uuid) -> Result<PathBuf> {
        let name = self
            .artifacts_dir
            .file_name()
            .ok_or_else(|| anyhow!("Invalid artifacts directory {:?}", self.artifacts_dir))?
            .to_string_lossy();
        Ok(self
            .artifacts_dir
            .with_file_name(format!("{name}.{label}-{build_id}")))
    }

    /// Replace the live set with `staging`, keeping the old set until the
    /// new one is in place
    fn swap_in(&self, staging: &Path, build_id: Uuid) -> Result<()> {
        let retired = if self.artifacts_dir.exists() {
            let retired = self.sibling_dir("old", build_id)?;
            std::fs::rename(&self.artifacts_dir, &retired).with_context(|| {
                format!("Failed to move aside {}", self.artifacts_dir.display())
            })?;
            Some(retired)
        } else {
            None
        };

        if let Err(e) = std::fs::rename(staging, &self.artifacts_dir) {
            if let Some(retired) = &retired {
                if let Err(restore) = std::fs::rename(retired, &self.artifacts_dir) {
                    error!("Failed to restore previous artifacts from {:?}: {}", retired, restore);
                }
            }
            return Err(e).context("Failed to move the new artifacts into place");
        }

        if let Some(retired) = retired {
            remove_dir_quietly(&retired);
        }
        Ok(())
    }
}

/// Descriptions for every record that has one, ticking `bar` per record
fn describe_all(records: Vec<LaptopRecord>, bar: &ProgressBar) -> (Vec<LaptopRecord>, Vec<String>) {
    let mut described = Vec::with_capacity(records.len());
    let mut texts = Vec::with_capacity(records.len());

    for record in records {
        match describe_laptop(&record) {
            Ok(text) => {
                texts.push(text);
                described.push(record);
            }
            Err(e) => warn!("Skipping laptop {}: {:#}", record.id, e),
        }
        bar.inc(1);
    }

    (described, texts)
}

async fn write_artifact_set(
    dir: &Path,
    manifest: &BuildManifest,
    records: Vec<LaptopRecord>,
    vectors: Vec<Vec<f32>>,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create staging directory {}", dir.display()))?;

    let vector_records = records
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(position, (record, vector))| {
            Ok(VectorRecord {
                position: u32::try_from(position).context("Too many catalog rows")?,
                row_id: record.id,
                vector,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    {
        let mut store = VectorStore::open(&dir.join(artifacts::VECTORS_DIR)).await?;
        store.create_table(manifest.dimension).await?;
        for batch in vector_records.chunks(STORE_BATCH) {
            store.store_batch(batch).await?;
        }
        debug!("Stored {} vectors in {:?}", vector_records.len(), store.path());
    }

    let row_map = RowMap {
        build_id: manifest.build_id,
        row_ids: records.iter().map(|r| r.id).collect(),
    };
    let snapshot = CatalogSnapshot {
        build_id: manifest.build_id,
        records,
    };
    artifacts::write_metadata(dir, manifest, &snapshot, &row_map)?;
    Ok(())
}

fn remove_dir_quietly(dir: &Path) {
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            warn!("Failed to remove {:?}: {}", dir, e);
        }
    }
}
