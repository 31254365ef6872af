// Persisted index artifacts
// Manifest, catalog snapshot and row map written next to the vector table

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::DealError;
use crate::catalog::LaptopRecord;
use crate::database::lancedb::vector_store::VectorStore;
use crate::search::NearestNeighbors;

pub const VECTORS_DIR: &str = "vectors";
pub const CATALOG_FILE: &str = "catalog.json";
pub const ROW_MAP_FILE: &str = "row_map.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Describes one complete artifact set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    /// Embedding model the vectors came from
    pub model: String,
    pub dimension: usize,
    pub record_count: usize,
}

impl BuildManifest {
    #[inline]
    pub fn new(model: &str, dimension: usize, record_count: usize) -> Self {
        Self {
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            model: model.to_string(),
            dimension,
            record_count,
        }
    }
}

/// The records that were embedded, as they were at build time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub build_id: Uuid,
    pub records: Vec<LaptopRecord>,
}

/// Vector position to catalog row id; index `i` holds the row id at position `i`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMap {
    pub build_id: Uuid,
    pub row_ids: Vec<i64>,
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Index artifact missing: {0} (run `dealwizard build-index`)")]
    Missing(PathBuf),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{artifact} belongs to build {found}, manifest is build {expected}")]
    BuildIdMismatch {
        artifact: &'static str,
        expected: Uuid,
        found: Uuid,
    },

    #[error("{artifact} holds {found} entries, manifest expects {expected}")]
    CountMismatch {
        artifact: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Index was built with embedding model {built}, configured model is {configured}")]
    ModelMismatch { built: String, configured: String },

    #[error("Vectors have dimension {found}, manifest expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Row map references row {0}, which is not in the catalog snapshot")]
    UnknownRow(i64),

    #[error("Vector table disagrees with the row map at position {0}")]
    PositionMismatch(u32),

    #[error("Vector store error: {0}")]
    Vectors(#[from] DealError),
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<(), ArtifactError> {
    let path = dir.join(name);
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, bytes).map_err(|source| ArtifactError::Io { path, source })
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, ArtifactError> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(ArtifactError::Missing(path));
    }
    let bytes = std::fs::read(&path).map_err(|source| ArtifactError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json { path, source })
}

/// Write the JSON side of an artifact set. The vector table lives in
/// [`VECTORS_DIR`] and is written separately.
#[inline]
pub fn write_metadata(
    dir: &Path,
    manifest: &BuildManifest,
    snapshot: &CatalogSnapshot,
    row_map: &RowMap,
) -> Result<(), ArtifactError> {
    write_json(dir, CATALOG_FILE, snapshot)?;
    write_json(dir, ROW_MAP_FILE, row_map)?;
    // Manifest last: a directory without one is never a usable set
    write_json(dir, MANIFEST_FILE, manifest)
}

#[inline]
pub fn read_manifest(dir: &Path) -> Result<BuildManifest, ArtifactError> {
    read_json(dir, MANIFEST_FILE)
}

/// A verified artifact set, read-only for the life of the process
pub struct LoadedIndex {
    manifest: BuildManifest,
    row_ids: Vec<i64>,
    records: HashMap<i64, LaptopRecord>,
    store: VectorStore,
}

impl std::fmt::Debug for LoadedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedIndex")
            .field("manifest", &self.manifest)
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl LoadedIndex {
    /// Load the artifact set in `dir` and check that its parts belong
    /// together and match the configured embedding model
    #[inline]
    pub async fn load(dir: &Path, expected_model: &str) -> Result<Self, ArtifactError> {
        debug!("Loading index artifacts from {:?}", dir);

        let manifest = read_manifest(dir)?;
        if manifest.model != expected_model {
            return Err(ArtifactError::ModelMismatch {
                built: manifest.model,
                configured: expected_model.to_string(),
            });
        }

        let snapshot: CatalogSnapshot = read_json(dir, CATALOG_FILE)?;
        let row_map: RowMap = read_json(dir, ROW_MAP_FILE)?;

        check_build_id("Catalog snapshot", manifest.build_id, snapshot.build_id)?;
        check_build_id("Row map", manifest.build_id, row_map.build_id)?;
        check_count("Catalog snapshot", manifest.record_count, snapshot.records.len())?;
        check_count("Row map", manifest.record_count, row_map.row_ids.len())?;

        let records: HashMap<i64, LaptopRecord> = snapshot
            .records
            .into_iter()
            .map(|record| (record.id, record))
            .collect();
        if let Some(&missing) = row_map.row_ids.iter().find(|id| !records.contains_key(id)) {
            return Err(ArtifactError::UnknownRow(missing));
        }
        let distinct: HashSet<i64> = row_map.row_ids.iter().copied().collect();
        check_count("Row map (distinct ids)", manifest.record_count, distinct.len())?;

        let vectors_dir = dir.join(VECTORS_DIR);
        if !vectors_dir.is_dir() {
            return Err(ArtifactError::Missing(vectors_dir));
        }
        let store = VectorStore::open(&vectors_dir).await?;

        let stored = usize::try_from(store.count().await?).unwrap_or(usize::MAX);
        check_count("Vector table", manifest.record_count, stored)?;
        if let Some(found) = store.dimension().filter(|&d| d != manifest.dimension) {
            return Err(ArtifactError::DimensionMismatch {
                expected: manifest.dimension,
                found,
            });
        }

        for (expected_position, (position, row_id)) in store.list_row_ids().await?.into_iter().enumerate() {
            let agrees = usize::try_from(position).ok() == Some(expected_position)
                && row_map.row_ids.get(expected_position) == Some(&row_id);
            if !agrees {
                return Err(ArtifactError::PositionMismatch(position));
            }
        }

        info!(
            "Loaded index build {} ({} laptops, {} dimensions)",
            manifest.build_id, manifest.record_count, manifest.dimension
        );

        Ok(Self {
            manifest,
            row_ids: row_map.row_ids,
            records,
            store,
        })
    }

    #[inline]
    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Catalog record stored at vector `position`
    #[inline]
    pub fn record_at(&self, position: u32) -> Option<&LaptopRecord> {
        let index = usize::try_from(position).ok()?;
        self.row_ids.get(index).and_then(|id| self.records.get(id))
    }
}

fn check_build_id(artifact: &'static str, expected: Uuid, found: Uuid) -> Result<(), ArtifactError> {
    if expected == found {
        Ok(())
    } else {
        Err(ArtifactError::BuildIdMismatch {
            artifact,
            expected,
            found,
        })
    }
}

fn check_count(artifact: &'static str, expected: usize, found: usize) -> Result<(), ArtifactError> {
    if expected == found {
        Ok(())
    } else {
        Err(ArtifactError::CountMismatch {
            artifact,
            expected,
            found,
        })
    }
}

#[async_trait]
impl NearestNeighbors for LoadedIndex {
    async fn nearest(&self, query_vector: &[f32], k: usize) -> crate::Result<Vec<LaptopRecord>> {
        let neighbors = self.store.search_nearest(query_vector, k).await?;

        neighbors
            .into_iter()
            .map(|neighbor| {
                let record = self.record_at(neighbor.position).ok_or_else(|| {
                    DealError::Index(format!(
                        "No catalog record for vector position {}",
                        neighbor.position
                    ))
                })?;
                // The table must still be the one the row map was checked against
                if record.id != neighbor.row_id {
                    return Err(DealError::Index(format!(
                        "Vector position {} holds row {}, build {} expects row {}; \
                         the index changed since it was loaded",
                        neighbor.position, neighbor.row_id, self.manifest.build_id, record.id
                    )));
                }
                Ok(record.clone())
            })
            .collect()
    }
}
