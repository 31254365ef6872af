use super::*;
use crate::catalog::fixtures::sample_catalog;
use crate::database::lancedb::VectorRecord;
use crate::database::sqlite::Database;
use crate::embeddings::fakes::HashEmbedder;
use crate::indexer::IndexBuilder;
use std::sync::Arc;
use tempfile::TempDir;

/// Builds a real artifact set and returns its directory
async fn built_artifacts(temp_dir: &TempDir) -> PathBuf {
    let database = Database::new(temp_dir.path().join("catalog.db"))
        .await
        .expect("database should open");
    database
        .replace_catalog(&sample_catalog())
        .await
        .expect("catalog should be stored");

    let artifacts_dir = temp_dir.path().join("artifacts");
    IndexBuilder::new(
        database,
        Arc::new(HashEmbedder::new(8)),
        artifacts_dir.clone(),
        temp_dir.path().join(".build.lock"),
    )
    .build()
    .await
    .expect("build should succeed");

    artifacts_dir
}

#[tokio::test]
async fn row_map_from_another_build_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = built_artifacts(&temp_dir).await;

    let mut row_map: RowMap = read_json(&dir, ROW_MAP_FILE).expect("row map should read");
    row_map.build_id = Uuid::new_v4();
    write_json(&dir, ROW_MAP_FILE, &row_map).expect("row map should write");

    let err = LoadedIndex::load(&dir, "hash-test")
        .await
        .expect_err("load should fail");
    assert!(
        matches!(err, ArtifactError::BuildIdMismatch { artifact: "Row map", .. }),
        "{err}"
    );
}

#[tokio::test]
async fn snapshot_with_a_missing_row_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = built_artifacts(&temp_dir).await;

    let mut snapshot: CatalogSnapshot = read_json(&dir, CATALOG_FILE).expect("snapshot should read");
    snapshot.records.pop();
    write_json(&dir, CATALOG_FILE, &snapshot).expect("snapshot should write");

    let err = LoadedIndex::load(&dir, "hash-test")
        .await
        .expect_err("load should fail");
    assert!(
        matches!(
            err,
            ArtifactError::CountMismatch {
                artifact: "Catalog snapshot",
                ..
            }
        ),
        "{err}"
    );
}

#[tokio::test]
async fn row_id_outside_the_snapshot_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = built_artifacts(&temp_dir).await;

    let mut row_map: RowMap = read_json(&dir, ROW_MAP_FILE).expect("row map should read");
    row_map.row_ids[0] = 9_999;
    write_json(&dir, ROW_MAP_FILE, &row_map).expect("row map should write");

    let err = LoadedIndex::load(&dir, "hash-test")
        .await
        .expect_err("load should fail");
    assert!(matches!(err, ArtifactError::UnknownRow(9_999)), "{err}");
}

#[tokio::test]
async fn reordered_row_map_disagrees_with_vectors() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = built_artifacts(&temp_dir).await;

    let mut row_map: RowMap = read_json(&dir, ROW_MAP_FILE).expect("row map should read");
    row_map.row_ids.swap(0, 1);
    write_json(&dir, ROW_MAP_FILE, &row_map).expect("row map should write");

    let err = LoadedIndex::load(&dir, "hash-test")
        .await
        .expect_err("load should fail");
    assert!(matches!(err, ArtifactError::PositionMismatch(0)), "{err}");
}

#[tokio::test]
async fn different_embedding_model_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = built_artifacts(&temp_dir).await;

    let err = LoadedIndex::load(&dir, "all-minilm")
        .await
        .expect_err("load should fail");
    assert!(matches!(err, ArtifactError::ModelMismatch { .. }), "{err}");
    assert!(err.to_string().contains("all-minilm"));
}

#[tokio::test]
async fn missing_artifacts_are_reported() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let err = LoadedIndex::load(&temp_dir.path().join("artifacts"), "hash-test")
        .await
        .expect_err("load should fail");
    assert!(matches!(err, ArtifactError::Missing(_)), "{err}");
    assert!(err.to_string().contains("build-index"));

    let dir = built_artifacts(&temp_dir).await;
    std::fs::remove_dir_all(dir.join(VECTORS_DIR)).expect("should remove vectors");
    let err = LoadedIndex::load(&dir, "hash-test")
        .await
        .expect_err("load should fail");
    assert!(matches!(err, ArtifactError::Missing(path) if path.ends_with(VECTORS_DIR)));
}

#[tokio::test]
async fn positions_resolve_to_catalog_records() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = built_artifacts(&temp_dir).await;

    let index = LoadedIndex::load(&dir, "hash-test")
        .await
        .expect("artifacts should load");
    let catalog = sample_catalog();

    let id_at = |position: u32| index.record_at(position).map(|r| r.id);

    assert_eq!(id_at(0), Some(catalog[0].id));
    let last = u32::try_from(catalog.len() - 1).expect("small catalog");
    assert_eq!(id_at(last), catalog.last().map(|r| r.id));
    assert_eq!(id_at(last + 1), None);

    let none = index
        .nearest(&[0.0; 8], 0)
        .await
        .expect("k = 0 should succeed");
    assert!(none.is_empty());
}

#[tokio::test]
async fn vectors_from_another_build_are_never_resolved() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = built_artifacts(&temp_dir).await;
    let mut index = LoadedIndex::load(&dir, "hash-test")
        .await
        .expect("artifacts should load");

    // A table whose positions hold the catalog in reverse order
    let catalog = sample_catalog();
    let other_dir = temp_dir.path().join("other-vectors");
    let mut other = VectorStore::open(&other_dir)
        .await
        .expect("should open vector store");
    other.create_table(8).await.expect("should create table");
    let reversed: Vec<VectorRecord> = catalog
        .iter()
        .rev()
        .enumerate()
        .map(|(position, record)| VectorRecord {
            position: u32::try_from(position).expect("small catalog"),
            row_id: record.id,
            vector: vec![0.0; 8],
        })
        .collect();
    other.store_batch(&reversed).await.expect("should store vectors");
    index.store = other;

    let err = index
        .nearest(&[0.0; 8], 3)
        .await
        .expect_err("mismatched vectors should not resolve");
    assert!(err.to_string().contains("changed since it was loaded"), "{err}");
}

#[test]
fn manifest_round_trips_through_json() {
    let manifest = BuildManifest::new("all-minilm", 384, 1303);
    let text = serde_json::to_string(&manifest).expect("manifest should serialize");
    let back: BuildManifest = serde_json::from_str(&text).expect("manifest should deserialize");
    assert_eq!(back, manifest);
}
