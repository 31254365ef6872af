use super::*;
use crate::catalog::StorageType;
use crate::catalog::fixtures::{laptop, sample_catalog, sample_record};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true)
                .foreign_keys(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::migrate!("src/database/sqlite/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

#[tokio::test]
async fn catalog_round_trip_preserves_records() {
    let (_temp_dir, pool) = create_test_pool().await;
    let records = sample_catalog();

    let inserted = LaptopQueries::replace_all(&pool, &records)
        .await
        .expect("Failed to replace catalog");
    assert_eq!(inserted, 12);

    let stored = LaptopQueries::list_all(&pool)
        .await
        .expect("Failed to list laptops");
    assert_eq!(stored, records);
}

#[tokio::test]
async fn replace_all_drops_previous_rows() {
    let (_temp_dir, pool) = create_test_pool().await;

    LaptopQueries::replace_all(&pool, &sample_catalog())
        .await
        .expect("first ingest");

    let replacement = vec![
        laptop(1, "Asus", "ZenBook", 8, "Intel UHD", 799.0, 1.1),
        laptop(2, "Acer", "Nitro 5", 16, "GeForce GTX 1650", 899.0, 2.3),
    ];
    LaptopQueries::replace_all(&pool, &replacement)
        .await
        .expect("second ingest");

    assert_eq!(LaptopQueries::count(&pool).await.expect("count"), 2);
    let stored = LaptopQueries::list_all(&pool).await.expect("list");
    assert_eq!(stored, replacement);
}

#[tokio::test]
async fn failed_replace_keeps_old_catalog() {
    let (_temp_dir, pool) = create_test_pool().await;
    let original = sample_catalog();
    LaptopQueries::replace_all(&pool, &original)
        .await
        .expect("first ingest");

    // Duplicate primary keys abort the transaction halfway through
    let broken = vec![sample_record(1), sample_record(1)];
    assert!(LaptopQueries::replace_all(&pool, &broken).await.is_err());

    let stored = LaptopQueries::list_all(&pool).await.expect("list");
    assert_eq!(stored, original);
}

#[tokio::test]
async fn list_all_decodes_optional_columns() {
    let (_temp_dir, pool) = create_test_pool().await;
    let mut record = sample_record(7);
    record.inches = None;
    record.cpu_freq = None;
    record.secondary_storage = 1000;
    record.secondary_storage_type = StorageType::Hybrid;

    LaptopQueries::replace_all(&pool, std::slice::from_ref(&record))
        .await
        .expect("insert");

    let fetched = LaptopQueries::list_all(&pool)
        .await
        .expect("query should succeed");
    assert_eq!(fetched, vec![record]);
}

#[tokio::test]
async fn history_append_assigns_timestamp() {
    let (_temp_dir, pool) = create_test_pool().await;

    let entry = HistoryQueries::append(
        &pool,
        NewHistoryEntry {
            user_id: "user123".to_string(),
            query: "Best gaming laptop".to_string(),
            recommendation: Some("Try Acer Nitro 5".to_string()),
        },
    )
    .await
    .expect("append should succeed");

    assert!(entry.id > 0);
    assert!(entry.recorded_at().is_some());
    assert_eq!(HistoryQueries::count(&pool).await.expect("count"), 1);
}

#[tokio::test]
async fn history_is_scoped_per_user_and_newest_first() {
    let (_temp_dir, pool) = create_test_pool().await;

    for (user, query) in [
        ("alice", "first"),
        ("bob", "other user"),
        ("alice", "second"),
        ("alice", "third"),
    ] {
        HistoryQueries::append(
            &pool,
            NewHistoryEntry {
                user_id: user.to_string(),
                query: query.to_string(),
                recommendation: None,
            },
        )
        .await
        .expect("append should succeed");
    }

    let alice = HistoryQueries::list_for_user(&pool, "alice")
        .await
        .expect("list should succeed");
    let queries: Vec<&str> = alice.iter().map(|e| e.query.as_str()).collect();
    assert_eq!(queries, vec!["third", "second", "first"]);
    assert!(alice.iter().all(|e| e.user_id == "alice"));

    let nobody = HistoryQueries::list_for_user(&pool, "carol")
        .await
        .expect("list should succeed");
    assert!(nobody.is_empty());
}
