//! Database initialization on first run and on reopen

use kkd_common::db::{init_database, SCHEMA_VERSION};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("kkodurami.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kkodurami.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO settings (key, value) VALUES ('marker', 'kept')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let marker: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'marker'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(marker, "kept");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("kkodurami.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "comments",
        "damage_reports",
        "post_likes",
        "posts",
        "schema_version",
        "settings",
        "users",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_duplicate_like_rejected_by_schema() {
    let pool = kkd_common::db::init_in_memory().await.unwrap();

    sqlx::query(
        "INSERT INTO users (guid, username, email, password_hash, phone_num, local_id, created_at)
         VALUES ('u1', 'farmer', 'f@example.com', 'x', '010', 1, '2024-01-01T00:00:00.000000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO posts (guid, user_id, username, title, content, local_id, created_at)
         VALUES ('p1', 'u1', 'farmer', 't', 'c', 1, '2024-01-01T00:00:00.000000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let insert = "INSERT INTO post_likes (guid, post_id, user_id, liked_at) VALUES (?, 'p1', 'u1', 'now')";
    sqlx::query(insert).bind("l1").execute(&pool).await.unwrap();
    assert!(sqlx::query(insert).bind("l2").execute(&pool).await.is_err());
}
