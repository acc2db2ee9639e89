use anyhow::Result;
use etfscout::{config::Config, Database, InteractionLogger};
use std::path::PathBuf;

fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("etfscout-test-{}.db", uuid::Uuid::new_v4()))
}

fn remove_db_files(path: &PathBuf) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

#[test]
fn test_config_defaults_without_environment() {
    let config = Config::from_lookup(|_| None).unwrap();
    assert_eq!(config.database.path, "user_logs.db");
    assert_eq!(config.llm.max_tokens, 150);
}

#[test]
fn test_config_invalid_timeout() {
    let result = Config::from_lookup(|key| {
        (key == "QUOTE_TIMEOUT_SECONDS").then(|| "soon".to_string())
    });
    let err = result.unwrap_err();
    assert!(err.to_string().contains("QUOTE_TIMEOUT_SECONDS"));
}

#[tokio::test]
async fn test_restart_keeps_rows_and_schema() -> Result<()> {
    let path = temp_db_path();

    // First process start
    let db = Database::new(&path).await?;
    db.run_migrations().await?;
    db.health_check().await?;
    let logger = InteractionLogger::new(db.pool.clone());
    let first_id = logger.record("What is SPY?", "An S&P 500 ETF.", None).await?;
    db.close().await;

    // Second start against the same file must not fail or duplicate the table
    let db = Database::new(&path).await?;
    db.run_migrations().await?;
    let logger = InteractionLogger::new(db.pool.clone());
    let second_id = logger.record("What is QQQ?", "A Nasdaq-100 ETF.", None).await?;

    assert!(second_id > first_id);
    assert_eq!(logger.count().await?, 2);

    let (tables,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'logs'")
            .fetch_one(&db.pool)
            .await?;
    assert_eq!(tables, 1);

    db.close().await;
    remove_db_files(&path);
    Ok(())
}

#[tokio::test]
async fn test_database_creates_parent_directory() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("etfscout-dir-{}", uuid::Uuid::new_v4()));
    let path = dir.join("nested").join("logs.db");

    let db = Database::new(&path).await?;
    db.run_migrations().await?;
    assert!(path.exists());
    db.close().await;

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
