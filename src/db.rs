use std::time::Duration;

use anyhow::Context;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

use crate::config::Config;

const RECORDS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id          CHAR(36)     NOT NULL PRIMARY KEY,
    collection  VARCHAR(64)  NOT NULL,
    unique_key  VARCHAR(512) NULL,
    doc         JSON         NOT NULL,
    created_at  DATETIME(6)  NOT NULL,
    UNIQUE KEY uq_records_collection_key (collection, unique_key),
    KEY idx_records_collection_created (collection, created_at)
)
"#;

pub async fn init_db(config: &Config, database_url: &str) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::query(RECORDS_DDL)
        .execute(&pool)
        .await
        .context("Failed to create records table")?;

    Ok(pool)
}
