use crate::database::query;
use crate::database::models::AttributeRow;
use crate::database::RecordKey;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens or creates the database file.
    pub async fn new(db_path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    sqlx::Error::Io(std::io::Error::other(format!(
                        "Unable to create parent directory: {}",
                        e
                    )))
                })?;
            }
        }

        let absolute_path = if db_path.is_absolute() {
            db_path.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(db_path)
        };

        let options = SqliteConnectOptions::new()
            .filename(&absolute_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;
        let db = Database { pool };
        db.init_schema().await?;
        log::info!("DB: Opened {:?}", absolute_path);
        Ok(db)
    }

    /// Opens a private in-memory database.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        use sqlx::sqlite::SqlitePoolOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Database { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Creates the tables if they do not exist.
    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS difficulty_ratings (
                beatmap_md5 TEXT NOT NULL,
                ruleset_id INTEGER NOT NULL,
                mod_bitmask INTEGER NOT NULL,
                rating REAL NOT NULL,
                PRIMARY KEY (beatmap_md5, ruleset_id, mod_bitmask)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS difficulty_attributes (
                beatmap_md5 TEXT NOT NULL,
                ruleset_id INTEGER NOT NULL,
                mod_bitmask INTEGER NOT NULL,
                attribute_id INTEGER NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (beatmap_md5, ruleset_id, mod_bitmask, attribute_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_rating(&self, key: &RecordKey) -> Result<Option<f32>, sqlx::Error> {
        query::get_rating(&self.pool, key).await
    }

    pub async fn upsert_rating(&self, key: &RecordKey, rating: f32) -> Result<(), sqlx::Error> {
        query::upsert_rating(&self.pool, key, rating).await
    }

    pub async fn get_attributes(&self, key: &RecordKey) -> Result<Vec<AttributeRow>, sqlx::Error> {
        query::get_attributes(&self.pool, key).await
    }

    pub async fn upsert_attributes(
        &self,
        key: &RecordKey,
        rows: &[AttributeRow],
    ) -> Result<(), sqlx::Error> {
        query::upsert_attributes(&self.pool, key, rows).await
    }
}
