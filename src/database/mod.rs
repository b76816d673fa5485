//! Durable store for computed difficulty.
//!
//! Two tables, both keyed by `(beatmap_md5, ruleset_id, mod_bitmask)`:
//! `difficulty_ratings` holds the star rating, `difficulty_attributes` one row
//! per attribute id. Writes are upserts; the last write wins.

pub mod connection;
pub mod models;
pub mod query;

pub use connection::Database;
pub use models::AttributeRow;

use async_trait::async_trait;
use thiserror::Error;

use crate::request::RequestKey;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Composite durable key. The mod bitmask is the lossy storage encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub beatmap_md5: String,
    pub ruleset_id: u8,
    pub mod_bitmask: u32,
}

impl RecordKey {
    pub fn new(beatmap_md5: &str, ruleset_id: u8, mod_bitmask: u32) -> Self {
        Self {
            beatmap_md5: beatmap_md5.to_string(),
            ruleset_id,
            mod_bitmask,
        }
    }
}

impl From<&RequestKey> for RecordKey {
    fn from(key: &RequestKey) -> Self {
        Self::new(key.beatmap_md5(), key.ruleset().id(), key.mod_bitmask())
    }
}

/// Persistence capability consumed by the difficulty cache.
#[async_trait]
pub trait DifficultyStore: Send + Sync {
    /// A stored rating of exactly zero is returned as `Some(0.0)`.
    async fn read_rating(&self, key: &RecordKey) -> Result<Option<f32>, StoreError>;

    /// Returns `None` when no attribute row exists for the key.
    async fn read_attributes(&self, key: &RecordKey)
    -> Result<Option<Vec<AttributeRow>>, StoreError>;

    async fn write_rating(&self, key: &RecordKey, rating: f32) -> Result<(), StoreError>;

    async fn write_attributes(
        &self,
        key: &RecordKey,
        rows: &[AttributeRow],
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl DifficultyStore for Database {
    async fn read_rating(&self, key: &RecordKey) -> Result<Option<f32>, StoreError> {
        Ok(self.get_rating(key).await?)
    }

    async fn read_attributes(
        &self,
        key: &RecordKey,
    ) -> Result<Option<Vec<AttributeRow>>, StoreError> {
        let rows = self.get_attributes(key).await?;
        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    async fn write_rating(&self, key: &RecordKey, rating: f32) -> Result<(), StoreError> {
        Ok(self.upsert_rating(key, rating).await?)
    }

    async fn write_attributes(
        &self,
        key: &RecordKey,
        rows: &[AttributeRow],
    ) -> Result<(), StoreError> {
        Ok(self.upsert_attributes(key, rows).await?)
    }
}
