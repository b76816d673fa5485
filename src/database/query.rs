//! Raw sqlx query helpers for the persistent difficulty tables.

use crate::database::RecordKey;
use crate::database::models::AttributeRow;
use sqlx::SqlitePool;

/// Reads the star rating stored for a key.
pub async fn get_rating(pool: &SqlitePool, key: &RecordKey) -> Result<Option<f32>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT rating FROM difficulty_ratings
         WHERE beatmap_md5 = ?1 AND ruleset_id = ?2 AND mod_bitmask = ?3",
    )
    .bind(&key.beatmap_md5)
    .bind(key.ruleset_id)
    .bind(key.mod_bitmask)
    .fetch_optional(pool)
    .await
}

/// Inserts or replaces the star rating for a key.
pub async fn upsert_rating(
    pool: &SqlitePool,
    key: &RecordKey,
    rating: f32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO difficulty_ratings (beatmap_md5, ruleset_id, mod_bitmask, rating)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (beatmap_md5, ruleset_id, mod_bitmask) DO UPDATE SET rating = excluded.rating",
    )
    .bind(&key.beatmap_md5)
    .bind(key.ruleset_id)
    .bind(key.mod_bitmask)
    .bind(rating)
    .execute(pool)
    .await?;
    Ok(())
}

/// Reads every attribute stored for a key, ordered by attribute id.
pub async fn get_attributes(
    pool: &SqlitePool,
    key: &RecordKey,
) -> Result<Vec<AttributeRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT attribute_id, value FROM difficulty_attributes
         WHERE beatmap_md5 = ?1 AND ruleset_id = ?2 AND mod_bitmask = ?3
         ORDER BY attribute_id",
    )
    .bind(&key.beatmap_md5)
    .bind(key.ruleset_id)
    .bind(key.mod_bitmask)
    .fetch_all(pool)
    .await
}

/// Inserts or replaces a batch of attributes in a single transaction.
pub async fn upsert_attributes(
    pool: &SqlitePool,
    key: &RecordKey,
    rows: &[AttributeRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO difficulty_attributes (beatmap_md5, ruleset_id, mod_bitmask, attribute_id, value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (beatmap_md5, ruleset_id, mod_bitmask, attribute_id) DO UPDATE SET value = excluded.value",
        )
        .bind(&key.beatmap_md5)
        .bind(key.ruleset_id)
        .bind(key.mod_bitmask)
        .bind(row.attribute_id)
        .bind(row.value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}
