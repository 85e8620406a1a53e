//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Entries live in the `index_entries` table with vectors stored as
//! little-endian f32 BLOBs. Queries load every vector and rank by cosine
//! distance in process, the same brute-force strategy as the in-memory
//! index.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use acl_rag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use acl_rag_core::index::{rank_matches, EntryMetadata, IndexMatch, IndexedEntry, VectorIndex};

use crate::{db, migrate};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to (or create) the database at `path` and ensure the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open index database: {}", path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete every entry. Returns the number removed.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM index_entries")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

struct EntryRow {
    id: String,
    text: String,
    metadata: EntryMetadata,
    vector: Vec<f32>,
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<EntryRow> {
    let id: String = row.try_get("id")?;
    let metadata_json: String = row.try_get("metadata_json")?;
    let metadata: EntryMetadata = serde_json::from_str(&metadata_json)
        .with_context(|| format!("Corrupt metadata for index entry '{}'", id))?;
    let blob: Vec<u8> = row.try_get("vector")?;
    Ok(EntryRow {
        text: row.try_get("text")?,
        vector: blob_to_vec(&blob),
        metadata,
        id,
    })
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, entry: IndexedEntry) -> Result<()> {
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO index_entries (id, text, metadata_json, vector, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                vector = excluded.vector,
                dims = excluded.dims,
                created_at = excluded.created_at
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.text)
        .bind(&metadata_json)
        .bind(vec_to_blob(&entry.vector))
        .bind(entry.vector.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, vector: &[f32], n: usize) -> Result<Vec<IndexMatch>> {
        let rows = sqlx::query("SELECT id, text, metadata_json, vector FROM index_entries")
            .fetch_all(&self.pool)
            .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = decode_row(row)?;
            matches.push(IndexMatch {
                distance: cosine_distance(vector, &entry.vector),
                id: entry.id,
                text: entry.text,
                metadata: entry.metadata,
            });
        }

        Ok(rank_matches(matches, n))
    }

    async fn entries(&self) -> Result<Vec<IndexedEntry>> {
        let rows =
            sqlx::query("SELECT id, text, metadata_json, vector FROM index_entries ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| {
                let entry = decode_row(row)?;
                Ok(IndexedEntry {
                    id: entry.id,
                    vector: entry.vector,
                    text: entry.text,
                    metadata: entry.metadata,
                })
            })
            .collect()
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
