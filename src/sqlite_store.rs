//! SQLite-backed [`Retriever`] implementation.
//!
//! Chunks and their optional embedding blobs live in one `chunks` table.
//! `index` embeds everything first and only then swaps the table contents
//! inside a single transaction, so a failed embedding call leaves the old
//! index untouched. `query` scores every row with the ranking shared with
//! the in-memory retriever, in insertion order so ties stay stable.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use qa_harness_core::embedding::{blob_to_vec, vec_to_blob, Embedder};
use qa_harness_core::models::{Chunk, ChunkMetadata, RetrievedPassage};
use qa_harness_core::retriever::{query_key_for, rank, QueryKey, Retriever};

use crate::config::Config;
use crate::{db, embedding, migrate};

/// One indexed source document and how many chunks it contributed.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: i64,
}

/// SQLite implementation of the [`Retriever`] trait.
pub struct SqliteRetriever {
    pool: SqlitePool,
    embedder: Option<Arc<dyn Embedder>>,
    batch_size: usize,
}

impl SqliteRetriever {
    /// Connect to the configured database and make sure the schema exists.
    /// No embedder is attached.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    /// [`connect`](Self::connect), then attach the configured embedder, if any.
    pub async fn open(config: &Config) -> Result<Self> {
        let retriever = Self::connect(config).await?;
        Ok(match embedding::create_embedder(&config.embedding)? {
            Some(embedder) => retriever.with_embedder(embedder, config.embedding.batch_size),
            None => retriever,
        })
    }

    /// A lexical-only retriever over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            embedder: None,
            batch_size: 64,
        }
    }

    /// Embed chunks and queries with `embedder`, `batch_size` texts per call.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        self.embedder = Some(embedder);
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Distinct indexed sources with their chunk counts, sorted by name.
    pub async fn sources(&self) -> Result<Vec<SourceSummary>> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS chunks FROM chunks GROUP BY source ORDER BY source ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SourceSummary {
                source: row.get("source"),
                chunks: row.get("chunks"),
            })
            .collect())
    }

    /// Remove every indexed chunk. Returns the number of rows deleted.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Option<Vec<f32>>>> {
        let embedder = match &self.embedder {
            Some(e) => e,
            None => return Ok(vec![None; chunks.len()]),
        };

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            if embedded.len() != batch.len() {
                return Err(anyhow!(
                    "embedder returned {} vectors for {} chunks",
                    embedded.len(),
                    batch.len()
                ));
            }
            vectors.extend(embedded.into_iter().map(Some));
        }
        debug!(count = vectors.len(), model = embedder.model_name(), "chunks embedded");
        Ok(vectors)
    }
}

#[async_trait]
impl Retriever for SqliteRetriever {
    async fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let vectors = self.embed_all(chunks).await?;
        let model = self.embedder.as_ref().map(|e| e.model_name().to_string());
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;

        for (chunk, vector) in chunks.iter().zip(&vectors) {
            let blob = vector.as_deref().map(vec_to_blob);
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source, chunk_index, start_char, end_char,
                                    text, hash, embedding, model, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.metadata.source)
            .bind(chunk.metadata.chunk_index)
            .bind(chunk.metadata.start_char as i64)
            .bind(chunk.metadata.end_char as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(blob)
            .bind(&model)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(chunks = chunks.len(), "index rebuilt");
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let key = query_key_for(self.embedder.as_deref(), text).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, source, chunk_index, start_char, end_char, text, hash, embedding
            FROM chunks
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Error querying knowledge base")?;

        let entries: Vec<(Chunk, Option<Vec<f32>>)> = rows
            .iter()
            .map(|row| {
                let start: i64 = row.get("start_char");
                let end: i64 = row.get("end_char");
                let blob: Option<Vec<u8>> = row.get("embedding");
                let chunk = Chunk {
                    id: row.get("id"),
                    text: row.get("text"),
                    hash: row.get("hash"),
                    metadata: ChunkMetadata {
                        source: row.get("source"),
                        chunk_index: row.get("chunk_index"),
                        start_char: start.max(0) as usize,
                        end_char: end.max(0) as usize,
                    },
                };
                (chunk, blob.map(|b| blob_to_vec(&b)))
            })
            .collect();

        if matches!(key, QueryKey::Vector(_)) && entries.iter().any(|(_, v)| v.is_none()) {
            warn!("some indexed chunks have no embedding; re-run `qa index` after enabling embeddings");
        }

        Ok(rank(
            &key,
            entries.iter().map(|(c, v)| (c, v.as_deref())),
            k,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::ensure_schema;
    use qa_harness_core::chunk::{chunk_text, ChunkOptions};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        pool
    }

    fn chunks(source: &str, text: &str) -> Vec<Chunk> {
        chunk_text(text, source, &ChunkOptions::default()).unwrap()
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(anyhow!("embedding service unavailable"))
        }
    }

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("payment") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_index_and_query_lexical() {
        let store = SqliteRetriever::new(memory_pool().await);
        let mut all = chunks("discounts.md", "The discount code SAVE15 gives 15% off.");
        all.extend(chunks("shipping.md", "Express shipping costs $10."));
        store.index(&all).await.unwrap();

        let hits = store.query("discount code", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.source, "discounts.md");
        assert_eq!(hits[0].metadata.chunk_index, 0);
    }

    #[tokio::test]
    async fn test_index_replaces_everything() {
        let store = SqliteRetriever::new(memory_pool().await);
        store.index(&chunks("old.md", "old text")).await.unwrap();
        store.index(&chunks("new.md", "new text")).await.unwrap();

        let sources = store.sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source, "new.md");
        assert_eq!(sources[0].chunks, 1);
    }

    #[tokio::test]
    async fn test_failed_embedding_keeps_old_index() {
        let pool = memory_pool().await;
        SqliteRetriever::new(pool.clone())
            .index(&chunks("kept.md", "kept text"))
            .await
            .unwrap();

        let failing = SqliteRetriever::new(pool.clone()).with_embedder(Arc::new(FailingEmbedder), 8);
        let err = failing.index(&chunks("lost.md", "lost text")).await.unwrap_err();
        assert!(err.to_string().contains("unavailable"));

        let sources = SqliteRetriever::new(pool).sources().await.unwrap();
        assert_eq!(sources[0].source, "kept.md");
    }

    #[tokio::test]
    async fn test_vector_query_uses_stored_blobs() {
        let store = SqliteRetriever::new(memory_pool().await).with_embedder(Arc::new(AxisEmbedder), 1);
        let mut all = chunks("shipping.md", "Express shipping costs $10.");
        all.extend(chunks("payment.md", "The payment button is green."));
        store.index(&all).await.unwrap();

        let hits = store.query("payment", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.source, "payment.md");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_clear_and_empty_query() {
        let store = SqliteRetriever::new(memory_pool().await);
        store.index(&chunks("a.md", "cart rules")).await.unwrap();
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.query("cart", 8).await.unwrap().is_empty());
        assert!(store.sources().await.unwrap().is_empty());
    }
}
