//! Retrieval abstraction plus the in-memory implementation.
//!
//! The [`Retriever`] trait is the only thing test-case and script synthesis
//! know about the index: `index` rebuilds it from chunks, `query` returns
//! the `k` closest passages. Scoring helpers are shared with the SQLite
//! implementation in the app crate so both rank identically.
//!
//! # Distance
//!
//! | Index mode | Distance |
//! |------------|----------|
//! | with an [`Embedder`] | cosine distance `1 - cos(q, v)` |
//! | without | lexical distance `1 - matched_terms / query_terms` |
//!
//! Results are ordered by ascending distance; ties keep index order.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_distance, Embedder};
use crate::models::{Chunk, PassageMetadata, RetrievedPassage};

/// Text → ranked passages capability.
///
/// `index` fully replaces whatever was indexed before. Callers must not
/// interleave `index` and `query` from concurrent requests.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Rebuild the index from `chunks`.
    async fn index(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return up to `k` passages sorted by ascending distance.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>>;
}

/// What a query is compared against: its embedding, or its terms.
#[derive(Debug, Clone)]
pub enum QueryKey {
    Vector(Vec<f32>),
    Terms(BTreeSet<String>),
}

impl QueryKey {
    /// Build a lexical key from query text.
    pub fn terms(text: &str) -> Self {
        QueryKey::Terms(tokenize(text).collect())
    }

    /// Distance from this key to one stored chunk.
    ///
    /// A vector key against a chunk stored without a vector scores the
    /// maximum distance.
    pub fn distance(&self, text: &str, vector: Option<&[f32]>) -> f32 {
        match self {
            QueryKey::Vector(q) => match vector {
                Some(v) => cosine_distance(q, v),
                None => 2.0,
            },
            QueryKey::Terms(terms) => {
                if terms.is_empty() {
                    return 1.0;
                }
                let chunk_terms: BTreeSet<String> = tokenize(text).collect();
                let matched = terms.iter().filter(|t| chunk_terms.contains(*t)).count();
                1.0 - matched as f32 / terms.len() as f32
            }
        }
    }
}

/// Lowercased alphanumeric terms.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Score every entry against `key` and keep the `k` closest.
pub fn rank<'a, I>(key: &QueryKey, entries: I, k: usize) -> Vec<RetrievedPassage>
where
    I: IntoIterator<Item = (&'a Chunk, Option<&'a [f32]>)>,
{
    let mut passages: Vec<RetrievedPassage> = entries
        .into_iter()
        .map(|(chunk, vector)| RetrievedPassage {
            text: chunk.text.clone(),
            metadata: PassageMetadata {
                source: chunk.metadata.source.clone(),
                chunk_index: chunk.metadata.chunk_index,
            },
            distance: key.distance(&chunk.text, vector),
        })
        .collect();

    // Stable sort keeps index order among equal distances.
    passages.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    passages.truncate(k);
    passages
}

/// Build the query key for `text`, embedding it when an embedder is present.
pub async fn query_key_for(embedder: Option<&dyn Embedder>, text: &str) -> Result<QueryKey> {
    match embedder {
        Some(e) => {
            let vector = e
                .embed(&[text.to_string()])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("Empty embedding response"))?;
            Ok(QueryKey::Vector(vector))
        }
        None => Ok(QueryKey::terms(text)),
    }
}

struct IndexedChunk {
    chunk: Chunk,
    vector: Option<Vec<f32>>,
}

/// In-memory [`Retriever`] for tests and embedding hosts.
///
/// Brute-force scoring over every stored chunk behind a `RwLock`.
pub struct InMemoryRetriever {
    embedder: Option<Arc<dyn Embedder>>,
    entries: RwLock<Vec<IndexedChunk>>,
}

impl InMemoryRetriever {
    /// A lexical-only index.
    pub fn new() -> Self {
        Self {
            embedder: None,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// An index that embeds chunks and queries with `embedder`.
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder: Some(embedder),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let vectors: Vec<Option<Vec<f32>>> = match &self.embedder {
            Some(e) if !chunks.is_empty() => {
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let vectors = e.embed(&texts).await?;
                if vectors.len() != chunks.len() {
                    return Err(anyhow!(
                        "embedder returned {} vectors for {} chunks",
                        vectors.len(),
                        chunks.len()
                    ));
                }
                vectors.into_iter().map(Some).collect()
            }
            _ => vec![None; chunks.len()],
        };

        let rebuilt: Vec<IndexedChunk> = chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk { chunk, vector })
            .collect();

        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        *entries = rebuilt;
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let key = query_key_for(self.embedder.as_deref(), text).await?;

        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        Ok(rank(
            &key,
            entries
                .iter()
                .map(|e| (&e.chunk, e.vector.as_deref())),
            k,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_text, ChunkOptions};

    /// Letter-frequency embedder; similar wording lands close together.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    fn chunks(source: &str, text: &str) -> Vec<Chunk> {
        chunk_text(text, source, &ChunkOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let r = InMemoryRetriever::new();
        assert!(r.query("discount code", 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lexical_ranking() {
        let r = InMemoryRetriever::new();
        let mut all = chunks("shipping.md", "Express shipping costs $10.");
        all.extend(chunks("discounts.md", "The discount code SAVE15 gives 15% off."));
        r.index(&all).await.unwrap();

        let hits = r.query("discount code", 8).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.source, "discounts.md");
        assert!(hits[0].distance < hits[1].distance);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_k_truncates() {
        let r = InMemoryRetriever::new();
        let mut all = Vec::new();
        for i in 0..5 {
            all.extend(chunks(&format!("doc{}.md", i), "cart rules"));
        }
        r.index(&all).await.unwrap();
        let hits = r.query("cart", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        // Ties keep index order.
        assert_eq!(hits[0].metadata.source, "doc0.md");
        assert_eq!(hits[2].metadata.source, "doc2.md");
    }

    #[tokio::test]
    async fn test_rebuild_replaces_index() {
        let r = InMemoryRetriever::new();
        r.index(&chunks("old.md", "old content")).await.unwrap();
        r.index(&chunks("new.md", "new content")).await.unwrap();
        assert_eq!(r.len(), 1);
        let hits = r.query("content", 8).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.source, "new.md");
    }

    #[tokio::test]
    async fn test_vector_ranking() {
        let r = InMemoryRetriever::with_embedder(Arc::new(LetterEmbedder));
        let mut all = chunks("a.md", "zzzz zzzz");
        all.extend(chunks("b.md", "payment payment"));
        r.index(&all).await.unwrap();
        let hits = r.query("payment", 2).await.unwrap();
        assert_eq!(hits[0].metadata.source, "b.md");
        assert!(hits[0].distance < 1e-5);
    }

    #[test]
    fn test_lexical_distance() {
        let key = QueryKey::terms("Apply the SAVE15 code");
        assert!(key.distance("save15 code apply the", None).abs() < 1e-6);
        assert!((key.distance("nothing relevant", None) - 1.0).abs() < 1e-6);
        assert!((QueryKey::terms("").distance("anything", None) - 1.0).abs() < 1e-6);
    }
}
