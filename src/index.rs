//! In-memory vector index.
//!
//! [`VectorIndex::from_documents`] chunks every document, embeds the
//! chunks, and keeps `(chunk, vector)` pairs in memory. Retrieval is a
//! brute-force cosine-similarity scan, which is plenty for a single
//! knowledge-base folder. The index is built completely or not at all.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::chunk::chunk_document;
use crate::embedding::Embedder;
use crate::llm::ChatModel;
use crate::models::{Chunk, Document, ScoredChunk};
use crate::query_engine::QueryEngine;

/// Chunking parameters used while building the index.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct VectorIndex {
    entries: Vec<Entry>,
    document_count: usize,
    embedding_model: String,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("chunks", &self.entries.len())
            .field("documents", &self.document_count)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl VectorIndex {
    /// Chunk and embed `documents`.
    ///
    /// # Errors
    ///
    /// Fails if the documents yield no chunks, if the embedder fails, or if
    /// it returns the wrong number of vectors or vectors of mixed size.
    pub async fn from_documents(
        documents: &[Document],
        embedder: &dyn Embedder,
        settings: ChunkSettings,
    ) -> Result<VectorIndex> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|d| chunk_document(d, settings.chunk_size, settings.chunk_overlap))
            .collect();
        if chunks.is_empty() {
            bail!("documents contain no text to index");
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            bail!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        let dims = vectors[0].len();
        if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
            bail!("embedder returned empty or inconsistent vectors");
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| Entry { chunk, vector })
            .collect();

        Ok(VectorIndex {
            entries,
            document_count: documents.len(),
            embedding_model: embedder.model_name().to_string(),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.entries.len()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// The `k` chunks most similar to `query`, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Derive a query engine that retrieves from this index.
    pub fn as_query_engine(
        self: &Arc<Self>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> QueryEngine {
        QueryEngine::new(Arc::clone(self), embedder, chat, top_k)
    }
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
