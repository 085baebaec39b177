//! Data types that flow from the loader through chunking into the index.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A file from the knowledge base, normalized to plain text.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// File name relative to the knowledge-base folder.
    pub file_name: String,
    pub path: PathBuf,
    pub content_type: String,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub content_hash: String,
    pub modified_at: DateTime<Utc>,
}

/// A passage of a document's text; the unit that is embedded and retrieved.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub file_name: String,
    pub index: usize,
    pub text: String,
    pub hash: String,
}

/// A chunk returned by retrieval, with its similarity to the question.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
