//! Retrieval-augmented question answering over a [`VectorIndex`].

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::llm::ChatModel;
use crate::models::ScoredChunk;

/// Answers questions by retrieving passages and asking the chat model.
///
/// Holds no per-question state; each call is independent.
#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("index", &self.index)
            .field("chat_model", &self.chat.model_name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl QueryEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            chat,
            top_k: top_k.max(1),
        }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Passages most relevant to `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let mut vectors = self.embedder.embed(&[question.to_string()]).await?;
        let query = vectors
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for the question"))?;
        Ok(self.index.top_k(&query, self.top_k))
    }

    /// Retrieve context for `question` and return the model's answer as-is.
    pub async fn query(&self, question: &str) -> Result<String> {
        let passages = self.retrieve(question).await?;
        let prompt = build_prompt(question, &passages);
        self.chat.complete(&prompt).await
    }
}

/// Context-then-question prompt.
pub fn build_prompt(question: &str, passages: &[ScoredChunk]) -> String {
    let mut context = String::new();
    for (i, p) in passages.iter().enumerate() {
        if i > 0 {
            context.push_str("\n\n");
        }
        context.push_str(&format!(
            "[{}] file_name: {}\n{}",
            i + 1,
            p.chunk.file_name,
            p.chunk.text
        ));
    }

    format!(
        "Context information is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}\n\
         Answer: ",
        context, question
    )
}
