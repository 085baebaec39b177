//! Index construction and query orchestration.
//!
//! [`build_index`] runs the one-time startup pipeline and classifies every
//! failure into an [`IndexError`]. [`AiService`] owns the resulting query
//! engine and answers questions, turning any failure into a [`QueryError`]
//! instead of letting it reach the interactive loop.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::error::{ApiError, IndexError, QueryError};
use crate::index::{ChunkSettings, VectorIndex};
use crate::llm::{ChatModel, OpenAiChat};
use crate::loader::{list_files, DirectoryLoader, Discovery, DocumentLoader};
use crate::logging::Logger;
use crate::openai::OpenAiClient;
use crate::query_engine::QueryEngine;

/// Longest slice of a question echoed into the log.
const LOGGED_QUESTION_CHARS: usize = 100;

/// API calls made per question: one embedding, one completion.
const REQUESTS_PER_QUERY: u32 = 2;

/// Upper bound on answering one question, leaving room for every retry of
/// both API calls.
pub fn query_deadline(request_timeout: Duration, max_retries: u32) -> Duration {
    OpenAiClient::worst_case_duration(request_timeout, max_retries) * REQUESTS_PER_QUERY
}

/// The collaborators the service delegates to.
#[derive(Clone)]
pub struct Backends {
    pub loader: Arc<dyn DocumentLoader>,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
}

impl Backends {
    /// Disk loader plus OpenAI embeddings and chat, authenticated with the
    /// configured key.
    pub fn openai(config: &Config) -> Result<Self, ApiError> {
        let client = OpenAiClient::from_config(config)?;
        Ok(Self {
            loader: Arc::new(DirectoryLoader),
            embedder: Arc::new(OpenAiEmbedder::new(
                client.clone(),
                config.embedding_model.clone(),
            )),
            chat: Arc::new(OpenAiChat::new(
                client,
                config.model.clone(),
                config.temperature,
            )),
        })
    }
}

/// Load the knowledge base, build the index and derive its query engine.
///
/// Either both handles are returned or neither is.
pub async fn build_index(
    config: &Config,
    logger: &Logger,
    backends: &Backends,
) -> Result<(Arc<VectorIndex>, QueryEngine), IndexError> {
    logger.info("Loading documents and creating index...");

    let result = try_build_index(config, logger, backends).await;
    match &result {
        Ok((index, _)) => logger.info(format!(
            "Index created successfully - {} documents processed ({} chunks)",
            index.document_count(),
            index.chunk_count()
        )),
        Err(IndexError::QuotaExceeded(msg)) => logger.error(format!(
            "Quota exhausted: check your plan and billing details ({})",
            msg
        )),
        Err(e) => logger.error(capitalize(&e.to_string())),
    }
    result
}

async fn try_build_index(
    config: &Config,
    logger: &Logger,
    backends: &Backends,
) -> Result<(Arc<VectorIndex>, QueryEngine), IndexError> {
    let root = &config.input_kb_folder;
    if !root.is_dir() {
        return Err(IndexError::DirectoryNotFound(root.clone()));
    }

    let files = list_files(root, &Discovery::from(&config.index))
        .map_err(|e| IndexError::from_collaborator(format!("{:#}", e)))?;
    if files.is_empty() {
        return Err(IndexError::NoFilesFound(root.clone()));
    }
    let names: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    logger.info(format!("Files found: {:?}", names));

    let outcome = backends
        .loader
        .load(root, &files)
        .map_err(|e| IndexError::from_collaborator(format!("{:#}", e)))?;
    for skipped in &outcome.skipped {
        logger.warning(format!(
            "Skipping {}: {}",
            skipped.path.display(),
            skipped.reason
        ));
    }
    if outcome.documents.is_empty() {
        return Err(IndexError::NoDocumentsLoaded(root.clone()));
    }
    logger.debug(format!("{} documents loaded", outcome.documents.len()));

    let settings = ChunkSettings {
        chunk_size: config.index.chunk_size,
        chunk_overlap: config.index.chunk_overlap,
    };
    let index =
        VectorIndex::from_documents(&outcome.documents, backends.embedder.as_ref(), settings)
            .await
            .map_err(|e| IndexError::from_collaborator(format!("{:#}", e)))?;

    let index = Arc::new(index);
    let engine = index.as_query_engine(
        Arc::clone(&backends.embedder),
        Arc::clone(&backends.chat),
        config.index.top_k,
    );
    Ok((index, engine))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Answers questions against the knowledge base.
pub struct AiService {
    engine: Option<QueryEngine>,
    logger: Logger,
    timeout: Duration,
}

impl AiService {
    /// Set up the collaborators and build the index.
    pub async fn start(
        config: &Config,
        logger: Logger,
        backends: &Backends,
    ) -> Result<Self, IndexError> {
        logger.info(format!(
            "AI environment configured - model: {}, embeddings: {}",
            backends.chat.model_name(),
            backends.embedder.model_name()
        ));
        let (_index, engine) = build_index(config, &logger, backends).await?;
        let deadline = query_deadline(
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        );
        Ok(Self::with_engine(engine, logger, deadline))
    }

    pub fn with_engine(engine: QueryEngine, logger: Logger, timeout: Duration) -> Self {
        Self {
            engine: Some(engine),
            logger,
            timeout,
        }
    }

    /// A service whose index was never built; every question is answered
    /// with [`QueryError::EngineNotReady`].
    pub fn without_engine(logger: Logger, timeout: Duration) -> Self {
        Self {
            engine: None,
            logger,
            timeout,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// Forward `question` verbatim to the query engine and return its answer.
    pub async fn answer(&self, question: &str) -> Result<String, QueryError> {
        if question.trim().is_empty() {
            self.logger.warning("Rejected empty question");
            return Err(QueryError::EmptyQuestion);
        }

        let preview: String = question.chars().take(LOGGED_QUESTION_CHARS).collect();
        self.logger.info(format!("Executing query: {}", preview));

        let Some(engine) = &self.engine else {
            self.logger
                .error("Cannot run the query: index not initialized");
            return Err(QueryError::EngineNotReady);
        };

        match tokio::time::timeout(self.timeout, engine.query(question)).await {
            Ok(Ok(answer)) => {
                self.logger.info("Query executed successfully");
                Ok(answer)
            }
            Ok(Err(e)) => {
                let msg = format!("{:#}", e);
                self.logger
                    .error(format!("Error while executing the query: {}", msg));
                Err(QueryError::Query(msg))
            }
            Err(_) => {
                let msg = format!("timed out after {}s", self.timeout.as_secs());
                self.logger
                    .error(format!("Error while executing the query: {}", msg));
                Err(QueryError::Query(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_deadline_covers_every_retry() {
        let timeout = Duration::from_secs(60);
        assert_eq!(query_deadline(timeout, 0), Duration::from_secs(120));
        // 3 attempts of 60s plus 1s and 2s of backoff, for each of 2 calls.
        assert_eq!(query_deadline(timeout, 2), Duration::from_secs(366));
        assert!(query_deadline(timeout, 2) > timeout * 3);
    }
}
