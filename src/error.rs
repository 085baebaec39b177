//! Error types for each layer of DocuMentor.
//!
//! Setup-phase errors ([`ConfigError`], [`LoggingError`], [`IndexError`])
//! abort startup. [`QueryError`] is per-question and never ends a session.

use std::path::PathBuf;

use thiserror::Error;

/// Substring the hosted API uses to signal an exhausted billing quota.
pub const QUOTA_MARKER: &str = "insufficient_quota";

/// Returns true when an error message reports quota exhaustion.
pub fn is_quota_message(message: &str) -> bool {
    message.to_lowercase().contains(QUOTA_MARKER)
}

/// Failure while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(
        "OPENAI_API_KEY not found in the configuration file or the environment; \
         add it to a .env file as OPENAI_API_KEY=<your key>"
    )]
    MissingCredential,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while setting up or using the logging facility.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("logger not initialized: call LoggingManager::initialize first")]
    NotInitialized,

    #[error("unknown log level: '{0}'")]
    InvalidLevel(String),

    #[error("failed to open log file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    GlobalAlreadySet,
}

/// Failure while building the document index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("knowledge-base directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("no files found in {}", .0.display())]
    NoFilesFound(PathBuf),

    #[error("no valid documents could be loaded from {}", .0.display())]
    NoDocumentsLoaded(PathBuf),

    #[error("API quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("error while loading documents or creating the index: {0}")]
    Indexing(String),
}

impl IndexError {
    /// Classifies a collaborator failure, keeping quota exhaustion distinct.
    pub fn from_collaborator(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_quota_message(&message) {
            IndexError::QuotaExceeded(message)
        } else {
            IndexError::Indexing(message)
        }
    }
}

/// Failure while answering a single question.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the question cannot be empty")]
    EmptyQuestion,

    #[error("cannot run the query: index not initialized")]
    EngineNotReady,

    #[error("error while executing the query: {0}")]
    Query(String),
}

impl QueryError {
    /// Text suitable for printing in the interactive session.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::EmptyQuestion => "Please enter a valid question.".to_string(),
            QueryError::EngineNotReady => "The document index is not available, so questions \
                 cannot be answered right now. Check the log file for the indexing error."
                .to_string(),
            QueryError::Query(msg) => format!("An error occurred: {}", msg),
        }
    }
}

/// Failure reported by the hosted model API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether the request may succeed if sent again.
    ///
    /// Rate limits and server errors are retryable; quota exhaustion is not,
    /// even though it shares the 429 status.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, body } => {
                (*status == 429 && !is_quota_message(body)) || *status >= 500
            }
            ApiError::InvalidResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_marker_is_case_insensitive() {
        assert!(is_quota_message("Error code: 429 - INSUFFICIENT_QUOTA"));
        assert!(!is_quota_message("rate limit reached"));
    }

    #[test]
    fn collaborator_failures_are_classified() {
        let err = IndexError::from_collaborator(r#"{"error":{"code":"insufficient_quota"}}"#);
        assert!(matches!(err, IndexError::QuotaExceeded(_)));

        let err = IndexError::from_collaborator("connection reset");
        assert!(matches!(err, IndexError::Indexing(_)));
    }

    #[test]
    fn quota_429_is_not_retryable() {
        let quota = ApiError::Status {
            status: 429,
            body: "insufficient_quota".to_string(),
        };
        let limited = ApiError::Status {
            status: 429,
            body: "rate_limit_exceeded".to_string(),
        };
        let bad_request = ApiError::Status {
            status: 400,
            body: "bad".to_string(),
        };
        assert!(!quota.is_retryable());
        assert!(limited.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(ApiError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn engine_not_ready_has_explanatory_text() {
        let msg = QueryError::EngineNotReady.user_message();
        assert!(msg.contains("index is not available"));
    }
}
