//! # DocuMentor
//!
//! A command-line assistant that answers natural-language questions about a
//! folder of documents.
//!
//! At startup the knowledge-base folder is scanned, every supported file is
//! parsed, chunked and embedded into an in-memory vector index. Questions
//! typed at the prompt are answered by retrieving the most relevant chunks
//! and asking a hosted chat model to answer from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────────┐
//! │  loader  │──▶│ chunk + embed │──▶│ VectorIndex  │
//! │ txt/pdf… │   │   (OpenAI)    │   │  (memory)    │
//! └──────────┘   └───────────────┘   └──────┬───────┘
//!                                           │
//!                 ┌──────────┐       ┌──────▼───────┐
//!                 │   repl   │──────▶│  AiService   │──▶ chat model
//!                 └──────────┘       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! documentor --config ./config/config.toml            # interactive session
//! documentor ask "What is the refund policy?"         # single question
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credential lookup |
//! | [`logging`] | Console and size-rotated file logging |
//! | [`error`] | Typed errors for every component |
//! | [`loader`] | Knowledge-base discovery and document loading |
//! | [`extract`] | Text extraction from PDF and Office files |
//! | [`chunk`] | Paragraph-aware text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat model abstraction |
//! | [`openai`] | HTTP client for the OpenAI API |
//! | [`index`] | In-memory vector index |
//! | [`query_engine`] | Retrieval-augmented answering |
//! | [`service`] | Index build and query orchestration |
//! | [`validate`] | Question and exit keyword checks |
//! | [`repl`] | Interactive question loop |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod models;
pub mod openai;
pub mod query_engine;
pub mod repl;
pub mod service;
pub mod validate;
