//! coderag - Retrieval-augmented context for code explanation
//!
//! Curated (code, explanation) pairs are embedded once and persisted in a
//! vector store. At query time the closest pairs are retrieved, re-ranked with
//! a transparent composite relevance score and assembled into a context block
//! for a downstream language-model call.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod document;
pub mod embedding;
pub mod error;
pub mod language;
pub mod prompt;
pub mod retrieval;
pub mod store;

pub use error::{CodeRagError, Result};
