//! Curated (code, explanation) datasets
//!
//! A dataset is a JSON array of flat objects:
//! `{ "id", "language", "category", "subcategory", "difficulty", "code", "explanation" }`.
//! Only `code` is required. The built-in seed set ships inside the binary.

use crate::document::{DocumentMetadata, NewDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

const SEED_DATASET: &str = include_str!("../../data/seed_dataset.json");

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid dataset JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Dataset entry {index} has empty code")]
    EmptyCode { index: usize },
}

/// One curated example as it appears in a dataset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "unknown")]
    pub language: String,
    #[serde(default = "general")]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default = "unknown")]
    pub difficulty: String,
    pub code: String,
    #[serde(default)]
    pub explanation: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

fn general() -> String {
    "general".to_string()
}

impl DatasetEntry {
    pub fn into_document(self) -> NewDocument {
        let metadata = DocumentMetadata::new(
            self.language,
            self.category,
            self.subcategory,
            self.difficulty,
        );
        let document = NewDocument::new(self.code, self.explanation, metadata);

        match self.id {
            Some(id) if !id.is_empty() => document.with_id(id),
            _ => document,
        }
    }
}

/// Counts per classification field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total_examples: usize,
    pub languages: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    pub difficulties: BTreeMap<String, usize>,
}

impl DatasetStats {
    /// Tally (language, category, difficulty) triples
    pub fn tally<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    {
        let mut stats = Self::default();
        for (language, category, difficulty) in items {
            stats.total_examples += 1;
            *stats.languages.entry(language.to_string()).or_insert(0) += 1;
            *stats.categories.entry(category.to_string()).or_insert(0) += 1;
            *stats.difficulties.entry(difficulty.to_string()).or_insert(0) += 1;
        }
        stats
    }

    pub fn from_metadata<'a, I>(metadata: I) -> Self
    where
        I: IntoIterator<Item = &'a DocumentMetadata>,
    {
        Self::tally(metadata.into_iter().map(|m| {
            (
                m.language.as_str(),
                m.category.as_str(),
                m.difficulty.as_str(),
            )
        }))
    }
}

/// An ordered collection of curated examples
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    entries: Vec<DatasetEntry>,
}

impl Dataset {
    pub fn new(entries: Vec<DatasetEntry>) -> Result<Self, DatasetError> {
        if let Some(index) = entries.iter().position(|e| e.code.trim().is_empty()) {
            return Err(DatasetError::EmptyCode { index });
        }
        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let content = std::fs::read_to_string(path).map_err(|e| DatasetError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// The seed examples bundled with the crate
    pub fn builtin() -> Result<Self, DatasetError> {
        Self::from_json(SEED_DATASET)
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats::tally(self.entries.iter().map(|e| {
            (
                e.language.as_str(),
                e.category.as_str(),
                e.difficulty.as_str(),
            )
        }))
    }

    pub fn into_documents(self) -> Vec<NewDocument> {
        self.entries
            .into_iter()
            .map(DatasetEntry::into_document)
            .collect()
    }
}
