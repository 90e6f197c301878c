//! Stored document structures and content-derived identifiers

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Language label used when no language is known
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Number of hex characters kept from the content hash
const CONTENT_ID_LEN: usize = 16;

/// Metadata carried alongside every stored document
///
/// The four classification fields are always present; anything else a
/// dataset provides lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub subcategory: String,

    #[serde(default = "default_difficulty")]
    pub difficulty: String,

    /// Explanation text attached at ingestion time (never embedded)
    #[serde(default)]
    pub explanation: String,

    /// Open-ended extension keys
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_language() -> String {
    UNKNOWN_LANGUAGE.to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_difficulty() -> String {
    "unknown".to_string()
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            language: default_language(),
            category: default_category(),
            subcategory: String::new(),
            difficulty: default_difficulty(),
            explanation: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl DocumentMetadata {
    pub fn new(
        language: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
        difficulty: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            category: category.into(),
            subcategory: subcategory.into(),
            difficulty: difficulty.into(),
            ..Self::default()
        }
    }

    /// Add an extension key
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A document waiting to be ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    /// Explicit id; derived from the code when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Source text that gets embedded
    pub code: String,

    /// Explanation stored as metadata
    pub explanation: String,

    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl NewDocument {
    pub fn new(
        code: impl Into<String>,
        explanation: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> Self {
        Self {
            id: None,
            code: code.into(),
            explanation: explanation.into(),
            metadata,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Id this document will be stored under
    pub fn resolved_id(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => content_id(&self.code),
        }
    }
}

/// A document as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub code: String,
    pub metadata: DocumentMetadata,
}

impl StoredDocument {
    /// Get a short preview of the code (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.code, max_chars)
    }
}

/// Deterministic id derived from the code (BLAKE3, hex, truncated)
pub fn content_id(code: &str) -> String {
    let hash = blake3::hash(code.as_bytes()).to_hex();
    hash[..CONTENT_ID_LEN].to_string()
}

/// Truncate on a char boundary, appending "..." when anything was cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_deterministic() {
        let a = content_id("def f(): pass");
        let b = content_id("def f(): pass");
        let c = content_id("def g(): pass");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_resolved_id_prefers_explicit() {
        let doc = NewDocument::new("x = 1", "assigns", DocumentMetadata::default());
        assert_eq!(doc.resolved_id(), content_id("x = 1"));

        let doc = doc.with_id("py_assign");
        assert_eq!(doc.resolved_id(), "py_assign");

        let empty = NewDocument::new("x = 1", "assigns", DocumentMetadata::default()).with_id("");
        assert_eq!(empty.resolved_id(), content_id("x = 1"));
    }

    #[test]
    fn test_metadata_extra_round_trips_flat() {
        let json = r#"{
            "language": "python",
            "category": "algorithms",
            "subcategory": "sorting",
            "difficulty": "intermediate",
            "source": "handbook"
        }"#;

        let meta: DocumentMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.language, "python");
        assert_eq!(meta.explanation, "");
        assert_eq!(meta.extra.get("source"), Some(&Value::from("handbook")));

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["source"], "handbook");
    }

    #[test]
    fn test_metadata_defaults() {
        let meta: DocumentMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, DocumentMetadata::default());
        assert_eq!(meta.language, UNKNOWN_LANGUAGE);
        assert_eq!(meta.category, "general");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("héllo wörld", 4), "héll...");
    }
}
