//! Composite relevance score
//!
//! `total = max(0, 1 - distance) + language bonus + length bonus`, capped at
//! 1.0. The language bonus applies on exact label equality; the length bonus
//! scales with the ratio of the shorter to the longer line count.

use crate::config::RetrievalConfig;
use serde::Serialize;

/// Bonus weights of the composite score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub language_bonus: f32,
    pub length_bonus: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            language_bonus: 0.2,
            length_bonus: 0.1,
        }
    }
}

impl From<&RetrievalConfig> for ScoringWeights {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            language_bonus: config.language_bonus,
            length_bonus: config.length_bonus,
        }
    }
}

/// Individual terms of one score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub similarity: f32,
    pub language_bonus: f32,
    pub length_bonus: f32,
    pub total: f32,
}

/// Number of newline-separated lines (an empty text has one line)
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Score a candidate against the query
pub fn relevance_score(
    query_code: &str,
    query_language: &str,
    candidate_code: &str,
    candidate_language: &str,
    distance: f32,
    weights: &ScoringWeights,
) -> ScoreBreakdown {
    let similarity = (1.0 - distance).max(0.0);

    let language_bonus = if candidate_language == query_language {
        weights.language_bonus
    } else {
        0.0
    };

    let query_lines = line_count(query_code);
    let doc_lines = line_count(candidate_code);
    let longest = query_lines.max(doc_lines);
    let length_bonus = if longest > 0 {
        weights.length_bonus * (query_lines.min(doc_lines) as f32 / longest as f32)
    } else {
        0.0
    };

    ScoreBreakdown {
        similarity,
        language_bonus,
        length_bonus,
        total: (similarity + language_bonus + length_bonus).min(1.0),
    }
}
