//! Formats ranked examples into a context block for a language-model prompt

use crate::config::PromptConfig;
use crate::document::truncate_chars;
use crate::retrieval::RetrievalResult;

const HEADER: &str = "Here are similar code examples for reference:\n\n";

/// Context block builder
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_examples: usize,
    max_explanation_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from(&PromptConfig::default())
    }
}

impl From<&PromptConfig> for ContextAssembler {
    fn from(config: &PromptConfig) -> Self {
        Self::new(config.max_examples, config.max_explanation_chars)
    }
}

impl ContextAssembler {
    pub fn new(max_examples: usize, max_explanation_chars: usize) -> Self {
        Self {
            max_examples,
            max_explanation_chars,
        }
    }

    /// Render up to `max_examples` results; no results render as ""
    pub fn build_context(&self, results: &[RetrievalResult]) -> String {
        if results.is_empty() {
            return String::new();
        }

        let mut context = String::from(HEADER);

        for (i, result) in results.iter().take(self.max_examples).enumerate() {
            let explanation = truncate_chars(&result.explanation, self.max_explanation_chars);

            context.push_str(&format!(
                "Example {} (Relevance: {:.2}, Language: {}):\n\n```{}\n{}\n```\n\nExplanation: {}\n\n---\n\n",
                i + 1,
                result.relevance_score,
                result.language,
                result.language,
                result.code,
                explanation
            ));
        }

        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentMetadata;

    fn result(code: &str, language: &str, explanation: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            id: code.to_string(),
            code: code.to_string(),
            explanation: explanation.to_string(),
            language: language.to_string(),
            category: "algorithms".to_string(),
            metadata: DocumentMetadata::default(),
            relevance_score: score,
            distance: 1.0 - score,
        }
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(ContextAssembler::default().build_context(&[]), "");
    }

    #[test]
    fn test_single_example_layout() {
        let context = ContextAssembler::default()
            .build_context(&[result("print(1)", "python", "Prints one", 0.876)]);

        assert_eq!(
            context,
            "Here are similar code examples for reference:\n\n\
             Example 1 (Relevance: 0.88, Language: python):\n\n\
             ```python\nprint(1)\n```\n\n\
             Explanation: Prints one\n\n---\n\n"
        );
    }

    #[test]
    fn test_blocks_follow_rank_order() {
        let context = ContextAssembler::default().build_context(&[
            result("a()", "go", "First", 0.9),
            result("b()", "go", "Second", 0.7),
        ]);

        assert_eq!(
            context,
            "Here are similar code examples for reference:\n\n\
             Example 1 (Relevance: 0.90, Language: go):\n\n\
             ```go\na()\n```\n\n\
             Explanation: First\n\n---\n\n\
             Example 2 (Relevance: 0.70, Language: go):\n\n\
             ```go\nb()\n```\n\n\
             Explanation: Second\n\n---\n\n"
        );
    }

    #[test]
    fn test_limits_examples_and_truncates() {
        let long = "é".repeat(10);
        let results: Vec<RetrievalResult> = (0..5)
            .map(|i| result(&format!("x = {}", i), "python", &long, 0.9))
            .collect();

        let context = ContextAssembler::new(2, 4).build_context(&results);

        assert!(context.contains("Example 2 "));
        assert!(!context.contains("Example 3 "));
        assert!(context.contains("Explanation: éééé...\n"));
    }
}
