//! Heuristic source-language detection
//!
//! The default classifier scores every language by how many of its syntax
//! patterns occur in the text. Definitions are ordered; a tie goes to the
//! earlier definition, and text matching nothing is labelled `unknown`.

use crate::document::UNKNOWN_LANGUAGE;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LanguageError {
    #[error("Invalid pattern for language '{language}': {message}")]
    InvalidPattern { language: String, message: String },

    #[error("Language '{0}' has no patterns")]
    EmptyDefinition(String),

    #[error("Language '{0}' is defined more than once")]
    DuplicateLanguage(String),

    #[error("Failed to read language definitions {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid language definitions file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Maps source text to a coarse language label
pub trait LanguageClassifier: Send + Sync {
    fn detect(&self, code: &str) -> String;
}

/// One language and its characteristic patterns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDefinition {
    pub name: String,
    pub patterns: Vec<String>,
}

impl LanguageDefinition {
    pub fn new(name: &str, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Language definitions file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagesConfig {
    pub language: Vec<LanguageDefinition>,
}

/// Built-in definitions, in tie-breaking order
pub fn builtin_definitions() -> Vec<LanguageDefinition> {
    vec![
        LanguageDefinition::new(
            "python",
            &[r"def\s+\w+\(", r"import\s+\w+", r":\s*$", r"elif\s+", r"print\("],
        ),
        LanguageDefinition::new(
            "javascript",
            &[
                r"function\s+\w+\(",
                r"const\s+\w+\s*=",
                r"=>\s*\{",
                r"async\s+",
                r"await\s+",
            ],
        ),
        LanguageDefinition::new(
            "typescript",
            &[r":\s*\w+(\[\]|<)", r"interface\s+\w+", r"type\s+\w+\s*="],
        ),
        LanguageDefinition::new(
            "java",
            &[
                r"public\s+(class|static)",
                r"void\s+\w+\(",
                r"System\.out",
                r"@Override",
            ],
        ),
        LanguageDefinition::new(
            "cpp",
            &[r"#include\s*<", r"std::", r"int\s+main\(", r"cout\s*<<"],
        ),
        LanguageDefinition::new(
            "c",
            &[r"#include\s*<", r"int\s+main\(", r"printf\(", r"scanf\("],
        ),
        LanguageDefinition::new(
            "go",
            &[r"func\s+\w+\(", r"package\s+", r":=\s+", r"fmt\."],
        ),
        LanguageDefinition::new(
            "rust",
            &[r"fn\s+\w+\(", r"let\s+\w+", r"impl\s+", r"pub\s+"],
        ),
    ]
}

/// Compiled language with pre-compiled regexes
#[derive(Debug, Clone)]
struct CompiledLanguage {
    name: String,
    patterns: Vec<Regex>,
}

/// Regex-count classifier
#[derive(Debug, Clone)]
pub struct RegexClassifier {
    languages: Vec<CompiledLanguage>,
}

impl RegexClassifier {
    /// Classifier over the built-in definitions
    pub fn builtin() -> Result<Self, LanguageError> {
        Self::from_definitions(builtin_definitions())
    }

    /// Load definitions from a TOML file (`[[language]] name, patterns`)
    pub fn from_file(path: &Path) -> Result<Self, LanguageError> {
        let content = std::fs::read_to_string(path).map_err(|e| LanguageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: LanguagesConfig = toml::from_str(&content)?;
        Self::from_definitions(config.language)
    }

    pub fn from_definitions(definitions: Vec<LanguageDefinition>) -> Result<Self, LanguageError> {
        let mut languages: Vec<CompiledLanguage> = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if definition.patterns.is_empty() {
                return Err(LanguageError::EmptyDefinition(definition.name));
            }
            if languages.iter().any(|l| l.name == definition.name) {
                return Err(LanguageError::DuplicateLanguage(definition.name));
            }

            let patterns = definition
                .patterns
                .iter()
                .map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .multi_line(true)
                        .build()
                        .map_err(|e| LanguageError::InvalidPattern {
                            language: definition.name.clone(),
                            message: e.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            languages.push(CompiledLanguage {
                name: definition.name,
                patterns,
            });
        }

        Ok(Self { languages })
    }

    /// Per-language match counts, in definition order
    pub fn scores(&self, code: &str) -> Vec<(String, usize)> {
        self.languages
            .iter()
            .map(|language| {
                let score = language
                    .patterns
                    .iter()
                    .filter(|pattern| pattern.is_match(code))
                    .count();
                (language.name.clone(), score)
            })
            .collect()
    }

    pub fn languages(&self) -> Vec<&str> {
        self.languages.iter().map(|l| l.name.as_str()).collect()
    }
}

impl LanguageClassifier for RegexClassifier {
    fn detect(&self, code: &str) -> String {
        let mut best: Option<(String, usize)> = None;

        for (name, score) in self.scores(code) {
            if score == 0 {
                continue;
            }
            // Strictly greater keeps the first definition on ties
            if best.as_ref().map_or(true, |(_, top)| score > *top) {
                best = Some((name, score));
            }
        }

        best.map(|(name, _)| name)
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
    }
}

/// Always answers with the same label
#[derive(Debug, Clone)]
pub struct StaticClassifier {
    label: String,
}

impl StaticClassifier {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl LanguageClassifier for StaticClassifier {
    fn detect(&self, _code: &str) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn classifier() -> RegexClassifier {
        RegexClassifier::builtin().unwrap()
    }

    #[test]
    fn test_builtin_compiles() {
        let c = classifier();
        assert_eq!(
            c.languages(),
            vec!["python", "javascript", "typescript", "java", "cpp", "c", "go", "rust"]
        );
    }

    #[test]
    fn test_detects_common_languages() {
        let c = classifier();

        let python = "def merge_sort(arr):\n    if len(arr) <= 1:\n        return arr\n    print(arr)";
        assert_eq!(c.detect(python), "python");

        let javascript = "const add = (a, b) => {\n  return a + b;\n};\nasync function load() { await fetch(url); }";
        assert_eq!(c.detect(javascript), "javascript");

        let java = "public class Main {\n    public static void main(String[] args) {\n        System.out.println(\"hi\");\n    }\n}";
        assert_eq!(c.detect(java), "java");

        let go = "package main\n\nimport \"fmt\"\n\nfunc main() {\n    x := 1\n    fmt.Println(x)\n}";
        assert_eq!(c.detect(go), "go");

        let rust = "pub fn add(a: i32) -> i32 {\n    let b = 2;\n    a + b\n}\nimpl Foo {}";
        assert_eq!(c.detect(rust), "rust");
    }

    #[test]
    fn test_unknown_when_nothing_matches() {
        let c = classifier();
        assert_eq!(c.detect(""), UNKNOWN_LANGUAGE);
        assert_eq!(c.detect("SELECT * FROM users"), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_tie_goes_to_first_definition() {
        // Both cpp and c match `#include <` and `int main(`
        let c = classifier();
        assert_eq!(c.detect("#include <stdlib.h>\nint main() { return 0; }"), "cpp");

        let custom = RegexClassifier::from_definitions(vec![
            LanguageDefinition::new("first", &["shared"]),
            LanguageDefinition::new("second", &["shared"]),
        ])
        .unwrap();
        assert_eq!(custom.detect("shared"), "first");
    }

    #[test]
    fn test_case_insensitive_and_multiline() {
        let c = classifier();
        let scores = c.scores("DEF Foo(x):\nELIF y");
        let python = scores.iter().find(|(name, _)| name == "python").unwrap();
        assert_eq!(python.1, 3);
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(matches!(
            RegexClassifier::from_definitions(vec![LanguageDefinition::new("bad", &["("])]),
            Err(LanguageError::InvalidPattern { .. })
        ));
        assert!(matches!(
            RegexClassifier::from_definitions(vec![LanguageDefinition::new("empty", &[])]),
            Err(LanguageError::EmptyDefinition(_))
        ));
        assert!(matches!(
            RegexClassifier::from_definitions(vec![
                LanguageDefinition::new("x", &["a"]),
                LanguageDefinition::new("x", &["b"]),
            ]),
            Err(LanguageError::DuplicateLanguage(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[language]]
name = "sql"
patterns = ['select\s+', 'from\s+\w+']
"#
        )
        .unwrap();

        let c = RegexClassifier::from_file(file.path()).unwrap();
        assert_eq!(c.detect("select id from users"), "sql");
        assert_eq!(c.detect("def f(): pass"), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_static_classifier() {
        assert_eq!(StaticClassifier::new("go").detect("anything"), "go");
    }
}
