/// Configuration loading integration tests
use coderag::config::{Config, ConfigValidator};
use coderag::language::{LanguageClassifier, RegexClassifier};
use coderag::CodeRagError;
use std::path::PathBuf;
use tempfile::TempDir;

const LANGUAGES_TEMPLATE: &str = include_str!("../config-templates/languages.toml");

#[test]
fn test_default_config_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");

    let config = Config::default();
    config.save(&path).expect("Failed to save config");

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[_meta]"));
    assert!(content.contains("[retrieval]"));

    let loaded = Config::load(&path).expect("Failed to load config");
    assert_eq!(loaded.retrieval, config.retrieval);
    assert_eq!(loaded.storage.collection, "code_explanations");
    assert_eq!(loaded.embedding.batch_size, 32);
}

#[test]
fn test_invalid_file_reports_every_violation() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[embedding]
provider = "nope"

[retrieval]
top_k = 0
min_relevance = 2.0
"#,
    )
    .unwrap();

    match Config::load(&path) {
        Err(CodeRagError::ConfigValidation { errors }) => {
            let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
            assert!(paths.contains(&"embedding.provider"));
            assert!(paths.contains(&"retrieval.top_k"));
            assert!(paths.contains(&"retrieval.min_relevance"));
        }
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_malformed_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[retrieval\ntop_k = ").unwrap();

    assert!(matches!(Config::load(&path), Err(CodeRagError::Toml(_))));
}

#[test]
fn test_language_template_matches_builtin() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("languages.toml");
    std::fs::write(&path, LANGUAGES_TEMPLATE).unwrap();

    let from_file = RegexClassifier::from_file(&path).unwrap();
    let builtin = RegexClassifier::builtin().unwrap();
    assert_eq!(from_file.languages(), builtin.languages());

    let samples = [
        "def f(x):\n    return x",
        "const f = (x) => { return x; };",
        "interface Point { x: number[] }",
        "#include <iostream>\nint main() { std::cout << 1; }",
        "SELECT 1",
    ];
    for sample in samples {
        assert_eq!(from_file.detect(sample), builtin.detect(sample), "{}", sample);
    }
}

#[test]
fn test_patterns_file_from_config() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    assert_eq!(config.patterns_file().unwrap(), None);

    config.language.patterns_file = Some(temp.path().join("languages.toml"));
    assert_eq!(
        config.patterns_file().unwrap(),
        Some(temp.path().join("languages.toml"))
    );

    config.storage.data_dir = PathBuf::from("/srv/coderag");
    assert!(ConfigValidator::validate(&config).is_ok());
}
