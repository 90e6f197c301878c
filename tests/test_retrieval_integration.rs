/// Retrieval pipeline integration tests
///
/// Ingests the seed dataset into a SQLite store with the model-free hash
/// embedder and checks ranking, persistence and collection management.
use coderag::config::Config;
use coderag::dataset::Dataset;
use coderag::prompt::ContextAssembler;
use coderag::retrieval::{RetrievalEngine, RetrievalError, RetrievalQuery};
use coderag::store::StoreError;
use coderag::CodeRagError;
use tempfile::TempDir;

fn hash_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = temp.path().to_path_buf();
    config.embedding.provider = "hash".to_string();
    config
}

fn seeded_engine(config: &Config) -> RetrievalEngine {
    let engine = RetrievalEngine::from_config(config).expect("Failed to build engine");
    let dataset = Dataset::builtin().expect("Seed dataset should parse");
    let report = engine
        .add_documents_batch(dataset.into_documents())
        .expect("Ingestion failed");
    assert_eq!(report.ingested, 10);
    engine
}

fn quicksort_code() -> String {
    Dataset::builtin()
        .unwrap()
        .entries()
        .iter()
        .find(|e| e.id.as_deref() == Some("py_quicksort"))
        .map(|e| e.code.clone())
        .unwrap()
}

#[test]
fn test_seed_ingest_and_exact_match() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    let engine = seeded_engine(&config);

    assert!(config.database_path().unwrap().exists());
    println!("✓ Seed dataset ingested");

    let results = engine
        .retrieve(&RetrievalQuery::new(quicksort_code()).top_k(3).min_relevance(0.0))
        .unwrap();

    assert!(!results.is_empty() && results.len() <= 3);
    assert_eq!(results[0].id, "py_quicksort");
    assert_eq!(results[0].relevance_score, 1.0);
    assert!(results.iter().all(|r| r.language == "python"));
    assert!(results
        .windows(2)
        .all(|w| w[0].relevance_score >= w[1].relevance_score));

    println!(
        "✓ Top result: {} ({:.3})",
        results[0].id, results[0].relevance_score
    );
}

#[test]
fn test_reingest_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    let engine = seeded_engine(&config);

    engine
        .add_documents_batch(Dataset::builtin().unwrap().into_documents())
        .unwrap();

    let stats = engine.collection_stats().unwrap();
    assert_eq!(stats.total_documents, 10);
    assert_eq!(stats.languages.get("python"), Some(&5));
    assert_eq!(stats.collection_name, "code_explanations");
    assert_eq!(stats.embedding_model, "hash-384");
    assert_eq!(stats.dimension, 384);
}

#[test]
fn test_store_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    drop(seeded_engine(&config));

    let reopened = RetrievalEngine::from_config(&config).unwrap();
    assert_eq!(reopened.collection_stats().unwrap().total_documents, 10);

    let results = reopened
        .retrieve(&RetrievalQuery::new(quicksort_code()).min_relevance(0.0))
        .unwrap();
    assert_eq!(results[0].id, "py_quicksort");
    assert!(results[0].explanation.starts_with("## Overview"));
}

#[test]
fn test_hnsw_path_matches_exact_scan() {
    let temp = TempDir::new().unwrap();
    let mut config = hash_config(&temp);
    config.indexing.exact_scan_limit = 0;
    let engine = seeded_engine(&config);

    let results = engine
        .retrieve(&RetrievalQuery::new(quicksort_code()).top_k(2).min_relevance(0.0))
        .unwrap();
    assert_eq!(results[0].id, "py_quicksort");
}

#[test]
fn test_unseen_language_falls_back() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    let engine = seeded_engine(&config);

    // No go examples in the seed set, so the filtered query comes back empty
    let query = RetrievalQuery::new("package main\n\nfunc run() {\n    x := 1\n}")
        .top_k(4)
        .min_relevance(0.0);
    assert_eq!(engine.detect_language(&query.code), "go");

    let results = engine.retrieve(&query).unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.language != "go"));
}

#[test]
fn test_reset_empties_collection() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    let engine = seeded_engine(&config);

    engine.reset_collection().unwrap();
    assert_eq!(engine.collection_stats().unwrap().total_documents, 0);
    assert!(engine
        .retrieve(&RetrievalQuery::new(quicksort_code()).min_relevance(0.0))
        .unwrap()
        .is_empty());
}

#[test]
fn test_model_change_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    drop(seeded_engine(&config));

    let mut other = config.clone();
    other.embedding.dimension = 128;
    match RetrievalEngine::from_config(&other) {
        Err(CodeRagError::Store(StoreError::ModelMismatch { stored, requested, .. })) => {
            assert_eq!(stored, "hash-384");
            assert_eq!(requested, "hash-128");
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("opening with another model should fail"),
    }

    // A separate collection in the same database is fine
    other.storage.collection = "small".to_string();
    let small = RetrievalEngine::from_config(&other).unwrap();
    assert_eq!(small.collection_stats().unwrap().total_documents, 0);
}

#[test]
fn test_context_block_from_results() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    let engine = seeded_engine(&config);

    let results = engine
        .retrieve(&RetrievalQuery::new(quicksort_code()).min_relevance(0.0))
        .unwrap();
    let context = ContextAssembler::from(&config.prompt).build_context(&results);

    assert!(context.starts_with("Here are similar code examples for reference:"));
    assert!(context.contains("Example 1 (Relevance: 1.00, Language: python):"));
    assert!(context.contains("```python\ndef quicksort(arr):"));
    assert!(!context.contains("Example 4 "));
}

#[test]
fn test_invalid_query_surfaces_typed_error() {
    let temp = TempDir::new().unwrap();
    let config = hash_config(&temp);
    let engine = seeded_engine(&config);

    let query = RetrievalQuery::new("x").top_k(0);
    assert!(matches!(
        engine.retrieve(&query),
        Err(RetrievalError::InvalidQuery(_))
    ));
    assert!(engine.retrieve_or_empty(&query).is_empty());
}

#[test]
#[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
fn test_fastembed_pipeline() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = temp.path().to_path_buf();

    let engine = seeded_engine(&config);
    let results = engine
        .retrieve(
            &RetrievalQuery::new("def merge_sort(arr):\n    if len(arr) <= 1:\n        return arr")
                .top_k(2)
                .min_relevance(0.5),
        )
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].language, "python");
    println!(
        "✓ FastEmbed top result: {} ({:.3})",
        results[0].id, results[0].relevance_score
    );
}
