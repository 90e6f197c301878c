use anyhow::Context;
use coderag::cli::{Cli, Commands, ConfigAction};
use coderag::config::{Config, ConfigValidator};
use coderag::dataset::{Dataset, DatasetStats};
use coderag::language::{LanguageClassifier, RegexClassifier};
use coderag::prompt::ContextAssembler;
use coderag::retrieval::{RetrievalEngine, RetrievalQuery, RetrievalResult};
use coderag::{CodeRagError, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

const LANGUAGES_TEMPLATE: &str = include_str!("../config-templates/languages.toml");

/// Queries run by `ingest --test`
const SAMPLE_QUERIES: &[(&str, &str)] = &[
    ("def binary_search(arr, target): pass", "Binary search algorithm"),
    ("async function fetch(): void {}", "Async function"),
    ("class Singleton { private static instance; }", "Singleton pattern"),
];

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Ingest { file, reset, test } => {
            cmd_ingest(cli.config, file, reset, test)?;
        }
        Commands::Query {
            code,
            file,
            top_k,
            language,
            min_relevance,
            json,
            context,
        } => {
            let config = load_config(cli.config)?;
            let code = read_code(code, file)?;
            let query = RetrievalQuery {
                code,
                top_k,
                language,
                min_relevance,
            };
            cmd_query(&config, &query, json, context)?;
        }
        Commands::Detect { code, file } => {
            let config = load_config(cli.config)?;
            cmd_detect(&config, &read_code(code, file)?)?;
        }
        Commands::Stats { json } => {
            cmd_stats(cli.config, json)?;
        }
        Commands::View { limit } => {
            cmd_view(cli.config, limit)?;
        }
        Commands::Reset { yes } => {
            cmd_reset(cli.config, yes)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "coderag=debug" } else { "coderag=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_ingest(
    config_path: Option<PathBuf>,
    file: Option<PathBuf>,
    reset: bool,
    test: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = RetrievalEngine::from_config(&config)?;

    if reset {
        println!("Resetting collection '{}'...", config.storage.collection);
        engine.reset_collection()?;
    }

    let dataset = match &file {
        Some(path) => Dataset::from_file(path)?,
        None => Dataset::builtin()?,
    };

    let stats = dataset.stats();
    println!("Loaded {} examples", stats.total_examples);
    println!("  Languages: {}", join_keys(&stats.languages));
    println!("  Categories: {}", join_keys(&stats.categories));

    println!("Ingesting {} documents...", dataset.len());
    let report = engine.add_documents_batch(dataset.into_documents())?;
    println!(
        "✓ Ingested {} documents in {}ms",
        report.ingested, report.duration_ms
    );
    if report.duplicates_skipped > 0 {
        println!("  Skipped {} duplicate ids", report.duplicates_skipped);
    }

    let collection = engine.collection_stats()?;
    println!("\nCollection: {}", collection.collection_name);
    println!("  Total documents: {}", collection.total_documents);
    println!("  Embedding model: {}", collection.embedding_model);
    println!("  Database path: {}", config.database_path()?.display());
    for (language, count) in &collection.languages {
        println!("    - {}: {} documents", language, count);
    }

    // Sanity check
    let sanity = RetrievalQuery::new("def quicksort(arr): pass").top_k(3);
    match engine.retrieve_or_empty(&sanity).first() {
        Some(top) => println!(
            "\n✓ Retrieval working. Top result: {} - {} (relevance {:.3})",
            top.language, top.category, top.relevance_score
        ),
        None => println!("\n⚠ No results found in test retrieval"),
    }

    if test {
        run_sample_queries(&engine);
    }

    Ok(())
}

fn run_sample_queries(engine: &RetrievalEngine) {
    println!("\nSample queries");
    println!("==============");

    for (code, description) in SAMPLE_QUERIES {
        println!("\n{}: {}", description, code);

        let results = engine.retrieve_or_empty(&RetrievalQuery::new(*code).top_k(3));
        if results.is_empty() {
            println!("  ✗ No results found");
        }
        for (i, result) in results.iter().enumerate() {
            println!(
                "  {}. {} - {} (relevance: {:.3})",
                i + 1,
                result.language,
                result.category,
                result.relevance_score
            );
        }
    }
}

fn cmd_query(config: &Config, query: &RetrievalQuery, json: bool, context: bool) -> Result<()> {
    let engine = RetrievalEngine::from_config(config)?;
    let results = engine.retrieve(query)?;

    if json {
        let output = serde_json::to_string_pretty(&results).map_err(|e| CodeRagError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if context {
        let assembler = ContextAssembler::from(&config.prompt);
        print!("{}", assembler.build_context(&results));
        return Ok(());
    }

    if results.is_empty() {
        println!("No sufficiently relevant examples found");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
    }

    Ok(())
}

fn print_result(rank: usize, result: &RetrievalResult) {
    println!(
        "{}. [{}] {} / {} (relevance {:.3}, distance {:.3})",
        rank,
        result.id,
        result.language,
        result.category,
        result.relevance_score,
        result.distance
    );
    for line in result.code.lines().take(5) {
        println!("     {}", line);
    }
    if result.code.lines().count() > 5 {
        println!("     ...");
    }
}

fn cmd_detect(config: &Config, code: &str) -> Result<()> {
    let classifier = match config.patterns_file()? {
        Some(path) => RegexClassifier::from_file(&path)?,
        None => RegexClassifier::builtin()?,
    };

    println!("Language: {}", classifier.detect(code));

    let mut scores = classifier.scores(code);
    scores.retain(|(_, score)| *score > 0);
    for (language, score) in scores {
        println!("  {}: {}", language, score);
    }

    Ok(())
}

fn cmd_stats(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = RetrievalEngine::from_config(&config)?;
    let stats = engine.collection_stats()?;

    if json {
        let output = serde_json::to_string_pretty(&stats).map_err(|e| CodeRagError::Json {
            source: e,
            context: "Failed to serialize statistics".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    println!("Collection: {}", stats.collection_name);
    println!("  Documents: {}", stats.total_documents);
    println!(
        "  Embedding model: {} ({}D)",
        stats.embedding_model, stats.dimension
    );
    println!("  Database: {}", config.database_path()?.display());

    if !stats.languages.is_empty() {
        println!("  Languages:");
        for (language, count) in &stats.languages {
            println!("    - {}: {}", language, count);
        }
    }

    Ok(())
}

fn cmd_view(config_path: Option<PathBuf>, limit: Option<usize>) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = RetrievalEngine::from_config(&config)?;
    let documents = engine.context().store.get_all(limit)?;

    println!("Total documents: {}", engine.context().store.count()?);
    if documents.is_empty() {
        println!("Collection is empty. Run: coderag ingest --reset");
        return Ok(());
    }

    for (i, document) in documents.iter().enumerate() {
        let metadata = &document.metadata;
        println!("\n[{}] {}", i + 1, document.id);
        println!(
            "  {} / {} / {} / {}",
            metadata.language, metadata.category, metadata.subcategory, metadata.difficulty
        );
        if !metadata.explanation.is_empty() {
            println!(
                "  Explanation: {}",
                coderag::document::truncate_chars(&metadata.explanation, 150).replace('\n', " ")
            );
        }
        println!("  Code: {}", document.preview(300).replace('\n', "\n        "));
    }

    let summary = DatasetStats::from_metadata(documents.iter().map(|d| &d.metadata));
    println!("\nBy language:");
    for (language, count) in &summary.languages {
        println!("  {}: {}", language, count);
    }
    println!("By category:");
    for (category, count) in &summary.categories {
        println!("  {}: {}", category, count);
    }
    println!("By difficulty:");
    for (difficulty, count) in &summary.difficulties {
        println!("  {}: {}", difficulty, count);
    }

    Ok(())
}

fn cmd_reset(config_path: Option<PathBuf>, yes: bool) -> Result<()> {
    let config = load_config(config_path)?;

    if !yes {
        print!(
            "Delete every document in collection '{}'? [y/N] ",
            config.storage.collection
        );
        std::io::stdout().flush().ok();

        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|e| CodeRagError::Io {
                source: e,
                context: "Failed to read confirmation".to_string(),
            })?;

        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    let engine = RetrievalEngine::from_config(&config)?;
    engine.reset_collection()?;
    println!("✓ Collection '{}' reset", config.storage.collection);

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let output = toml::to_string_pretty(&config)?;
            println!("{}", output);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let languages_path = config_dir.join("languages.toml");

            let mut config = Config::default();
            config.language.patterns_file = Some(languages_path.clone());
            config.save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());

            if force || !languages_path.exists() {
                std::fs::write(&languages_path, LANGUAGES_TEMPLATE).map_err(|e| {
                    CodeRagError::Io {
                        source: e,
                        context: format!("Failed to write languages.toml: {:?}", languages_path),
                    }
                })?;
            }
            println!("✓ Language definitions installed: {}", languages_path.display());
        }
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'coderag config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}

/// Snippet from the argument, a file, or stdin
fn read_code(code: Option<String>, file: Option<PathBuf>) -> Result<String> {
    read_code_from(code, file, std::io::stdin().lock())
}

fn read_code_from<R: Read>(
    code: Option<String>,
    file: Option<PathBuf>,
    mut input: R,
) -> Result<String> {
    if let Some(code) = code {
        return Ok(code);
    }

    if let Some(path) = file {
        let code = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read code from {}", path.display()))?;
        return Ok(code);
    }

    let mut buffer = String::new();
    input
        .read_to_string(&mut buffer)
        .context("Failed to read code from stdin")?;
    Ok(buffer)
}

fn join_keys(map: &BTreeMap<String, usize>) -> String {
    map.keys().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_code_sources() {
        let stdin = "from stdin".as_bytes();
        assert_eq!(
            read_code_from(Some("x = 1".to_string()), None, stdin).unwrap(),
            "x = 1"
        );
        assert_eq!(read_code_from(None, None, stdin).unwrap(), "from stdin");

        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("snippet.py");
        std::fs::write(&path, "def f(): pass").unwrap();
        assert_eq!(
            read_code_from(None, Some(path), stdin).unwrap(),
            "def f(): pass"
        );
    }

    #[test]
    fn test_missing_file_keeps_context() {
        let err = read_code_from(None, Some(PathBuf::from("/nonexistent/a.py")), "".as_bytes())
            .unwrap_err();

        match &err {
            CodeRagError::Other(inner) => {
                assert!(inner.to_string().contains("/nonexistent/a.py"));
                assert!(inner.downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
