//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "coderag",
    version,
    author = "neur0map",
    about = "Retrieval-augmented context for code explanation",
    long_about = "coderag stores curated (code, explanation) pairs in a local vector store and, for a \
                  new snippet, retrieves the most relevant examples ranked by embedding similarity, \
                  language match and structural similarity."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/coderag/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a curated dataset into the vector store
    Ingest {
        /// JSON dataset file (defaults to the built-in seed examples)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Reset the collection before ingesting
        #[arg(long)]
        reset: bool,

        /// Run sample queries after ingestion
        #[arg(long)]
        test: bool,
    },

    /// Retrieve relevant examples for a code snippet
    Query {
        /// Code snippet (reads FILE or stdin when omitted)
        code: Option<String>,

        /// Read the snippet from a file
        #[arg(short, long, value_name = "FILE", conflicts_with = "code")]
        file: Option<PathBuf>,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Language of the snippet (detected when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Minimum composite relevance in [0, 1]
        #[arg(short, long)]
        min_relevance: Option<f32>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,

        /// Print the assembled prompt context instead of a result list
        #[arg(long, conflicts_with = "json")]
        context: bool,
    },

    /// Detect the language of a code snippet
    Detect {
        /// Code snippet (reads FILE or stdin when omitted)
        code: Option<String>,

        /// Read the snippet from a file
        #[arg(short, long, value_name = "FILE", conflicts_with = "code")]
        file: Option<PathBuf>,
    },

    /// Show collection statistics
    Stats {
        /// Show statistics in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List stored documents
    View {
        /// Maximum number of documents to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete every document in the collection
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_arguments() {
        let cli = Cli::try_parse_from([
            "coderag", "query", "def f(): pass", "-k", "3", "-l", "python", "-m", "0.4", "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                code,
                top_k,
                language,
                min_relevance,
                json,
                context,
                ..
            } => {
                assert_eq!(code.as_deref(), Some("def f(): pass"));
                assert_eq!(top_k, Some(3));
                assert_eq!(language.as_deref(), Some("python"));
                assert_eq!(min_relevance, Some(0.4));
                assert!(json);
                assert!(!context);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["coderag", "stats", "--verbose", "--config", "c.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_code_and_file_conflict() {
        assert!(Cli::try_parse_from(["coderag", "detect", "x", "--file", "a.py"]).is_err());
    }
}
