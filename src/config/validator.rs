use crate::config::Config;
use crate::embedding::{FastEmbedProvider, PROVIDER_FASTEMBED, PROVIDER_HASH};
use crate::error::{CodeRagError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every violation at once
    pub fn validate(config: &Config) -> Result<()> {
        let errors = Self::collect(config);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CodeRagError::ConfigValidation { errors })
        }
    }

    /// All violations, in section order
    pub fn collect(config: &Config) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_prompt(config, &mut errors);

        errors
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if config.storage.database_file.trim().is_empty() {
            errors.push(ValidationError::new(
                "storage.database_file",
                "Database file name cannot be empty",
            ));
        }

        if config.storage.collection.trim().is_empty() {
            errors.push(ValidationError::new(
                "storage.collection",
                "Collection name cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        let provider = embedding.provider.as_str();
        if provider != PROVIDER_FASTEMBED && provider != PROVIDER_HASH {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be '{}' or '{}', got '{}'",
                    PROVIDER_FASTEMBED, PROVIDER_HASH, provider
                ),
            ));
        }

        if embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        if embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        // The FastEmbed model fixes the dimension
        if provider == PROVIDER_FASTEMBED && !embedding.model.is_empty() {
            match FastEmbedProvider::dimension_for(&embedding.model) {
                Some(dim) if dim != embedding.dimension => {
                    errors.push(ValidationError::new(
                        "embedding.dimension",
                        format!(
                            "Model {} produces {}-dimensional vectors, configured {}",
                            embedding.model, dim, embedding.dimension
                        ),
                    ));
                }
                Some(_) => {}
                None => {
                    errors.push(ValidationError::new(
                        "embedding.model",
                        format!("Unsupported FastEmbed model: {}", embedding.model),
                    ));
                }
            }
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.min_relevance) {
            errors.push(ValidationError::new(
                "retrieval.min_relevance",
                format!(
                    "min_relevance must be between 0.0 and 1.0, got {}",
                    retrieval.min_relevance
                ),
            ));
        }

        if retrieval.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.candidate_multiplier",
                "Candidate multiplier must be at least 1",
            ));
        }

        if retrieval.max_candidates == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_candidates",
                "max_candidates must be at least 1",
            ));
        }

        // NaN fails both checks
        if !(retrieval.language_bonus >= 0.0) {
            errors.push(ValidationError::new(
                "retrieval.language_bonus",
                format!("Bonus cannot be negative, got {}", retrieval.language_bonus),
            ));
        }

        if !(retrieval.length_bonus >= 0.0) {
            errors.push(ValidationError::new(
                "retrieval.length_bonus",
                format!("Bonus cannot be negative, got {}", retrieval.length_bonus),
            ));
        }
    }

    fn validate_prompt(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.prompt.max_examples == 0 {
            errors.push(ValidationError::new(
                "prompt.max_examples",
                "max_examples must be at least 1",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(config: &Config) -> Vec<String> {
        ConfigValidator::collect(config)
            .into_iter()
            .map(|e| e.path)
            .collect()
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_hash_provider_any_dimension() {
        let mut config = Config::default();
        config.embedding.provider = "hash".to_string();
        config.embedding.model = "hash-64".to_string();
        config.embedding.dimension = 64;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_provider() {
        let mut config = Config::default();
        config.embedding.provider = "invalid".to_string();
        assert_eq!(paths(&config), vec!["embedding.provider"]);
    }

    #[test]
    fn test_fastembed_dimension_must_match_model() {
        let mut config = Config::default();
        config.embedding.dimension = 768;
        assert_eq!(paths(&config), vec!["embedding.dimension"]);

        config.embedding.model = "bge-base-en-v1.5".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.embedding.model = "no-such-model".to_string();
        assert_eq!(paths(&config), vec!["embedding.model"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        config.retrieval.min_relevance = 1.5;
        config.retrieval.language_bonus = -0.1;
        config.storage.collection = String::new();
        config.prompt.max_examples = 0;

        let found = paths(&config);
        assert_eq!(found.len(), 5);
        assert!(found.contains(&"retrieval.min_relevance".to_string()));
        assert!(found.contains(&"storage.collection".to_string()));

        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(CodeRagError::ConfigValidation { errors }) if errors.len() == 5
        ));
    }
}
