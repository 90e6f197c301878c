//! Model-free feature-hashing embedder
//!
//! Tokens (identifiers, numbers, and single punctuation marks) and adjacent
//! token pairs are hashed with BLAKE3 into signed buckets, then the vector is
//! L2-normalized. Output depends only on the input text and the dimension.

use super::{EmbeddingError, EmbeddingProvider};

/// Weight of a token pair relative to a single token
const PAIR_WEIGHT: f32 = 0.5;

pub struct HashEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InitializationError(
                "Dimension must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            model_name: format!("hash-{}", dimension),
        })
    }

    fn tokenize(text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();

        for ch in text.chars() {
            if ch.is_alphanumeric() || ch == '_' {
                current.extend(ch.to_lowercase());
            } else {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                if !ch.is_whitespace() {
                    tokens.push(ch.to_string());
                }
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }

        tokens
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];

        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            let feature = format!("{}\u{1f}{}", pair[0], pair[1]);
            self.accumulate(&mut vector, &feature, PAIR_WEIGHT);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(EmbeddingError::GenerationError(
                "Features cancelled out to a zero vector".to_string(),
            ));
        }
        for value in &mut vector {
            *value /= norm;
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(128).unwrap();
        let a = embedder.embed("def quicksort(arr):\n    return arr").unwrap();
        let b = embedder.embed("def quicksort(arr):\n    return arr").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_similar_code_is_closer() {
        let embedder = HashEmbedder::new(256).unwrap();
        let query = embedder.embed("def merge_sort(arr): return sorted(arr)").unwrap();
        let near = embedder.embed("def quick_sort(arr): return sorted(arr)").unwrap();
        let far = embedder
            .embed("public class Singleton { private static Singleton instance; }")
            .unwrap();

        assert!(cosine(&query, &near) > cosine(&query, &far));
    }

    #[test]
    fn test_empty_text_rejected() {
        let embedder = HashEmbedder::new(32).unwrap();
        assert!(embedder.embed("").is_err());
        assert!(embedder.embed("   \n\t").is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashEmbedder::new(0).is_err());
    }

    #[test]
    fn test_tokenize() {
        let tokens = HashEmbedder::tokenize("let x = foo_bar(1);");
        assert_eq!(tokens, vec!["let", "x", "=", "foo_bar", "(", "1", ")", ";"]);
    }
}
