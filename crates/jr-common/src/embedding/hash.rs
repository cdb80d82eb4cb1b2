use std::hash::{Hash, Hasher};

use siphasher::sip::SipHasher13;

use super::{EmbeddingError, EmbeddingProvider};

/// Fixed seeds for deterministic hashing.
/// Changing these changes every embedding; bump the provider name if you do.
const HASH_SEED_K0: u64 = 0x9e37_79b9_7f4a_7c15;
const HASH_SEED_K1: u64 = 0x2545_f491_4f6c_dd1d;

/// Deterministic feature-hashing embedder.
///
/// - no training or model artifact required
/// - O(n) in token count
/// - SipHash13 with fixed seeds keeps vectors stable across Rust versions
///
/// Good enough to exercise the full ranking pipeline and for tests; a real
/// sentence-embedding provider slots in behind the same trait.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_token(&self, token: &str) -> usize {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for raw in text.split_whitespace() {
            let token: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '+' | '#' | '.'))
                .flat_map(char::to_lowercase)
                .collect();
            if token.is_empty() {
                continue;
            }

            let idx = self.hash_token(&token);
            // Sign hashing: even hash of "<token>_sign" adds, odd subtracts.
            let sign = if self.hash_token(&format!("{token}_sign")) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            vector[idx] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn identical_texts_embed_identically() {
        let embedder = HashEmbedder::new(128);
        let texts = vec!["Python machine learning engineer".to_string()];

        let first = embedder.embed(&texts).unwrap();
        let second = embedder.embed(&texts).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn self_similarity_is_one_for_nonzero_vectors() {
        let embedder = HashEmbedder::new(128);
        let vectors = embedder
            .embed(&["distributed systems in Rust".to_string()])
            .unwrap();

        let sim = cosine_similarity(&vectors[0], &vectors[0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn produces_normalized_vectors() {
        let embedder = HashEmbedder::new(64);
        let vectors = embedder.embed(&["data pipelines".to_string()]).unwrap();

        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(64);
        let vectors = embedder.embed(&[String::new()]).unwrap();

        assert!(vectors[0].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn overlapping_texts_score_higher_than_disjoint() {
        let embedder = HashEmbedder::new(256);
        let vectors = embedder
            .embed(&[
                "Python PyTorch NLP research".to_string(),
                "Python PyTorch deep learning".to_string(),
                "COBOL mainframe payroll".to_string(),
            ])
            .unwrap();

        let close = cosine_similarity(&vectors[0], &vectors[1]);
        let far = cosine_similarity(&vectors[0], &vectors[2]);
        assert!(close > far, "expected {close} > {far}");
    }
}
