pub mod hash;
pub mod similarity;
pub mod text;

pub use hash::HashEmbedder;
pub use similarity::cosine_similarity;
pub use text::{job_to_text, resume_to_text};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider '{provider}' failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
}

/// Abstract interface over text-to-vector computation.
///
/// Implementations:
/// - HashEmbedder: feature hashing (deterministic, no model download)
/// - external model providers plug in behind the same trait
///
/// `embed` is a batch call: the ranking layer invokes it once per resume and
/// once per job batch, never once per pair. Implementations must be
/// deterministic for identical input and must return an error rather than
/// block indefinitely when a backing service misbehaves.
pub trait EmbeddingProvider: Send + Sync {
    /// Implementation name ("hash", ...), recorded in evaluation output.
    fn name(&self) -> &'static str;

    /// Embedding dimensionality, fixed per provider instance.
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Provider factory. Unknown names fall back to the hash embedder.
pub fn create_provider(name: &str, dimension: usize) -> Box<dyn EmbeddingProvider> {
    match name {
        "hash" => Box::new(HashEmbedder::new(dimension)),
        other => {
            tracing::warn!(provider = other, "unknown embedding provider; using hash");
            Box::new(HashEmbedder::new(dimension))
        }
    }
}

/// Read provider selection from the environment.
pub fn provider_from_env() -> Box<dyn EmbeddingProvider> {
    let name = std::env::var("JR_EMBEDDING_PROVIDER").unwrap_or_else(|_| "hash".into());
    let dimension = std::env::var("JR_EMBEDDING_DIMENSION")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256);
    create_provider(&name, dimension)
}
