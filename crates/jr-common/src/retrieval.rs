use std::cmp::Ordering;

use crate::JobPosting;
use crate::Resume;
use crate::embedding::{EmbeddingError, EmbeddingProvider, cosine_similarity, job_to_text, resume_to_text};

/// One job scored by embedding similarity against a resume.
#[derive(Debug, Clone)]
pub struct EmbeddingMatch<'j> {
    pub job: &'j JobPosting,
    /// Raw cosine similarity, [-1, 1] in theory, typically [0, 1].
    pub score: f64,
    /// 1-based position after sorting by descending score.
    pub rank: usize,
}

/// Embedding-based retrieval: one provider call for the resume, one for the
/// whole job batch, cosine per pair, stable descending sort.
pub struct SimilarityScorer<'a> {
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> SimilarityScorer<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider) -> Self {
        Self { provider }
    }

    /// Rank `jobs` by semantic similarity to `resume`, truncated to `top_k`.
    /// An empty job list yields an empty result. Ties keep input order.
    pub fn rank_jobs<'j>(
        &self,
        resume: &Resume,
        jobs: &'j [JobPosting],
        top_k: usize,
    ) -> Result<Vec<EmbeddingMatch<'j>>, EmbeddingError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let resume_vectors = self.provider.embed(&[resume_to_text(resume)])?;
        let job_texts: Vec<String> = jobs.iter().map(job_to_text).collect();
        let job_vectors = self.provider.embed(&job_texts)?;

        let mut matches: Vec<EmbeddingMatch<'j>> = jobs
            .iter()
            .zip(job_vectors.iter())
            .map(|(job, vector)| EmbeddingMatch {
                job,
                score: f64::from(cosine_similarity(&resume_vectors[0], vector)),
                rank: 0,
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(top_k);
        for (idx, item) in matches.iter_mut().enumerate() {
            item.rank = idx + 1;
        }

        Ok(matches)
    }
}
