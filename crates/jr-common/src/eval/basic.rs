use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RankingContext;
use crate::embedding::EmbeddingProvider;
use crate::eval::loocv::EvalError;
use crate::eval::metrics::{GainMode, metrics_for_resume};
use crate::labels::{LabelRecord, LabelScale, label_map_for_resume, validate_scale};
use crate::ranking::heuristic::{HeuristicRanker, JobWithScore};
use crate::retrieval::SimilarityScorer;
use crate::{JobPosting, Resume};

/// Whole-set evaluation of the production (heuristic) ranking against 0-3
/// labels, without cross-validation.
#[derive(Debug, Clone)]
pub struct BasicEvalOptions {
    pub top_k: usize,
    pub k_values: Vec<usize>,
    pub scale: LabelScale,
    pub gain: GainMode,
}

impl Default for BasicEvalOptions {
    fn default() -> Self {
        Self {
            top_k: 15,
            k_values: vec![5, 10, 15],
            scale: LabelScale::ZeroToThree,
            gain: GainMode::Linear,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicEvalResults {
    pub n_resumes: usize,
    pub n_jobs: usize,
    pub n_evaluated: usize,
    pub n_skipped: usize,
    /// metric name → mean across evaluated resumes.
    pub aggregated_metrics: BTreeMap<String, f64>,
    pub per_resume_metrics: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Rank all jobs for each resume (embedding retrieval + heuristic re-rank),
/// keep the top K, and score against that resume's labels. Resumes without
/// any labels are skipped with a warning; metric means are taken over the
/// evaluated resumes only.
pub fn run_basic_eval(
    ctx: &RankingContext,
    provider: &dyn EmbeddingProvider,
    resumes: &[Resume],
    jobs: &[JobPosting],
    labels: &[LabelRecord],
    options: &BasicEvalOptions,
) -> Result<BasicEvalResults, EvalError> {
    for (idx, resume) in resumes.iter().enumerate() {
        if resume.resume_id.as_deref().unwrap_or("").is_empty() {
            return Err(EvalError::MissingResumeId(idx));
        }
    }
    validate_scale(labels, options.scale)?;

    let scorer = SimilarityScorer::new(provider);
    let ranker = HeuristicRanker::new(ctx);

    let mut per_resume_metrics = BTreeMap::new();
    let mut skipped = 0usize;

    for resume in resumes {
        let resume_id = resume.resume_id.clone().unwrap_or_default();
        let resume_labels = label_map_for_resume(labels, &resume_id);
        if resume_labels.is_empty() {
            tracing::warn!(resume_id = %resume_id, "no labels for resume; skipping");
            skipped += 1;
            continue;
        }

        let embedding_matches = scorer.rank_jobs(resume, jobs, jobs.len())?;
        let scored: Vec<JobWithScore<'_>> = embedding_matches
            .iter()
            .map(|m| JobWithScore {
                job: m.job,
                embedding_score: m.score,
            })
            .collect();

        let ranked_ids: Vec<String> = ranker
            .rank_with_features(resume, &scored)
            .into_iter()
            .take(options.top_k)
            .map(|r| r.job.job_id.clone().unwrap_or_default())
            .collect();

        let metrics = metrics_for_resume(
            &ranked_ids,
            &resume_labels,
            &options.k_values,
            options.scale,
            options.gain,
        );
        per_resume_metrics.insert(resume_id, metrics);
    }

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for metrics in per_resume_metrics.values() {
        for (name, value) in metrics {
            let slot = sums.entry(name.clone()).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }
    let aggregated_metrics = sums
        .into_iter()
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect();

    Ok(BasicEvalResults {
        n_resumes: resumes.len(),
        n_jobs: jobs.len(),
        n_evaluated: per_resume_metrics.len(),
        n_skipped: skipped,
        aggregated_metrics,
        per_resume_metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::embedding::HashEmbedder;
    use crate::skills::SkillVocabulary;

    fn context() -> RankingContext {
        RankingContext::new(
            RankingConfig::default(),
            SkillVocabulary::from_terms(["Python", "SQL"]),
        )
    }

    fn resume(id: &str) -> Resume {
        Resume {
            resume_id: Some(id.into()),
            skills: vec!["Python".into()],
            ..Resume::default()
        }
    }

    fn job(id: &str) -> JobPosting {
        JobPosting {
            job_id: Some(id.into()),
            title: id.into(),
            skills: vec!["Python".into()],
            ..JobPosting::default()
        }
    }

    fn label(resume_id: &str, job_id: &str, value: i32) -> LabelRecord {
        LabelRecord {
            resume_id: resume_id.into(),
            job_id: job_id.into(),
            label: value,
            confidence: 1.0,
            evidence: vec![],
            notes: String::new(),
        }
    }

    #[test]
    fn skips_unlabeled_resumes_and_averages_the_rest() {
        let ctx = context();
        let provider = HashEmbedder::new(64);
        let resumes = vec![resume("r1"), resume("unlabeled")];
        let jobs = vec![job("j1"), job("j2")];
        let labels = vec![label("r1", "j1", 3), label("r1", "j2", 0)];

        let results = run_basic_eval(
            &ctx,
            &provider,
            &resumes,
            &jobs,
            &labels,
            &BasicEvalOptions::default(),
        )
        .unwrap();

        assert_eq!(results.n_evaluated, 1);
        assert_eq!(results.n_skipped, 1);
        assert!(results.per_resume_metrics.contains_key("r1"));
        assert!(results.aggregated_metrics.contains_key("precision@5"));
    }

    #[test]
    fn rejects_labels_outside_the_zero_to_three_scale() {
        let ctx = context();
        let provider = HashEmbedder::new(64);
        let resumes = vec![resume("r1")];
        let jobs = vec![job("j1")];
        let labels = vec![label("r1", "j1", 5)];

        let err = run_basic_eval(
            &ctx,
            &provider,
            &resumes,
            &jobs,
            &labels,
            &BasicEvalOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::Scale(_)));
    }

    #[test]
    fn truncates_recommendations_to_top_k() {
        let ctx = context();
        let provider = HashEmbedder::new(64);
        let resumes = vec![resume("r1")];
        let jobs: Vec<JobPosting> = (0..5).map(|i| job(&format!("j{i}"))).collect();
        let labels: Vec<LabelRecord> = (0..5)
            .map(|i| label("r1", &format!("j{i}"), 2))
            .collect();

        let options = BasicEvalOptions {
            top_k: 2,
            k_values: vec![2],
            ..BasicEvalOptions::default()
        };
        let results =
            run_basic_eval(&ctx, &provider, &resumes, &jobs, &labels, &options).unwrap();

        let metrics = &results.per_resume_metrics["r1"];
        assert!((metrics["precision@2"] - 1.0).abs() < 1e-12);
    }
}
