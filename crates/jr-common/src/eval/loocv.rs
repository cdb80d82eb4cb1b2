use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use thiserror::Error;

use crate::config::RankingContext;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::eval::metrics::{GainMode, MetricSummary, metrics_for_resume};
use crate::labels::{CoverageError, LabelRecord, LabelScale, ScaleError, label_map_for_resume, validate_coverage, validate_scale};
use crate::ltr::{PairwiseLtrModel, TrainOptions, check_sufficient_pairs, construct_pairwise_data};
use crate::ranking::heuristic::{HeuristicRanker, JobWithScore};
use crate::ranking::features::build_features;
use crate::retrieval::SimilarityScorer;
use crate::{JobPosting, Resume};

/// Ranking variants compared by the ablation study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RankingVariant {
    EmbeddingOnly,
    Heuristic,
    LtrLogreg,
}

/// Variant key recorded when LTR could not be trained for a fold and the
/// heuristic ranking was substituted. Never mislabeled as "ltr_logreg".
pub const LTR_FALLBACK_KEY: &str = "ltr_logreg_fallback";

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("resume at position {0} has no resume_id; evaluation requires identifiers")]
    MissingResumeId(usize),
    #[error("job at position {0} has no job_id; evaluation requires identifiers")]
    MissingJobId(usize),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Coverage(#[from] CoverageError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub min_rel_diff: i32,
    pub min_pairs: usize,
    pub k_values: Vec<usize>,
    pub scale: LabelScale,
    pub gain: GainMode,
    pub train: TrainOptions,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            min_rel_diff: 2,
            min_pairs: 10,
            k_values: vec![5, 10],
            scale: LabelScale::OneToFive,
            gain: GainMode::Exponential,
            train: TrainOptions::default(),
        }
    }
}

/// Metrics for one held-out resume, keyed variant → metric name → value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub test_resume_id: String,
    pub metrics: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AblationResults {
    pub generated_at: DateTime<Utc>,
    pub n_folds: usize,
    pub n_jobs: usize,
    pub per_fold_results: Vec<FoldResult>,
    /// variant → metric name → mean/std/values across folds.
    pub aggregated_results: BTreeMap<String, BTreeMap<String, MetricSummary>>,
}

/// LOOCV + ablation evaluation over resumes.
///
/// Embedding scores for every (resume, job) pair are computed once before
/// the fold loop and shared read-only across folds; nothing mutates the
/// cache mid-evaluation.
pub struct EvaluationEngine<'a> {
    ctx: &'a RankingContext,
    provider: &'a dyn EmbeddingProvider,
    options: EvalOptions,
}

impl<'a> EvaluationEngine<'a> {
    pub fn new(
        ctx: &'a RankingContext,
        provider: &'a dyn EmbeddingProvider,
        options: EvalOptions,
    ) -> Self {
        Self {
            ctx,
            provider,
            options,
        }
    }

    pub fn run(
        &self,
        resumes: &[Resume],
        jobs: &[JobPosting],
        labels: &[LabelRecord],
    ) -> Result<AblationResults, EvalError> {
        for (idx, resume) in resumes.iter().enumerate() {
            if resume.resume_id.as_deref().unwrap_or("").is_empty() {
                return Err(EvalError::MissingResumeId(idx));
            }
        }
        for (idx, job) in jobs.iter().enumerate() {
            if job.job_id.as_deref().unwrap_or("").is_empty() {
                return Err(EvalError::MissingJobId(idx));
            }
        }
        validate_scale(labels, self.options.scale)?;
        // Metrics over partial coverage are misleading; abort instead.
        validate_coverage(labels, resumes, jobs)?;

        let embedding_cache = self.precompute_embedding_cache(resumes, jobs)?;
        tracing::info!(
            pairs = embedding_cache.len(),
            provider = self.provider.name(),
            "embedding cache ready"
        );

        let mut per_fold_results = Vec::with_capacity(resumes.len());
        for (idx, test_resume) in resumes.iter().enumerate() {
            let test_resume_id = test_resume.resume_id.clone().unwrap_or_default();
            tracing::info!(fold = idx + 1, total = resumes.len(), resume_id = %test_resume_id, "evaluating fold");

            let metrics = self.evaluate_fold(test_resume, resumes, jobs, labels, &embedding_cache);
            per_fold_results.push(FoldResult {
                fold: idx + 1,
                test_resume_id,
                metrics,
            });
        }

        let aggregated_results = aggregate(&per_fold_results);

        Ok(AblationResults {
            generated_at: Utc::now(),
            n_folds: resumes.len(),
            n_jobs: jobs.len(),
            per_fold_results,
            aggregated_results,
        })
    }

    fn precompute_embedding_cache(
        &self,
        resumes: &[Resume],
        jobs: &[JobPosting],
    ) -> Result<HashMap<(String, String), f64>, EvalError> {
        let scorer = SimilarityScorer::new(self.provider);
        let mut cache = HashMap::with_capacity(resumes.len() * jobs.len());
        for resume in resumes {
            let resume_id = resume.resume_id.clone().unwrap_or_default();
            for matched in scorer.rank_jobs(resume, jobs, jobs.len())? {
                let job_id = matched.job.job_id.clone().unwrap_or_default();
                cache.insert((resume_id.clone(), job_id), matched.score);
            }
        }
        Ok(cache)
    }

    fn evaluate_fold(
        &self,
        test_resume: &Resume,
        resumes: &[Resume],
        jobs: &[JobPosting],
        labels: &[LabelRecord],
        embedding_cache: &HashMap<(String, String), f64>,
    ) -> BTreeMap<String, BTreeMap<String, f64>> {
        let test_resume_id = test_resume.resume_id.as_deref().unwrap_or_default();
        let test_labels = label_map_for_resume(labels, test_resume_id);

        // Feature vectors for every (train resume, job) pair, in the LTR
        // feature order.
        let mut train_features: HashMap<(String, String), Vec<f64>> = HashMap::new();
        for resume in resumes {
            let resume_id = resume.resume_id.as_deref().unwrap_or_default();
            if resume_id == test_resume_id {
                continue;
            }
            for job in jobs {
                let job_id = job.job_id.as_deref().unwrap_or_default();
                let key = (resume_id.to_string(), job_id.to_string());
                let embedding_score = embedding_cache.get(&key).copied().unwrap_or(0.0);
                let features = build_features(
                    resume,
                    job,
                    embedding_score,
                    &self.ctx.config,
                    &self.ctx.vocab,
                );
                train_features.insert(key, features.ltr_vector().to_vec());
            }
        }

        let train_labels: Vec<LabelRecord> = labels
            .iter()
            .filter(|l| l.resume_id != test_resume_id)
            .cloned()
            .collect();
        let pairwise =
            construct_pairwise_data(&train_labels, &train_features, self.options.min_rel_diff, true);

        let ltr_model = if check_sufficient_pairs(&pairwise, self.options.min_pairs) {
            match PairwiseLtrModel::train(&pairwise, &self.options.train) {
                Ok(model) => Some(model),
                Err(err) => {
                    tracing::warn!(resume_id = %test_resume_id, error = %err, "LTR training failed; falling back to heuristic");
                    None
                }
            }
        } else {
            tracing::warn!(
                resume_id = %test_resume_id,
                pairs = pairwise.len(),
                min_pairs = self.options.min_pairs,
                "insufficient pairwise samples; falling back to heuristic"
            );
            None
        };

        let mut fold_metrics = BTreeMap::new();
        for variant in [
            RankingVariant::EmbeddingOnly,
            RankingVariant::Heuristic,
            RankingVariant::LtrLogreg,
        ] {
            // The fallback substitution is explicit in the output key.
            let (key, ranked_ids) = match (variant, &ltr_model) {
                (RankingVariant::LtrLogreg, None) => (
                    LTR_FALLBACK_KEY.to_string(),
                    self.rank_variant(RankingVariant::Heuristic, test_resume, jobs, None, embedding_cache),
                ),
                (variant, model) => (
                    variant.as_ref().to_string(),
                    self.rank_variant(variant, test_resume, jobs, model.as_ref(), embedding_cache),
                ),
            };

            let metrics = metrics_for_resume(
                &ranked_ids,
                &test_labels,
                &self.options.k_values,
                self.options.scale,
                self.options.gain,
            );
            fold_metrics.insert(key, metrics);
        }
        fold_metrics
    }

    fn rank_variant(
        &self,
        variant: RankingVariant,
        resume: &Resume,
        jobs: &[JobPosting],
        ltr_model: Option<&PairwiseLtrModel>,
        embedding_cache: &HashMap<(String, String), f64>,
    ) -> Vec<String> {
        let resume_id = resume.resume_id.as_deref().unwrap_or_default();
        let scored: Vec<JobWithScore<'_>> = jobs
            .iter()
            .map(|job| {
                let job_id = job.job_id.as_deref().unwrap_or_default();
                let score = embedding_cache
                    .get(&(resume_id.to_string(), job_id.to_string()))
                    .copied()
                    .unwrap_or(0.0);
                JobWithScore {
                    job,
                    embedding_score: score,
                }
            })
            .collect();

        match variant {
            RankingVariant::EmbeddingOnly => {
                let mut ordered: Vec<(&JobPosting, f64)> =
                    scored.iter().map(|s| (s.job, s.embedding_score)).collect();
                ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
                ordered
                    .into_iter()
                    .map(|(job, _)| job.job_id.clone().unwrap_or_default())
                    .collect()
            }
            RankingVariant::Heuristic => {
                let ranker = HeuristicRanker::new(self.ctx);
                ranker
                    .rank_with_features(resume, &scored)
                    .into_iter()
                    .map(|r| r.job.job_id.clone().unwrap_or_default())
                    .collect()
            }
            RankingVariant::LtrLogreg => {
                let model = ltr_model.expect("ltr variant requires a trained model");
                model
                    .rank_jobs(resume, jobs, embedding_cache, self.ctx)
                    .into_iter()
                    .map(|r| r.job.job_id.clone().unwrap_or_default())
                    .collect()
            }
        }
    }
}

fn aggregate(folds: &[FoldResult]) -> BTreeMap<String, BTreeMap<String, MetricSummary>> {
    let mut collected: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
    for fold in folds {
        for (variant, metrics) in &fold.metrics {
            let slot = collected.entry(variant.clone()).or_default();
            for (name, value) in metrics {
                slot.entry(name.clone()).or_default().push(*value);
            }
        }
    }

    collected
        .into_iter()
        .map(|(variant, metrics)| {
            let summaries = metrics
                .into_iter()
                .map(|(name, values)| (name, MetricSummary::from_values(values)))
                .collect();
            (variant, summaries)
        })
        .collect()
}
