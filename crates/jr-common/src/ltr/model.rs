use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RankingContext;
use crate::ltr::pairwise::PairwiseData;
use crate::ltr::scaler::StandardScaler;
use crate::ranking::features::{FeatureSet, LTR_FEATURE_NAMES, build_features};
use crate::{JobPosting, Resume};

#[derive(Debug, Error)]
pub enum LtrError {
    #[error("cannot train on an empty pairwise sample set")]
    EmptyTrainingSet,
    #[error("pairwise targets collapsed to a single class ({0}); reconstruct with mirroring")]
    SingleClass(u8),
    #[error("model file not found: {0}")]
    MissingModel(PathBuf),
    #[error(
        "persisted feature names {found:?} do not match this build's {expected:?}; \
         scores from the mismatched model would be meaningless"
    )]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("failed to access model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed model file: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Inverse L2 regularization strength. 0.1 keeps the deliberately
    /// correlated feature pair stable.
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tolerance: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            c: 0.1,
            max_iter: 1000,
            learning_rate: 0.5,
            tolerance: 1e-7,
        }
    }
}

/// One job scored by the learned ranker.
#[derive(Debug, Clone)]
pub struct LtrRankedJob<'j> {
    pub job: &'j JobPosting,
    pub features: FeatureSet,
    /// Signed decision value `w·x + b`, not a probability.
    pub score: f64,
    pub rank: usize,
}

/// Pairwise learning-to-rank model: a standard scaler plus an L2-regularized
/// logistic regression fitted on feature-difference vectors.
///
/// A model value only exists after a successful `train` (or `load`), so
/// scoring an unfitted model is unrepresentable; re-training means training
/// a new model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseLtrModel {
    scaler: StandardScaler,
    weights: Vec<f64>,
    bias: f64,
    feature_names: Vec<String>,
}

impl PairwiseLtrModel {
    /// Fit on pairwise difference data. Deterministic full-batch gradient
    /// descent from a zero initialization; no random state involved.
    pub fn train(data: &PairwiseData, options: &TrainOptions) -> Result<Self, LtrError> {
        if data.is_empty() {
            return Err(LtrError::EmptyTrainingSet);
        }
        let classes = data.classes();
        if classes.len() < 2 {
            return Err(LtrError::SingleClass(classes[0]));
        }

        let scaler = StandardScaler::fit(&data.x);
        let x = scaler.transform(&data.x);
        let n = x.len() as f64;
        let n_features = scaler.dimension();
        // sklearn-equivalent penalty: minimizing C·Σ loss + ½‖w‖² matches
        // (1/n)·Σ loss + λ/2·‖w‖² with λ = 1/(C·n). The bias is unpenalized.
        let lambda = 1.0 / (options.c * n);

        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;

        // Step size capped by the Lipschitz bound of the regularized loss
        // ((1/4n)·Σ‖x‖² + λ); a fixed rate diverges when λ is large on small
        // sample sets.
        let lipschitz = x
            .iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            / (4.0 * n)
            + lambda;
        let learning_rate = options.learning_rate.min(1.0 / lipschitz);

        for _ in 0..options.max_iter {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;

            for (row, &label) in x.iter().zip(data.y.iter()) {
                let target = if label == 1 { 1.0 } else { -1.0 };
                let z: f64 = row
                    .iter()
                    .zip(weights.iter())
                    .map(|(xi, wi)| xi * wi)
                    .sum::<f64>()
                    + bias;
                let sigma = 1.0 / (1.0 + (target * z).exp());

                for (acc, xi) in grad_w.iter_mut().zip(row.iter()) {
                    *acc -= target * xi * sigma;
                }
                grad_b -= target * sigma;
            }

            for (acc, wi) in grad_w.iter_mut().zip(weights.iter()) {
                *acc = *acc / n + lambda * wi;
            }
            grad_b /= n;

            let grad_norm: f64 = grad_w
                .iter()
                .chain(std::iter::once(&grad_b))
                .map(|g| g * g)
                .sum::<f64>()
                .sqrt();

            for (wi, gi) in weights.iter_mut().zip(grad_w.iter()) {
                *wi -= learning_rate * gi;
            }
            bias -= learning_rate * grad_b;

            if grad_norm < options.tolerance {
                break;
            }
        }

        Ok(Self {
            scaler,
            weights,
            bias,
            feature_names: LTR_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Vectorize a feature set in the trained feature-name order. Names this
    /// build no longer knows default to 0.0.
    fn vectorize(&self, features: &FeatureSet) -> Vec<f64> {
        self.feature_names
            .iter()
            .map(|name| match name.as_str() {
                "embedding" => features.embedding,
                "skill_overlap" => features.skill_overlap,
                "keyword_bonus" => features.keyword_bonus,
                "gap_penalty" => features.gap_penalty,
                _ => 0.0,
            })
            .collect()
    }

    /// Ranking score for one feature set: the classifier's signed decision
    /// value `w·x + b` on the scaled features. Higher is better.
    pub fn score(&self, features: &FeatureSet) -> f64 {
        let scaled = self.scaler.transform_row(&self.vectorize(features));
        scaled
            .iter()
            .zip(self.weights.iter())
            .map(|(xi, wi)| xi * wi)
            .sum::<f64>()
            + self.bias
    }

    /// Rank a job batch for a resume using the learned scoring function.
    /// Embedding scores are taken from `embedding_cache` (keyed by
    /// (resume_id, job_id)); pairs absent from the cache score 0.0 embedding.
    pub fn rank_jobs<'j>(
        &self,
        resume: &Resume,
        jobs: &'j [JobPosting],
        embedding_cache: &HashMap<(String, String), f64>,
        ctx: &RankingContext,
    ) -> Vec<LtrRankedJob<'j>> {
        let resume_id = resume.resume_id.clone().unwrap_or_default();

        let mut results: Vec<LtrRankedJob<'j>> = jobs
            .iter()
            .map(|job| {
                let job_id = job.job_id.clone().unwrap_or_default();
                let embedding_score = embedding_cache
                    .get(&(resume_id.clone(), job_id))
                    .copied()
                    .unwrap_or(0.0);

                let features =
                    build_features(resume, job, embedding_score, &ctx.config, &ctx.vocab);
                let score = self.score(&features);

                LtrRankedJob {
                    job,
                    features,
                    score,
                    rank: 0,
                }
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        for (idx, result) in results.iter_mut().enumerate() {
            result.rank = idx + 1;
        }
        results
    }

    /// Persist scaler, classifier parameters, and the feature-name list as
    /// one blob.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LtrError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Load a persisted model. A missing file is a reported error, and a
    /// feature-name list that disagrees with this build's contract is
    /// rejected outright; the mismatch is logged and the model is never
    /// handed to callers.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LtrError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LtrError::MissingModel(path.to_path_buf()));
        }

        let model: Self = serde_json::from_slice(&fs::read(path)?)?;

        let expected: Vec<String> = LTR_FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        if model.feature_names != expected {
            tracing::warn!(
                path = %path.display(),
                expected = ?expected,
                found = ?model.feature_names,
                "persisted model feature names do not match the current feature contract"
            );
            return Err(LtrError::FeatureMismatch {
                expected,
                found: model.feature_names,
            });
        }

        Ok(model)
    }

    /// Learned coefficients by feature name, for inspection.
    pub fn feature_weights(&self) -> BTreeMap<String, f64> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.weights.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::skills::SkillVocabulary;

    /// Pairwise data where the winner always has the higher embedding and
    /// keyword bonus: positive differences labeled 1, mirrored negatives 0.
    fn separable_data() -> PairwiseData {
        let mut data = PairwiseData::default();
        let diffs = [
            [0.5, 0.3],
            [0.4, 0.2],
            [0.6, 0.5],
            [0.3, 0.1],
            [0.7, 0.4],
        ];
        for diff in diffs {
            data.x.push(diff.to_vec());
            data.y.push(1);
            data.x.push(diff.iter().map(|v| -v).collect());
            data.y.push(0);
        }
        data
    }

    fn features(embedding: f64, keyword_bonus: f64) -> FeatureSet {
        FeatureSet {
            embedding,
            skill_overlap: 0.0,
            keyword_bonus,
            gap_penalty: 0.0,
        }
    }

    #[test]
    fn empty_training_set_is_an_error() {
        let err = PairwiseLtrModel::train(&PairwiseData::default(), &TrainOptions::default())
            .unwrap_err();
        assert!(matches!(err, LtrError::EmptyTrainingSet));
    }

    #[test]
    fn single_class_is_an_error() {
        let mut data = PairwiseData::default();
        data.x.push(vec![0.5, 0.3]);
        data.y.push(1);

        let err = PairwiseLtrModel::train(&data, &TrainOptions::default()).unwrap_err();
        assert!(matches!(err, LtrError::SingleClass(1)));
    }

    #[test]
    fn learns_to_prefer_stronger_features() {
        let model = PairwiseLtrModel::train(&separable_data(), &TrainOptions::default()).unwrap();

        let strong = model.score(&features(0.9, 0.8));
        let weak = model.score(&features(0.2, 0.1));
        assert!(strong > weak, "expected {strong} > {weak}");
    }

    #[test]
    fn learned_weights_are_positive_for_preferred_directions() {
        let model = PairwiseLtrModel::train(&separable_data(), &TrainOptions::default()).unwrap();

        let weights = model.feature_weights();
        assert!(weights["embedding"] > 0.0);
        assert!(weights["keyword_bonus"] > 0.0);
    }

    #[test]
    fn save_load_round_trip_preserves_scores() {
        let model = PairwiseLtrModel::train(&separable_data(), &TrainOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/ltr_logreg.json");

        model.save(&path).unwrap();
        let loaded = PairwiseLtrModel::load(&path).unwrap();

        let input = features(0.6, 0.4);
        assert_eq!(model.score(&input), loaded.score(&input));
    }

    #[test]
    fn loading_missing_path_is_reported() {
        let err = PairwiseLtrModel::load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, LtrError::MissingModel(_)));
    }

    #[test]
    fn loading_mismatched_feature_names_is_rejected() {
        let model = PairwiseLtrModel::train(&separable_data(), &TrainOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let mut stale = model.clone();
        stale.feature_names = vec!["embedding".into(), "gap_penalty".into()];
        stale.save(&path).unwrap();

        let err = PairwiseLtrModel::load(&path).unwrap_err();
        assert!(matches!(err, LtrError::FeatureMismatch { .. }));
    }

    #[test]
    fn rank_jobs_sorts_by_score_with_stable_ties() {
        let model = PairwiseLtrModel::train(&separable_data(), &TrainOptions::default()).unwrap();
        let ctx = RankingContext::new(
            RankingConfig::default(),
            SkillVocabulary::from_terms(["Python", "PyTorch"]),
        );
        let resume = Resume {
            resume_id: Some("r1".into()),
            skills: vec!["Python".into(), "PyTorch".into()],
            ..Resume::default()
        };
        let jobs = vec![
            JobPosting {
                job_id: Some("weak".into()),
                skills: vec![],
                ..JobPosting::default()
            },
            JobPosting {
                job_id: Some("strong".into()),
                skills: vec!["Python".into(), "PyTorch".into()],
                ..JobPosting::default()
            },
        ];

        let mut cache = HashMap::new();
        cache.insert(("r1".to_string(), "weak".to_string()), 0.1);
        cache.insert(("r1".to_string(), "strong".to_string()), 0.9);

        let ranked = model.rank_jobs(&resume, &jobs, &cache, &ctx);
        assert_eq!(ranked[0].job.job_id.as_deref(), Some("strong"));
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert!(ranked[0].score > ranked[1].score);
    }
}
