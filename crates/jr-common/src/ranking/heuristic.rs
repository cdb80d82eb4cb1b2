use std::cmp::Ordering;

use serde::Serialize;

use crate::config::{RankingConfig, RankingContext};
use crate::ranking::features::{FeatureSet, build_features};
use crate::skills::{merge_resume_skills, normalize_skills};
use crate::{JobPosting, Resume};

/// Input to the heuristic ranker: a job plus its pre-computed embedding score.
#[derive(Debug, Clone)]
pub struct JobWithScore<'j> {
    pub job: &'j JobPosting,
    pub embedding_score: f64,
}

/// One fully scored job with its explainable breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RankedJob<'j> {
    pub job: &'j JobPosting,
    pub features: FeatureSet,
    pub final_score: f64,
    /// 1-based position after sorting; ties keep input order.
    pub rank: usize,
    pub matched_skills: Vec<String>,
    pub gap_skills: Vec<String>,
}

/// Explainable re-ranking on top of embedding retrieval: a weighted linear
/// combination of the feature set, with the gap penalty always subtracted.
pub struct HeuristicRanker<'a> {
    ctx: &'a RankingContext,
}

impl<'a> HeuristicRanker<'a> {
    pub fn new(ctx: &'a RankingContext) -> Self {
        Self { ctx }
    }

    /// Re-rank a job batch using the explainable features.
    ///
    /// The vocabulary is expanded with every skill literally present in this
    /// batch exactly once, before any job is scored; the same expanded
    /// vocabulary is used for every feature and for the matched/gap sets, so
    /// a later explanation pass over the same batch sees identical values.
    pub fn rank_with_features<'j>(
        &self,
        resume: &Resume,
        scored_jobs: &[JobWithScore<'j>],
    ) -> Vec<RankedJob<'j>> {
        let batch: Vec<JobPosting> = scored_jobs.iter().map(|s| s.job.clone()).collect();
        let vocab = self.ctx.vocab.expanded_with_job_skills(&batch);
        let config = &self.ctx.config;
        let weights = &config.weights;

        let merged = merge_resume_skills(resume, &vocab);
        let resume_skills = normalize_skills(&merged, &vocab);

        let mut results: Vec<RankedJob<'j>> = scored_jobs
            .iter()
            .map(|scored| {
                let features =
                    build_features(resume, scored.job, scored.embedding_score, config, &vocab);

                let final_score = weights.embedding * features.embedding
                    + weights.skill_overlap * features.skill_overlap
                    + weights.keyword_bonus * features.keyword_bonus
                    - weights.gap_penalty * features.gap_penalty;

                let job_skills = normalize_skills(&scored.job.skills, &vocab);
                let mut matched_skills: Vec<String> =
                    resume_skills.intersection(&job_skills).cloned().collect();
                matched_skills.sort();
                let mut gap_skills: Vec<String> =
                    job_skills.difference(&resume_skills).cloned().collect();
                gap_skills.sort();

                RankedJob {
                    job: scored.job,
                    features,
                    final_score,
                    rank: 0,
                    matched_skills,
                    gap_skills,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
        });
        for (idx, result) in results.iter_mut().enumerate() {
            result.rank = idx + 1;
        }

        results
    }
}

/// Human-readable breakdown of why a job ranked where it did. Presentation
/// only; never feeds back into scoring.
pub fn explain_ranking(result: &RankedJob<'_>, config: &RankingConfig) -> String {
    let weights = &config.weights;
    let matched_preview = preview(&result.matched_skills, 5);
    let gap_preview = if result.gap_skills.is_empty() {
        "None".to_string()
    } else {
        preview(&result.gap_skills, 5)
    };

    [
        format!("[{}] ranked #{} for the following reasons:", result.job.title, result.rank),
        String::new(),
        format!(
            "1. Semantic similarity: {:.3} (weight: {})",
            result.features.embedding, weights.embedding
        ),
        "   - How closely the job description aligns with the resume content".to_string(),
        String::new(),
        format!(
            "2. Skill coverage: {:.3} (weight: {})",
            result.features.skill_overlap, weights.skill_overlap
        ),
        format!(
            "   - Matched skills ({}): {}",
            result.matched_skills.len(),
            matched_preview
        ),
        format!(
            "   - Missing skills ({}): {}",
            result.gap_skills.len(),
            gap_preview
        ),
        String::new(),
        format!(
            "3. Keyword bonus: {:.3} (weight: {})",
            result.features.keyword_bonus, weights.keyword_bonus
        ),
        "   - Credit for matching high-priority skills".to_string(),
        String::new(),
        format!(
            "4. Gap penalty: {:.3} (weight: {})",
            result.features.gap_penalty, weights.gap_penalty
        ),
        "   - Deduction for missing critical skills".to_string(),
        String::new(),
        format!("Overall score: {:.3}", result.final_score),
    ]
    .join("\n")
}

fn preview(items: &[String], limit: usize) -> String {
    items
        .iter()
        .take(limit)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillVocabulary;

    fn context() -> RankingContext {
        RankingContext::new(
            RankingConfig::default(),
            SkillVocabulary::from_terms(["Python", "PyTorch", "SQL", "Docker"]),
        )
    }

    fn resume() -> Resume {
        Resume {
            resume_id: Some("r1".into()),
            education: "MSc".into(),
            projects: String::new(),
            experience: String::new(),
            skills: vec!["Python".into(), "PyTorch".into()],
        }
    }

    fn job(id: &str, skills: &[&str]) -> JobPosting {
        JobPosting {
            job_id: Some(id.into()),
            title: format!("Job {id}"),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            ..JobPosting::default()
        }
    }

    #[test]
    fn better_skill_match_outranks_weaker_at_equal_embedding() {
        let ctx = context();
        let ranker = HeuristicRanker::new(&ctx);
        let strong = job("strong", &["Python", "PyTorch"]);
        let weak = job("weak", &["SQL", "Docker"]);

        let ranked = ranker.rank_with_features(
            &resume(),
            &[
                JobWithScore { job: &weak, embedding_score: 0.5 },
                JobWithScore { job: &strong, embedding_score: 0.5 },
            ],
        );

        assert_eq!(ranked[0].job.job_id.as_deref(), Some("strong"));
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn ties_keep_input_order() {
        let ctx = context();
        let ranker = HeuristicRanker::new(&ctx);
        let first = job("first", &["Python"]);
        let second = job("second", &["Python"]);

        let ranked = ranker.rank_with_features(
            &resume(),
            &[
                JobWithScore { job: &first, embedding_score: 0.5 },
                JobWithScore { job: &second, embedding_score: 0.5 },
            ],
        );

        assert_eq!(ranked[0].job.job_id.as_deref(), Some("first"));
        assert_eq!(ranked[1].job.job_id.as_deref(), Some("second"));
    }

    #[test]
    fn batch_vocab_expansion_counts_unlisted_job_skills() {
        // "Kubeflow" is not in the base vocabulary; expansion from the job
        // batch must make it visible to overlap and gap accounting.
        let ctx = context();
        let ranker = HeuristicRanker::new(&ctx);
        let with_novel_skill = job("novel", &["Kubeflow"]);

        let ranked = ranker.rank_with_features(
            &resume(),
            &[JobWithScore { job: &with_novel_skill, embedding_score: 0.5 }],
        );

        assert_eq!(ranked[0].gap_skills, vec!["Kubeflow".to_string()]);
        assert!(ranked[0].features.gap_penalty > 0.0);
    }

    #[test]
    fn gap_penalty_lowers_final_score() {
        let ctx = context();
        let ranker = HeuristicRanker::new(&ctx);
        let no_gaps = job("clean", &["Python"]);
        let with_gaps = job("gappy", &["Python", "SQL", "Docker"]);

        let ranked = ranker.rank_with_features(
            &resume(),
            &[
                JobWithScore { job: &no_gaps, embedding_score: 0.5 },
                JobWithScore { job: &with_gaps, embedding_score: 0.5 },
            ],
        );

        let clean = ranked.iter().find(|r| r.job.job_id.as_deref() == Some("clean")).unwrap();
        let gappy = ranked.iter().find(|r| r.job.job_id.as_deref() == Some("gappy")).unwrap();
        assert!(gappy.features.gap_penalty > 0.0);
        assert!(clean.features.gap_penalty == 0.0);
    }

    #[test]
    fn explanation_mentions_each_component() {
        let ctx = context();
        let ranker = HeuristicRanker::new(&ctx);
        let top = job("top", &["Python", "PyTorch"]);

        let ranked = ranker.rank_with_features(
            &resume(),
            &[JobWithScore { job: &top, embedding_score: 0.9 }],
        );
        let text = explain_ranking(&ranked[0], &ctx.config);

        assert!(text.contains("Semantic similarity"));
        assert!(text.contains("Skill coverage"));
        assert!(text.contains("Keyword bonus"));
        assert!(text.contains("Gap penalty"));
        assert!(text.contains("Overall score"));
    }
}
