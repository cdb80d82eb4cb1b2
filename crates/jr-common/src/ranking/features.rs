use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{GapPolicy, KeywordPolicy, RankingConfig};
use crate::skills::{SkillVocabulary, is_soft_skill, merge_resume_skills, normalize_skills};
use crate::{JobPosting, Resume};

/// Full feature order, shared by the heuristic ranker and diagnostics.
/// DO NOT reorder: any serialized model is keyed to this declaration order.
pub const FEATURE_NAMES: [&str; 4] = [
    "embedding",
    "skill_overlap",
    "keyword_bonus",
    "gap_penalty",
];

/// Reduced subset used by the learned ranker. Fixed by configuration, not
/// derived at runtime: skill_overlap and gap_penalty are nearly collinear
/// with keyword_bonus on our data, so the model keeps the two features that
/// stay informative under L2 regularization.
pub const LTR_FEATURE_NAMES: [&str; 2] = ["embedding", "keyword_bonus"];

/// Fixed-schema feature vector for one (resume, job) pair. A struct rather
/// than a keyed map, so the field set and its order are checked at compile
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub embedding: f64,
    pub skill_overlap: f64,
    pub keyword_bonus: f64,
    pub gap_penalty: f64,
}

impl FeatureSet {
    /// Values in `FEATURE_NAMES` order.
    pub fn full_vector(&self) -> [f64; 4] {
        [
            self.embedding,
            self.skill_overlap,
            self.keyword_bonus,
            self.gap_penalty,
        ]
    }

    /// Values in `LTR_FEATURE_NAMES` order.
    pub fn ltr_vector(&self) -> [f64; 2] {
        [self.embedding, self.keyword_bonus]
    }
}

/// Fraction of the job's required skills present in the resume skill set.
/// Jobs with no skills short-circuit to 0.0.
pub fn skill_overlap(resume_skills: &HashSet<String>, job_skills: &HashSet<String>) -> f64 {
    if job_skills.is_empty() {
        return 0.0;
    }
    let matched = resume_skills.intersection(job_skills).count();
    matched as f64 / job_skills.len() as f64
}

/// Weighted count of matched skills, with high-priority keywords counting
/// `multiplier` instead of 1, normalized by `max_keywords` and clamped to
/// [0, 1].
pub fn keyword_bonus(
    resume_skills: &HashSet<String>,
    job_skills: &HashSet<String>,
    policy: &KeywordPolicy,
    max_keywords: usize,
) -> f64 {
    if max_keywords == 0 {
        return 0.0;
    }

    let high_priority: HashSet<String> = policy
        .high_priority
        .iter()
        .map(|k| k.to_lowercase())
        .collect();

    let mut bonus = 0.0;
    for skill in resume_skills.intersection(job_skills) {
        if high_priority.contains(&skill.to_lowercase()) {
            bonus += policy.high_priority_multiplier;
        } else {
            bonus += 1.0;
        }
    }

    (bonus / max_keywords as f64).min(1.0)
}

/// Weighted count of job skills absent from the resume, soft skills excluded
/// before accumulation, critical skills counting `multiplier` instead of 1,
/// normalized by `max_gaps` and clamped to [0, 1].
pub fn gap_penalty(
    resume_skills: &HashSet<String>,
    job_skills: &HashSet<String>,
    policy: &GapPolicy,
    max_gaps: usize,
) -> f64 {
    if max_gaps == 0 {
        return 0.0;
    }

    let critical: HashSet<String> = policy
        .critical_skills
        .iter()
        .map(|s| s.to_lowercase())
        .collect();

    let mut penalty = 0.0;
    for skill in job_skills.difference(resume_skills) {
        if is_soft_skill(skill) {
            continue;
        }
        if critical.contains(&skill.to_lowercase()) {
            penalty += policy.critical_penalty_multiplier;
        } else {
            penalty += 1.0;
        }
    }

    (penalty / max_gaps as f64).min(1.0)
}

/// Build the feature set for one (resume, job) pair. Resume skills are merged
/// with skills extracted from the resume text, then both sides are normalized
/// against `vocab` before the set features are computed.
///
/// Callers that expand the vocabulary for a job batch must pass the same
/// expanded vocabulary here and when later re-deriving features for that
/// batch.
pub fn build_features(
    resume: &Resume,
    job: &JobPosting,
    embedding_score: f64,
    config: &RankingConfig,
    vocab: &SkillVocabulary,
) -> FeatureSet {
    let merged = merge_resume_skills(resume, vocab);
    let resume_skills = normalize_skills(&merged, vocab);
    let job_skills = normalize_skills(&job.skills, vocab);

    FeatureSet {
        embedding: embedding_score,
        skill_overlap: skill_overlap(&resume_skills, &job_skills),
        keyword_bonus: keyword_bonus(
            &resume_skills,
            &job_skills,
            &config.keywords,
            config.normalization.max_keywords,
        ),
        gap_penalty: gap_penalty(
            &resume_skills,
            &job_skills,
            &config.gap_penalty,
            config.normalization.max_gaps,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn overlap_with_empty_job_skills_is_zero() {
        let resume = set(&["Python"]);
        let job = set(&[]);

        assert_eq!(skill_overlap(&resume, &job), 0.0);
    }

    #[test]
    fn overlap_is_fraction_of_job_skills() {
        let resume = set(&["Python", "SQL"]);
        let job = set(&["Python", "SQL", "Docker", "Kafka"]);

        assert!((skill_overlap(&resume, &job) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn keyword_bonus_weights_high_priority_matches() {
        let policy = KeywordPolicy {
            high_priority: vec!["Python".into()],
            high_priority_multiplier: 2.0,
        };
        let resume = set(&["Python", "Docker"]);
        let job = set(&["Python", "Docker"]);

        // Python counts 2.0, Docker counts 1.0 → 3.0 / 10.
        let bonus = keyword_bonus(&resume, &job, &policy, 10);
        assert!((bonus - 0.3).abs() < 1e-12);
    }

    #[test]
    fn keyword_bonus_clamps_to_one() {
        let policy = KeywordPolicy {
            high_priority: vec![],
            high_priority_multiplier: 2.0,
        };
        let skills: Vec<String> = (0..8).map(|i| format!("Skill{i}")).collect();
        let both: HashSet<String> = skills.iter().cloned().collect();

        let bonus = keyword_bonus(&both, &both, &policy, 4);
        assert_eq!(bonus, 1.0);
    }

    #[test]
    fn gap_penalty_excludes_soft_skills() {
        let policy = GapPolicy {
            critical_skills: vec![],
            critical_penalty_multiplier: 2.0,
        };
        let resume = set(&[]);
        let job = set(&["Communication", "Leadership"]);

        assert_eq!(gap_penalty(&resume, &job, &policy, 10), 0.0);
    }

    #[test]
    fn gap_penalty_weights_critical_gaps() {
        let policy = GapPolicy {
            critical_skills: vec!["SQL".into()],
            critical_penalty_multiplier: 2.0,
        };
        let resume = set(&["Python"]);
        let job = set(&["Python", "SQL", "Kafka"]);

        // SQL counts 2.0, Kafka counts 1.0 → 3.0 / 10.
        let penalty = gap_penalty(&resume, &job, &policy, 10);
        assert!((penalty - 0.3).abs() < 1e-12);
    }

    #[test]
    fn gap_penalty_with_no_gaps_is_zero() {
        let policy = GapPolicy::default();
        let skills = set(&["Python"]);

        assert_eq!(gap_penalty(&skills, &skills, &policy, 10), 0.0);
    }

    #[test]
    fn features_are_bounded() {
        let config = RankingConfig::default();
        let vocab = SkillVocabulary::from_terms(["Python", "SQL", "Kafka", "Docker"]);
        let resume = Resume {
            skills: vec!["Python".into()],
            ..Resume::default()
        };
        let job = JobPosting {
            skills: vec!["Python".into(), "SQL".into(), "Kafka".into(), "Docker".into()],
            ..JobPosting::default()
        };

        let features = build_features(&resume, &job, 0.8, &config, &vocab);
        assert!((0.0..=1.0).contains(&features.skill_overlap));
        assert!((0.0..=1.0).contains(&features.keyword_bonus));
        assert!((0.0..=1.0).contains(&features.gap_penalty));
    }

    #[test]
    fn merged_text_skills_are_not_counted_as_gaps() {
        let config = RankingConfig::default();
        let vocab = SkillVocabulary::from_terms([
            "Python",
            "PyTorch",
            "Named Entity Recognition",
            "Literature Review",
        ]);
        let resume = Resume {
            skills: vec!["Python".into(), "PyTorch".into()],
            experience: "Research on Named Entity Recognition; extensive literature review.".into(),
            ..Resume::default()
        };
        let job = JobPosting {
            skills: vec![
                "Python".into(),
                "Named Entity Recognition".into(),
                "Literature Review".into(),
            ],
            ..JobPosting::default()
        };

        let features = build_features(&resume, &job, 0.5, &config, &vocab);
        assert_eq!(features.skill_overlap, 1.0);
        assert_eq!(features.gap_penalty, 0.0);
    }

    #[test]
    fn vector_order_matches_declared_names() {
        let features = FeatureSet {
            embedding: 0.1,
            skill_overlap: 0.2,
            keyword_bonus: 0.3,
            gap_penalty: 0.4,
        };

        assert_eq!(features.full_vector(), [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(features.ltr_vector(), [0.1, 0.3]);
        assert_eq!(FEATURE_NAMES[0], "embedding");
        assert_eq!(LTR_FEATURE_NAMES, ["embedding", "keyword_bonus"]);
    }
}
