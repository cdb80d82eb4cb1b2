use thiserror::Error;

use crate::labels::{LabelRecord, LabelScale};
use crate::skills::{SkillVocabulary, merge_resume_skills, normalize_skills};
use crate::{JobPosting, Resume};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("label provider unavailable: {0}")]
    Unavailable(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// A single relevance judgment from a provider, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelJudgement {
    pub label: i32,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub notes: String,
}

/// Boundary to the weak-label judge (typically an LLM). Implementations must
/// return an error on failure rather than block; the fallback policy lives in
/// `judge_pair`, not in providers.
pub trait LabelProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn judge(
        &self,
        resume: &Resume,
        job: &JobPosting,
        scale: LabelScale,
    ) -> Result<LabelJudgement, ProviderError>;
}

/// Outcome of judging one pair. The fallback case is a distinct variant so
/// calling code has to acknowledge it instead of treating a substituted
/// neutral label as a real judgment.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelOutcome {
    Scored(LabelRecord),
    Fallback { record: LabelRecord, reason: String },
}

impl LabelOutcome {
    pub fn record(&self) -> &LabelRecord {
        match self {
            LabelOutcome::Scored(record) => record,
            LabelOutcome::Fallback { record, .. } => record,
        }
    }

    pub fn into_record(self) -> LabelRecord {
        match self {
            LabelOutcome::Scored(record) => record,
            LabelOutcome::Fallback { record, .. } => record,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LabelOutcome::Fallback { .. })
    }
}

/// Judge one (resume, job) pair, substituting the scale's documented neutral
/// fallback on any provider failure or out-of-scale response. The fallback
/// record is flagged in its evidence and notes.
pub fn judge_pair(
    provider: &dyn LabelProvider,
    resume: &Resume,
    job: &JobPosting,
    scale: LabelScale,
) -> LabelOutcome {
    let resume_id = resume.resume_id.clone().unwrap_or_default();
    let job_id = job.job_id.clone().unwrap_or_default();

    let failure = match provider.judge(resume, job, scale) {
        Ok(judgement) if scale.contains(judgement.label) => {
            return LabelOutcome::Scored(LabelRecord {
                resume_id,
                job_id,
                label: judgement.label,
                confidence: judgement.confidence.clamp(0.0, 1.0),
                evidence: judgement.evidence,
                notes: judgement.notes,
            });
        }
        Ok(judgement) => format!(
            "provider returned label {} outside the {} scale",
            judgement.label,
            scale.as_ref()
        ),
        Err(err) => err.to_string(),
    };

    tracing::warn!(
        provider = provider.name(),
        resume_id = %resume_id,
        job_id = %job_id,
        reason = %failure,
        "label provider failed; using neutral fallback"
    );

    let (label, confidence) = scale.neutral_fallback();
    LabelOutcome::Fallback {
        record: LabelRecord {
            resume_id,
            job_id,
            label,
            confidence,
            evidence: vec![
                "Label provider unavailable".into(),
                "Default label assigned".into(),
            ],
            notes: format!("Fallback label ({failure}) - requires manual review"),
        },
        reason: failure,
    }
}

/// Deterministic judge based on normalized skill overlap. Stands in for an
/// LLM provider in offline runs and tests; the trait boundary is the same.
pub struct OverlapLabelProvider {
    vocab: SkillVocabulary,
}

impl OverlapLabelProvider {
    pub fn new(vocab: SkillVocabulary) -> Self {
        Self { vocab }
    }
}

impl LabelProvider for OverlapLabelProvider {
    fn name(&self) -> &'static str {
        "overlap"
    }

    fn judge(
        &self,
        resume: &Resume,
        job: &JobPosting,
        scale: LabelScale,
    ) -> Result<LabelJudgement, ProviderError> {
        let vocab = self.vocab.expanded_with_job_skills(std::slice::from_ref(job));
        let merged = merge_resume_skills(resume, &vocab);
        let resume_skills = normalize_skills(&merged, &vocab);
        let job_skills = normalize_skills(&job.skills, &vocab);

        let overlap = if job_skills.is_empty() {
            0.0
        } else {
            resume_skills.intersection(&job_skills).count() as f64 / job_skills.len() as f64
        };

        // Map the overlap fraction onto the active scale's span.
        let span = (scale.max_label() - scale.min_label()) as f64;
        let label = scale.min_label() + (overlap * span).round() as i32;

        let mut matched: Vec<String> = resume_skills.intersection(&job_skills).cloned().collect();
        matched.sort();

        Ok(LabelJudgement {
            label: label.clamp(scale.min_label(), scale.max_label()),
            confidence: 0.5,
            evidence: if matched.is_empty() {
                vec!["No overlapping skills found".into()]
            } else {
                vec![format!("Overlapping skills: {}", matched.join(", "))]
            },
            notes: format!("Skill overlap {:.0}% of job requirements", overlap * 100.0),
        })
    }
}

/// Runtime settings for an external labeling service, read from the
/// environment. The provider behind them is wired by the host binary.
#[derive(Debug, Clone)]
pub struct LlmLabelerConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmLabelerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "overlap".into(),
            model: String::new(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl LlmLabelerConfig {
    pub fn from_env() -> Self {
        fn parse_bool(key: &str, default: bool) -> bool {
            match std::env::var(key) {
                Ok(val) => matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
                Err(_) => default,
            }
        }
        fn parse_u64(key: &str, default: u64) -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }
        fn parse_u32(key: &str, default: u32) -> u32 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }

        Self {
            enabled: parse_bool("JR_LLM_ENABLED", false),
            provider: std::env::var("JR_LLM_PROVIDER").unwrap_or_else(|_| "overlap".into()),
            model: std::env::var("JR_LLM_MODEL").unwrap_or_default(),
            timeout_secs: parse_u64("JR_LLM_TIMEOUT_SECONDS", 30),
            max_retries: parse_u32("JR_LLM_MAX_RETRIES", 3),
        }
    }
}
