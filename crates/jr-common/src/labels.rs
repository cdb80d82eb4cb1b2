use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use thiserror::Error;

use crate::data::{InputError, load_jsonl};
use crate::{JobPosting, Resume};

/// One weak relevance judgment for a (resume, job) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub resume_id: String,
    pub job_id: String,
    pub label: i32,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// The two label-scale conventions in this system. They are NOT
/// interchangeable: each carries its own relevance threshold and neutral
/// fallback, and every metric call is told which scale is in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabelScale {
    /// 0–3 scale used by the whole-set evaluator; relevant means label >= 2.
    ZeroToThree,
    /// 1–5 scale used by the ablation harness; relevant means label >= 4.
    OneToFive,
}

impl LabelScale {
    pub fn min_label(self) -> i32 {
        match self {
            LabelScale::ZeroToThree => 0,
            LabelScale::OneToFive => 1,
        }
    }

    pub fn max_label(self) -> i32 {
        match self {
            LabelScale::ZeroToThree => 3,
            LabelScale::OneToFive => 5,
        }
    }

    pub fn contains(self, label: i32) -> bool {
        (self.min_label()..=self.max_label()).contains(&label)
    }

    /// Minimum label counted as relevant by Precision@K under this scale.
    pub fn relevance_threshold(self) -> i32 {
        match self {
            LabelScale::ZeroToThree => 2,
            LabelScale::OneToFive => 4,
        }
    }

    /// Neutral (label, confidence) substituted when the labeling provider
    /// fails.
    pub fn neutral_fallback(self) -> (i32, f64) {
        match self {
            LabelScale::ZeroToThree => (1, 0.3),
            LabelScale::OneToFive => (2, 0.3),
        }
    }
}

pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<LabelRecord>, InputError> {
    load_jsonl(path)
}

/// Reject labels outside the active scale up front rather than letting them
/// skew metrics.
pub fn validate_scale(labels: &[LabelRecord], scale: LabelScale) -> Result<(), ScaleError> {
    for record in labels {
        if !scale.contains(record.label) {
            return Err(ScaleError {
                resume_id: record.resume_id.clone(),
                job_id: record.job_id.clone(),
                label: record.label,
                scale,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
#[error(
    "label {label} for ({resume_id}, {job_id}) is outside the {scale_name} scale [{min}, {max}]",
    scale_name = .scale.as_ref(),
    min = .scale.min_label(),
    max = .scale.max_label()
)]
pub struct ScaleError {
    pub resume_id: String,
    pub job_id: String,
    pub label: i32,
    pub scale: LabelScale,
}

/// Group labels per resume, deterministic resume order, label order preserved
/// within each resume.
pub fn labels_by_resume(labels: &[LabelRecord]) -> BTreeMap<String, Vec<&LabelRecord>> {
    let mut grouped: BTreeMap<String, Vec<&LabelRecord>> = BTreeMap::new();
    for record in labels {
        grouped.entry(record.resume_id.clone()).or_default().push(record);
    }
    grouped
}

/// Relevance lookup (job_id → label) for one resume.
pub fn label_map_for_resume<'a>(
    labels: impl IntoIterator<Item = &'a LabelRecord>,
    resume_id: &str,
) -> BTreeMap<String, i32> {
    labels
        .into_iter()
        .filter(|l| l.resume_id == resume_id)
        .map(|l| (l.job_id.clone(), l.label))
        .collect()
}

const MAX_DISPLAYED_MISSING: usize = 10;

/// Full resume×job coverage check. Metrics over partial label coverage are
/// misleading, so callers abort on this error instead of computing them.
pub fn validate_coverage(
    labels: &[LabelRecord],
    resumes: &[Resume],
    jobs: &[JobPosting],
) -> Result<(), CoverageError> {
    let labeled: HashSet<(&str, &str)> = labels
        .iter()
        .map(|l| (l.resume_id.as_str(), l.job_id.as_str()))
        .collect();

    let mut missing = Vec::new();
    for resume in resumes {
        let Some(resume_id) = resume.resume_id.as_deref() else {
            continue;
        };
        for job in jobs {
            let Some(job_id) = job.job_id.as_deref() else {
                continue;
            };
            if !labeled.contains(&(resume_id, job_id)) {
                missing.push((resume_id.to_string(), job_id.to_string()));
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(CoverageError {
            expected: resumes.len() * jobs.len(),
            missing,
        })
    }
}

/// Missing (resume, job) label pairs, enumerated with a capped display.
#[derive(Debug)]
pub struct CoverageError {
    pub expected: usize,
    pub missing: Vec<(String, String)>,
}

impl std::error::Error for CoverageError {}

impl fmt::Display for CoverageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "missing {} of {} (resume, job) label pairs:",
            self.missing.len(),
            self.expected
        )?;
        for (resume_id, job_id) in self.missing.iter().take(MAX_DISPLAYED_MISSING) {
            writeln!(f, "  - ({resume_id}, {job_id})")?;
        }
        if self.missing.len() > MAX_DISPLAYED_MISSING {
            writeln!(f, "  ... and {} more", self.missing.len() - MAX_DISPLAYED_MISSING)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(resume_id: &str, job_id: &str, label: i32) -> LabelRecord {
        LabelRecord {
            resume_id: resume_id.into(),
            job_id: job_id.into(),
            label,
            confidence: 0.8,
            evidence: vec![],
            notes: String::new(),
        }
    }

    #[test]
    fn scale_thresholds_differ() {
        assert_eq!(LabelScale::ZeroToThree.relevance_threshold(), 2);
        assert_eq!(LabelScale::OneToFive.relevance_threshold(), 4);
    }

    #[test]
    fn neutral_fallbacks_match_scale() {
        assert_eq!(LabelScale::ZeroToThree.neutral_fallback(), (1, 0.3));
        assert_eq!(LabelScale::OneToFive.neutral_fallback(), (2, 0.3));
    }

    #[test]
    fn out_of_scale_label_is_rejected() {
        let labels = vec![record("r1", "j1", 5)];
        assert!(validate_scale(&labels, LabelScale::OneToFive).is_ok());
        assert!(validate_scale(&labels, LabelScale::ZeroToThree).is_err());
    }

    #[test]
    fn coverage_enumerates_missing_pairs_with_cap() {
        let resumes: Vec<Resume> = (0..3)
            .map(|i| Resume {
                resume_id: Some(format!("r{i}")),
                ..Resume::default()
            })
            .collect();
        let jobs: Vec<JobPosting> = (0..5)
            .map(|i| JobPosting {
                job_id: Some(format!("j{i}")),
                ..JobPosting::default()
            })
            .collect();
        let labels = vec![record("r0", "j0", 3)];

        let err = validate_coverage(&labels, &resumes, &jobs).unwrap_err();
        assert_eq!(err.missing.len(), 14);
        let rendered = err.to_string();
        assert!(rendered.contains("(r0, j1)"));
        assert!(rendered.contains("... and 4 more"));
    }

    #[test]
    fn full_coverage_passes() {
        let resumes = vec![Resume {
            resume_id: Some("r0".into()),
            ..Resume::default()
        }];
        let jobs = vec![JobPosting {
            job_id: Some("j0".into()),
            ..JobPosting::default()
        }];
        let labels = vec![record("r0", "j0", 2)];

        assert!(validate_coverage(&labels, &resumes, &jobs).is_ok());
    }

    #[test]
    fn groups_labels_by_resume_preserving_order() {
        let labels = vec![
            record("r1", "j1", 4),
            record("r2", "j1", 1),
            record("r1", "j2", 2),
        ];

        let grouped = labels_by_resume(&labels);
        assert_eq!(grouped["r1"].len(), 2);
        assert_eq!(grouped["r1"][0].job_id, "j1");
        assert_eq!(grouped["r1"][1].job_id, "j2");
    }
}
