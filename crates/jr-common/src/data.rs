use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{JobPosting, Resume};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record at {path}:{line}: {source}")]
    Malformed {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} record at {path}:{line} is missing its identifier")]
    MissingId {
        kind: &'static str,
        path: String,
        line: usize,
    },
}

/// Load newline-delimited JSON records. Blank lines are skipped; a malformed
/// line is an immediate error with its line number, never a silent default.
pub fn load_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, InputError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: display.clone(),
        source,
    })?;

    let mut records = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| InputError::Malformed {
            path: display.clone(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn load_resumes(path: impl AsRef<Path>) -> Result<Vec<Resume>, InputError> {
    load_jsonl(path)
}

pub fn load_jobs(path: impl AsRef<Path>) -> Result<Vec<JobPosting>, InputError> {
    load_jsonl(path)
}

/// Require identifiers on every record. Evaluation and training key their
/// caches and labels by id, so a missing id is surfaced up front.
pub fn require_ids(
    resumes: &[Resume],
    jobs: &[JobPosting],
    path_hint: &str,
) -> Result<(), InputError> {
    for (idx, resume) in resumes.iter().enumerate() {
        if resume.resume_id.as_deref().unwrap_or("").is_empty() {
            return Err(InputError::MissingId {
                kind: "resume",
                path: path_hint.to_string(),
                line: idx + 1,
            });
        }
    }
    for (idx, job) in jobs.iter().enumerate() {
        if job.job_id.as_deref().unwrap_or("").is_empty() {
            return Err(InputError::MissingId {
                kind: "job",
                path: path_hint.to_string(),
                line: idx + 1,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_jsonl_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "{{\"resume_id\":\"r1\",\"education\":\"BSc\",\"projects\":\"\",\"experience\":\"\",\"skills\":[\"Python\"]}}"
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            "{{\"resume_id\":\"r2\",\"education\":\"MSc\",\"projects\":\"\",\"experience\":\"\",\"skills\":[]}}"
        )
        .unwrap();

        let resumes = load_resumes(file.path()).unwrap();
        assert_eq!(resumes.len(), 2);
        assert_eq!(resumes[0].resume_id.as_deref(), Some("r1"));
        assert_eq!(resumes[1].skills.len(), 0);
    }

    #[test]
    fn malformed_line_reports_position() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "{{\"job_id\":\"j1\",\"title\":\"ML Engineer\",\"responsibilities\":\"\",\"requirements_text\":\"\",\"skills\":[]}}"
        )
        .unwrap();
        writeln!(file, "not json").unwrap();

        let err = load_jobs(file.path()).unwrap_err();
        match err {
            InputError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_ids_rejects_missing_resume_id() {
        let resumes = vec![Resume::default()];
        let err = require_ids(&resumes, &[], "resumes.jsonl").unwrap_err();
        assert!(matches!(err, InputError::MissingId { kind: "resume", .. }));
    }
}
