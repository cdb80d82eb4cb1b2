use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::data::InputError;
use crate::{JobPosting, Resume};

/// Soft skills excluded from gap-penalty accounting. Their absence from a
/// resume should not penalize a candidate the way a missing technical skill
/// does.
pub static SOFT_SKILLS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "communication",
        "leadership",
        "collaboration",
        "teamwork",
        "problem solving",
        "critical thinking",
        "time management",
        "adaptability",
        "creativity",
        "work ethic",
        "interpersonal skills",
        "presentation skills",
        "negotiation",
        "conflict resolution",
        "decision making",
        "emotional intelligence",
        "mentoring",
        "coaching",
        "stakeholder management",
        "project management",
        "agile methodologies",
    ]
    .into_iter()
    .collect()
});

pub fn is_soft_skill(skill: &str) -> bool {
    SOFT_SKILLS.contains(vocab_key(skill).as_str())
}

/// Drop soft skills from a list, preserving order.
pub fn filter_soft_skills(skills: &[String]) -> Vec<String> {
    skills
        .iter()
        .filter(|s| !is_soft_skill(s))
        .cloned()
        .collect()
}

fn vocab_key(input: &str) -> String {
    input.nfkc().collect::<String>().trim().to_lowercase()
}

/// Canonical skill vocabulary, case-insensitively keyed. Holds the canonical
/// casing of each term; lookups go through an NFKC-lowercased key.
///
/// Loaded once per process and treated as read-only; per-batch expansion
/// produces a new vocabulary scoped to that ranking call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillVocabulary {
    canonical: BTreeMap<String, String>,
}

impl SkillVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self::new();
        for term in terms {
            vocab.insert(term.into());
        }
        vocab
    }

    /// Load a vocabulary from a plain text file: one term per line, `#`
    /// comments and blank lines skipped.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self::from_terms(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        ))
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.canonical.contains_key(&vocab_key(term))
    }

    /// Canonical (vocab-cased) form of a term, if present.
    pub fn canonical(&self, term: &str) -> Option<&str> {
        self.canonical.get(&vocab_key(term)).map(String::as_str)
    }

    /// Insert a term, keeping the given casing as canonical. Returns false if
    /// a case-insensitive equivalent was already present.
    pub fn insert(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        let key = vocab_key(&term);
        if key.is_empty() || self.canonical.contains_key(&key) {
            return false;
        }
        self.canonical.insert(key, term);
        true
    }

    /// Canonical terms in deterministic (key-sorted) order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.canonical.values().map(String::as_str)
    }

    /// Union in every skill string literally present in the given job batch.
    /// Dedup is case-insensitive against existing entries; newly added terms
    /// keep the job's original casing. Idempotent: expanding again with the
    /// same batch changes nothing.
    ///
    /// The expansion is scoped to the returned vocabulary; the original is
    /// untouched, so independent ranking calls never see each other's terms.
    pub fn expanded_with_job_skills(&self, jobs: &[JobPosting]) -> SkillVocabulary {
        let mut expanded = self.clone();
        for job in jobs {
            for skill in &job.skills {
                expanded.insert(skill.clone());
            }
        }
        expanded
    }
}

/// Normalize skills against the vocabulary: case-insensitive exact matching,
/// returning canonical (vocab-cased) forms. Lossy by design: skills absent
/// from the vocabulary are dropped and never contribute to overlap or gap
/// calculations.
pub fn normalize_skills(skills: &[String], vocab: &SkillVocabulary) -> HashSet<String> {
    skills
        .iter()
        .filter_map(|s| vocab.canonical(s))
        .map(str::to_string)
        .collect()
}

/// Scan free text for vocabulary terms.
///
/// Alphanumeric terms match on whole-word boundaries; terms containing
/// special characters (C++, C#, .NET) match between whitespace/punctuation
/// delimiters instead, since `\b` misbehaves around symbols. Single-letter
/// alphanumeric terms are skipped as too ambiguous in prose. Matching is
/// case-insensitive; results keep vocab casing, each term at most once, in
/// deterministic vocabulary order.
pub fn extract_skills_from_text(text: &str, vocab: &SkillVocabulary) -> Vec<String> {
    if text.trim().is_empty() || vocab.is_empty() {
        return Vec::new();
    }

    let mut matched = Vec::new();
    for term in vocab.terms() {
        let escaped = regex::escape(term);
        let has_special = term.chars().any(|c| !c.is_alphanumeric() && c != '_');

        let pattern = if has_special {
            format!(r"(?i)(?:^|\s){escaped}(?:[\s,;.]|$)")
        } else {
            if term.chars().count() < 2 {
                continue;
            }
            format!(r"(?i)\b{escaped}\b")
        };

        // Terms come from a trusted vocabulary and are escaped, so the
        // pattern is always valid.
        let Ok(re) = Regex::new(&pattern) else {
            tracing::warn!(term, "skipping unmatchable vocabulary term");
            continue;
        };
        if re.is_match(text) {
            matched.push(term.to_string());
        }
    }
    matched
}

/// Merge declared resume skills with skills auto-extracted from the resume's
/// education/projects/experience text. Declared skills come first in their
/// original order, then extracted skills, deduplicated case-insensitively by
/// first appearance. This keeps skills mentioned only in narrative text from
/// being counted as gaps.
pub fn merge_resume_skills(resume: &Resume, vocab: &SkillVocabulary) -> Vec<String> {
    let mut text_parts = Vec::new();
    if !resume.education.is_empty() {
        text_parts.push(resume.education.as_str());
    }
    if !resume.projects.is_empty() {
        text_parts.push(resume.projects.as_str());
    }
    if !resume.experience.is_empty() {
        text_parts.push(resume.experience.as_str());
    }
    let combined = text_parts.join(" ");

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for skill in &resume.skills {
        if seen.insert(vocab_key(skill)) {
            merged.push(skill.clone());
        }
    }
    for skill in extract_skills_from_text(&combined, vocab) {
        if seen.insert(vocab_key(&skill)) {
            merged.push(skill);
        }
    }
    merged
}
