use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::skills::SkillVocabulary;

/// Default heuristic weights. Embedding similarity dominates; the explainable
/// skill features adjust around it and the gap penalty is always subtracted.
pub const DEFAULT_WEIGHTS: RankingWeights = RankingWeights {
    embedding: 0.5,
    skill_overlap: 0.2,
    keyword_bonus: 0.2,
    gap_penalty: 0.1,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub embedding: f64,
    pub skill_overlap: f64,
    pub keyword_bonus: f64,
    pub gap_penalty: f64,
}

impl RankingWeights {
    pub fn sum(&self) -> f64 {
        self.embedding + self.skill_overlap + self.keyword_bonus + self.gap_penalty
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

/// High-priority keyword policy for the keyword bonus feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordPolicy {
    pub high_priority: Vec<String>,
    pub high_priority_multiplier: f64,
}

impl Default for KeywordPolicy {
    fn default() -> Self {
        Self {
            high_priority: vec![
                "Python".into(),
                "Machine Learning".into(),
                "Deep Learning".into(),
                "NLP".into(),
                "PyTorch".into(),
                "TensorFlow".into(),
            ],
            high_priority_multiplier: 2.0,
        }
    }
}

/// Critical-skill policy for the gap penalty feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapPolicy {
    pub critical_skills: Vec<String>,
    pub critical_penalty_multiplier: f64,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            critical_skills: vec![
                "Python".into(),
                "Machine Learning".into(),
                "SQL".into(),
            ],
            critical_penalty_multiplier: 2.0,
        }
    }
}

/// Normalization constants. Bonus and penalty accumulations are divided by
/// these and clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationLimits {
    pub max_keywords: usize,
    pub max_gaps: usize,
}

impl Default for NormalizationLimits {
    fn default() -> Self {
        Self {
            max_keywords: 10,
            max_gaps: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    pub keywords: KeywordPolicy,
    pub gap_penalty: GapPolicy,
    pub normalization: NormalizationLimits,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RankingConfig {
    /// Load a config document from a JSON file. The result is held by the
    /// caller for the lifetime of the process and treated as read-only.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Malformed {
            path: display,
            source,
        })
    }

    /// Apply environment overrides on top of the current values.
    pub fn with_env_overrides(mut self) -> Self {
        fn parse_f64(key: &str, default: f64) -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }
        fn parse_usize(key: &str, default: usize) -> usize {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }

        self.weights.embedding = parse_f64("JR_WEIGHT_EMBEDDING", self.weights.embedding);
        self.weights.skill_overlap = parse_f64("JR_WEIGHT_SKILL_OVERLAP", self.weights.skill_overlap);
        self.weights.keyword_bonus = parse_f64("JR_WEIGHT_KEYWORD_BONUS", self.weights.keyword_bonus);
        self.weights.gap_penalty = parse_f64("JR_WEIGHT_GAP_PENALTY", self.weights.gap_penalty);
        self.normalization.max_keywords =
            parse_usize("JR_MAX_KEYWORDS", self.normalization.max_keywords);
        self.normalization.max_gaps = parse_usize("JR_MAX_GAPS", self.normalization.max_gaps);
        self
    }
}

/// Explicit ownership of the process-wide read-only inputs: the ranking
/// configuration and the skill vocabulary. Constructed once by the host and
/// passed by reference into every component that needs it.
#[derive(Debug, Clone)]
pub struct RankingContext {
    pub config: RankingConfig,
    pub vocab: SkillVocabulary,
}

impl RankingContext {
    pub fn new(config: RankingConfig, vocab: SkillVocabulary) -> Self {
        Self { config, vocab }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((DEFAULT_WEIGHTS.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn loads_partial_config_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        write!(
            file,
            "{{\"weights\":{{\"embedding\":0.7,\"skill_overlap\":0.1,\"keyword_bonus\":0.1,\"gap_penalty\":0.1}}}}"
        )
        .unwrap();

        let config = RankingConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.weights.embedding, 0.7);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.normalization.max_keywords, 10);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = RankingConfig::from_json_file("/nonexistent/ranking.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
