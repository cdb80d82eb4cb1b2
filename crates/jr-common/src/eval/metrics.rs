use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strum::AsRefStr;

use crate::labels::LabelScale;

/// Relevance gain convention for DCG. Two conventions coexist in this system
/// and callers must pick one explicitly: the whole-set evaluator uses linear
/// gain, the ablation harness exponential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GainMode {
    Linear,
    Exponential,
}

impl GainMode {
    fn gain(self, relevance: f64) -> f64 {
        match self {
            GainMode::Linear => relevance,
            GainMode::Exponential => relevance.exp2() - 1.0,
        }
    }
}

/// Fraction of the first k ranked ids that are relevant. Membership, not
/// score magnitude, drives this metric. Returns 0.0 for k == 0 or an empty
/// ranking.
pub fn precision_at_k(ranked_ids: &[String], relevant_ids: &HashSet<String>, k: usize) -> f64 {
    if k == 0 || ranked_ids.is_empty() {
        return 0.0;
    }
    let hits = ranked_ids
        .iter()
        .take(k)
        .filter(|id| relevant_ids.contains(*id))
        .count();
    hits as f64 / k as f64
}

/// DCG@k = Σ gain(rel_i) / log2(i + 1) over 1-based rank positions. Ids
/// without a known relevance default to 0.
pub fn dcg_at_k(
    ranked_ids: &[String],
    relevance: &HashMap<String, f64>,
    k: usize,
    mode: GainMode,
) -> f64 {
    if k == 0 || ranked_ids.is_empty() {
        return 0.0;
    }
    ranked_ids
        .iter()
        .take(k)
        .enumerate()
        .map(|(idx, id)| {
            let rel = relevance.get(id).copied().unwrap_or(0.0);
            mode.gain(rel) / ((idx + 2) as f64).log2()
        })
        .sum()
}

/// Best possible DCG@k: all known relevances sorted descending under the
/// same discount.
pub fn ideal_dcg_at_k(relevance: &HashMap<String, f64>, k: usize, mode: GainMode) -> f64 {
    if k == 0 || relevance.is_empty() {
        return 0.0;
    }
    let mut values: Vec<f64> = relevance.values().copied().collect();
    values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    values
        .iter()
        .take(k)
        .enumerate()
        .map(|(idx, rel)| mode.gain(*rel) / ((idx + 2) as f64).log2())
        .sum()
}

/// NDCG@k = DCG@k / IDCG@k; 0.0 when no relevant items exist or either input
/// is empty.
pub fn ndcg_at_k(
    ranked_ids: &[String],
    relevance: &HashMap<String, f64>,
    k: usize,
    mode: GainMode,
) -> f64 {
    if k == 0 || ranked_ids.is_empty() || relevance.is_empty() {
        return 0.0;
    }
    let ideal = ideal_dcg_at_k(relevance, k, mode);
    if ideal == 0.0 {
        return 0.0;
    }
    dcg_at_k(ranked_ids, relevance, k, mode) / ideal
}

/// Precision@K and NDCG@K for one resume's ranking at each requested K.
/// Keys are "precision@K" / "ndcg@K". The scale decides the relevance
/// threshold; the gain mode is passed straight through to NDCG.
pub fn metrics_for_resume(
    ranked_ids: &[String],
    labels: &BTreeMap<String, i32>,
    k_values: &[usize],
    scale: LabelScale,
    mode: GainMode,
) -> BTreeMap<String, f64> {
    let relevant: HashSet<String> = labels
        .iter()
        .filter(|(_, label)| **label >= scale.relevance_threshold())
        .map(|(id, _)| id.clone())
        .collect();
    let relevance: HashMap<String, f64> = labels
        .iter()
        .map(|(id, label)| (id.clone(), f64::from(*label)))
        .collect();

    let mut metrics = BTreeMap::new();
    for &k in k_values {
        metrics.insert(
            format!("precision@{k}"),
            precision_at_k(ranked_ids, &relevant, k),
        );
        metrics.insert(format!("ndcg@{k}"), ndcg_at_k(ranked_ids, &relevance, k, mode));
    }
    metrics
}

/// Mean and (population) standard deviation of a metric across folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    pub values: Vec<f64>,
}

impl MetricSummary {
    pub fn from_values(values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                values,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn precision_matches_hand_computed_fractions() {
        let recommended = ids(&["a", "b", "c", "d", "e"]);
        let relevant: HashSet<String> = ids(&["a", "c", "d"]).into_iter().collect();

        assert!((precision_at_k(&recommended, &relevant, 3) - 2.0 / 3.0).abs() < 1e-12);
        assert!((precision_at_k(&recommended, &relevant, 5) - 3.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn precision_edge_cases_return_zero() {
        let relevant: HashSet<String> = ids(&["a"]).into_iter().collect();
        assert_eq!(precision_at_k(&[], &relevant, 5), 0.0);
        assert_eq!(precision_at_k(&ids(&["a"]), &relevant, 0), 0.0);
    }

    #[test]
    fn ndcg_equals_dcg_over_ideal_dcg() {
        let recommended = ids(&["a", "b", "c", "d", "e"]);
        let relevance: HashMap<String, f64> = [
            ("a", 3.0),
            ("b", 2.0),
            ("c", 1.0),
            ("d", 3.0),
            ("e", 0.0),
        ]
        .into_iter()
        .map(|(id, rel)| (id.to_string(), rel))
        .collect();

        let dcg = dcg_at_k(&recommended, &relevance, 3, GainMode::Linear);
        // Ideal ordering at k=3 is [3, 3, 2].
        let ideal = 3.0 / 2.0_f64.log2() + 3.0 / 3.0_f64.log2() + 2.0 / 4.0_f64.log2();
        assert!((ideal_dcg_at_k(&relevance, 3, GainMode::Linear) - ideal).abs() < 1e-12);
        assert!((ndcg_at_k(&recommended, &relevance, 3, GainMode::Linear) - dcg / ideal).abs() < 1e-12);
    }

    #[test]
    fn perfect_ordering_scores_one() {
        let recommended = ids(&["a", "d", "b", "c", "e"]);
        let relevance: HashMap<String, f64> = [
            ("a", 3.0),
            ("d", 3.0),
            ("b", 2.0),
            ("c", 1.0),
            ("e", 0.0),
        ]
        .into_iter()
        .map(|(id, rel)| (id.to_string(), rel))
        .collect();

        for mode in [GainMode::Linear, GainMode::Exponential] {
            let ndcg = ndcg_at_k(&recommended, &relevance, 5, mode);
            assert!((ndcg - 1.0).abs() < 1e-12, "mode {mode:?} gave {ndcg}");
        }
    }

    #[test]
    fn exponential_gain_amplifies_high_relevance() {
        let recommended = ids(&["a", "b"]);
        let relevance: HashMap<String, f64> =
            [("a".to_string(), 5.0), ("b".to_string(), 1.0)].into_iter().collect();

        let linear = dcg_at_k(&recommended, &relevance, 1, GainMode::Linear);
        let exponential = dcg_at_k(&recommended, &relevance, 1, GainMode::Exponential);
        assert_eq!(linear, 5.0);
        assert_eq!(exponential, 31.0);
    }

    #[test]
    fn unseen_ids_default_to_zero_relevance() {
        let recommended = ids(&["mystery", "a"]);
        let relevance: HashMap<String, f64> = [("a".to_string(), 2.0)].into_iter().collect();

        let dcg = dcg_at_k(&recommended, &relevance, 2, GainMode::Linear);
        assert!((dcg - 2.0 / 3.0_f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn ndcg_is_zero_when_no_relevant_items_exist() {
        let recommended = ids(&["a"]);
        let relevance: HashMap<String, f64> = [("a".to_string(), 0.0)].into_iter().collect();

        assert_eq!(ndcg_at_k(&recommended, &relevance, 5, GainMode::Linear), 0.0);
    }

    #[test]
    fn per_resume_metrics_respect_the_scale_threshold() {
        let ranked = ids(&["a", "b"]);
        let labels: BTreeMap<String, i32> =
            [("a".to_string(), 4), ("b".to_string(), 3)].into_iter().collect();

        let strict = metrics_for_resume(&ranked, &labels, &[2], LabelScale::OneToFive, GainMode::Exponential);
        assert!((strict["precision@2"] - 0.5).abs() < 1e-12);

        // Same labels read on the 0-3-style threshold would count both; the
        // scale is what decides, so it must be passed explicitly.
        let relevant: HashSet<String> = labels
            .iter()
            .filter(|(_, l)| **l >= LabelScale::ZeroToThree.relevance_threshold())
            .map(|(id, _)| id.clone())
            .collect();
        assert_eq!(precision_at_k(&ranked, &relevant, 2), 1.0);
    }

    #[test]
    fn summary_reports_population_std() {
        let summary = MetricSummary::from_values(vec![0.2, 0.4, 0.6]);
        assert!((summary.mean - 0.4).abs() < 1e-12);
        let expected_std = (2.0 * 0.04 / 3.0_f64).sqrt();
        assert!((summary.std - expected_std).abs() < 1e-12);
    }
}
