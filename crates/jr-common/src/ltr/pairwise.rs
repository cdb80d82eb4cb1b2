use std::collections::{BTreeMap, HashMap};

use crate::labels::LabelRecord;

/// Pairwise preference training data: signed feature differences with binary
/// targets. `y = 1` means the first job of the pair is preferred.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairwiseData {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<u8>,
}

impl PairwiseData {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Distinct target classes, sorted.
    pub fn classes(&self) -> Vec<u8> {
        let mut classes: Vec<u8> = self.y.clone();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

/// Construct pairwise preference samples from per-resume labels.
///
/// For each resume independently, every ordered pair (i, j) of its label
/// records with `label_i >= label_j + min_rel_diff` emits one sample
/// `features_i - features_j` with target 1. With `mirror` enabled the negated
/// difference is also emitted with target 0, required whenever the
/// downstream classifier needs both classes present.
///
/// Pairs whose feature vectors are absent from `features` are skipped. No
/// qualifying pairs at all yields empty data, not an error; callers gate on
/// `check_sufficient_pairs`.
pub fn construct_pairwise_data(
    labels: &[LabelRecord],
    features: &HashMap<(String, String), Vec<f64>>,
    min_rel_diff: i32,
    mirror: bool,
) -> PairwiseData {
    let mut by_resume: BTreeMap<&str, Vec<&LabelRecord>> = BTreeMap::new();
    for record in labels {
        by_resume.entry(record.resume_id.as_str()).or_default().push(record);
    }

    let mut data = PairwiseData::default();

    for records in by_resume.values() {
        for winner in records.iter() {
            for loser in records.iter() {
                if std::ptr::eq(*winner, *loser) {
                    continue;
                }
                if winner.label < loser.label + min_rel_diff {
                    continue;
                }

                let winner_key = (winner.resume_id.clone(), winner.job_id.clone());
                let loser_key = (loser.resume_id.clone(), loser.job_id.clone());
                let (Some(winner_features), Some(loser_features)) =
                    (features.get(&winner_key), features.get(&loser_key))
                else {
                    continue;
                };

                let diff: Vec<f64> = winner_features
                    .iter()
                    .zip(loser_features.iter())
                    .map(|(w, l)| w - l)
                    .collect();

                if mirror {
                    let mirrored: Vec<f64> = diff.iter().map(|v| -v).collect();
                    data.x.push(diff);
                    data.y.push(1);
                    data.x.push(mirrored);
                    data.y.push(0);
                } else {
                    data.x.push(diff);
                    data.y.push(1);
                }
            }
        }
    }

    data
}

/// Simple size gate applied before attempting to train.
pub fn check_sufficient_pairs(data: &PairwiseData, min_pairs: usize) -> bool {
    data.len() >= min_pairs
}
