use serde::{Deserialize, Serialize};

/// Per-feature zero-mean, unit-variance scaling fitted on the training set
/// and replayed at inference. Population variance; constant features keep a
/// standard deviation of 1.0 so they pass through unscaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len() as f64;

        let mut mean = vec![0.0; n_features];
        for row in rows {
            for (acc, value) in mean.iter_mut().zip(row.iter()) {
                *acc += value;
            }
        }
        for acc in &mut mean {
            *acc /= n;
        }

        let mut variance = vec![0.0; n_features];
        for row in rows {
            for ((acc, value), mu) in variance.iter_mut().zip(row.iter()).zip(mean.iter()) {
                let centered = value - mu;
                *acc += centered * centered;
            }
        }
        let std = variance
            .into_iter()
            .map(|v| {
                let s = (v / n).sqrt();
                if s == 0.0 { 1.0 } else { s }
            })
            .collect();

        Self { mean, std }
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter())
            .zip(self.std.iter())
            .map(|((value, mu), sigma)| (value - mu) / sigma)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}
