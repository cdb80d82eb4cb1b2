pub mod basic;
pub mod loocv;
pub mod metrics;

pub use basic::{BasicEvalOptions, BasicEvalResults, run_basic_eval};
pub use loocv::{AblationResults, EvalError, EvalOptions, EvaluationEngine, FoldResult};
pub use metrics::{GainMode, MetricSummary, dcg_at_k, ndcg_at_k, precision_at_k};
