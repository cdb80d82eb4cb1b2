pub mod model;
pub mod pairwise;
pub mod scaler;

pub use model::{LtrError, LtrRankedJob, PairwiseLtrModel, TrainOptions};
pub use pairwise::{PairwiseData, check_sufficient_pairs, construct_pairwise_data};
pub use scaler::StandardScaler;
