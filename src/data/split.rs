//! Seeded train/test partitioning

use crate::error::{Result, SelectError};
use super::Dataset;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Train and test partitions of one dataset
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Dataset,
    pub test: Dataset,
}

/// Shuffle rows with a seeded RNG and hold out `ceil(test_size * n)` of them.
///
/// The same seed always yields the same partition.
pub fn train_test_split(dataset: &Dataset, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(SelectError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }

    let n = dataset.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(SelectError::DataError(format!(
            "{} rows cannot be split with test_size {} (train = {}, test = {})",
            n, test_size, n_train, n_test
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    debug!(n_train, n_test, seed, "Partitioned dataset");

    Ok(TrainTestSplit {
        train: dataset.select_rows(train_idx),
        test: dataset.select_rows(test_idx),
    })
}
