//! Tabular data handling
//!
//! - [`FeatureTable`] / [`Dataset`]: named columns pulled from a polars frame
//! - [`train_test_split`]: seeded hold-out partition

mod split;
mod table;

pub use split::{train_test_split, TrainTestSplit};
pub use table::{columns_to_array2, Dataset, FeatureTable};
