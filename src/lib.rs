//! Dataset standardization on top of `ndarray`.
//!
//! [`stats::DistributionStats`] collects per-feature means and population
//! standard deviations, in one pass or streamed over a [`dataset::DataSetIterator`].
//! [`scalers::NormalizerStandardize`] applies and reverts the resulting
//! z-score transform in place. Data of rank 3 and up (time series, images) is
//! handled along axis 1 through the kernels in [`broadcast`], which also
//! provide the `broadcast_max` indicator op.

pub mod broadcast;
pub mod config;
pub mod csv_iterator;
pub mod dataset;
pub mod error;
pub mod persist;
pub mod scalers;
pub mod stats;
pub mod tensor;

pub use broadcast::{broadcast_max, BroadcastOp};
pub use config::NormalizerConfig;
pub use dataset::{DataSet, DataSetIterator, ListDataSetIterator};
pub use error::{PreprocessError, Result};
pub use scalers::{DataSetNormalizer, NormalizerStandardize, NormalizerStrategy, StandardizeStrategy};
pub use stats::{DistributionStats, NormalizerStats, StatsBuilder};
pub use tensor::{DType, DynArray, Element};
